//! Error types for the debug core.

use thiserror::Error;

/// A convenient type alias for [`Result`](std::result::Result).
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An error raised while configuring or driving the debug core.
///
/// Per the core's error-handling design, capacity exhaustion and
/// out-of-range indices are *not* represented here: those are routine
/// outcomes surfaced as `None`/`false`/a silent no-op, never as an `Err`.
/// This enum is reserved for malformed parameters supplied by the host.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Access size must be 8, 16, or 32 bits.
    #[error("invalid access size: {0} bits")]
    InvalidSize(u32),
    /// Memory write size must be 1, 2, or 4 bytes.
    #[error("invalid write size: {0} bytes")]
    InvalidWriteSize(u32),
    /// Protect mode was neither block nor set.
    #[error("invalid protect mode")]
    InvalidProtectMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_stable() {
        assert_eq!(
            Error::InvalidSize(7).to_string(),
            "invalid access size: 7 bits"
        );
        assert_eq!(
            Error::InvalidWriteSize(3).to_string(),
            "invalid write size: 3 bytes"
        );
        assert_eq!(
            Error::InvalidProtectMode.to_string(),
            "invalid protect mode"
        );
    }
}
