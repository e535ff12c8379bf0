//! Environment-driven configuration, read once when a [`crate::core::DebugCore`]
//! is constructed.

use std::env;

/// Holds symbol files the host can use to resolve addresses for logging
/// and reporting. Neither var is required: a missing or unreadable value
/// just means no symbols are available, never a startup failure.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// `E9KDBG_ELF`: ELF image backing the main program, if any.
    pub elf: Option<String>,
    /// `E9KDBG_PROF_ELF`: ELF image to resolve profiler PCs against, if
    /// it differs from `elf`.
    pub prof_elf: Option<String>,
}

impl Config {
    /// Reads configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            elf: non_empty(env::var("E9KDBG_ELF").ok()),
            prof_elf: non_empty(env::var("E9KDBG_PROF_ELF").ok()),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
