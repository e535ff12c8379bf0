//! Address masking and access-width helpers shared by every component.
//!
//! The target is a 68000-family machine: every address is 24 bits wide and
//! every access is 8, 16, or 32 bits. Keeping the masking logic in one
//! place means every component truncates identically.

use crate::error::Error;

/// Mask applied to every address before use.
pub const ADDR_MASK: u32 = 0x00ff_ffff;

/// Masks an address down to the 24 bits the bus actually decodes.
#[must_use]
pub const fn mask_addr(addr: u32) -> u32 {
    addr & ADDR_MASK
}

/// The width of a memory access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Size {
    /// 8-bit byte access.
    Byte,
    /// 16-bit word access.
    Word,
    /// 32-bit long access.
    Long,
}

impl Size {
    /// Constructs a [`Size`] from a bit-width (8, 16, or 32).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSize`] for any other value.
    pub const fn from_bits(bits: u32) -> Result<Self, Error> {
        match bits {
            8 => Ok(Self::Byte),
            16 => Ok(Self::Word),
            32 => Ok(Self::Long),
            other => Err(Error::InvalidSize(other)),
        }
    }

    /// Constructs a [`Size`] from a byte-width (1, 2, or 4).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWriteSize`] for any other value.
    pub const fn from_bytes(bytes: u32) -> Result<Self, Error> {
        match bytes {
            1 => Ok(Self::Byte),
            2 => Ok(Self::Word),
            4 => Ok(Self::Long),
            other => Err(Error::InvalidWriteSize(other)),
        }
    }

    /// The width of this access, in bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Self::Byte => 8,
            Self::Word => 16,
            Self::Long => 32,
        }
    }

    /// The width of this access, in bytes.
    #[must_use]
    pub const fn bytes(self) -> u32 {
        self.bits() / 8
    }

    /// Truncates `value` to this access width.
    #[must_use]
    pub const fn truncate(self, value: u32) -> u32 {
        match self {
            Self::Byte => value & 0xff,
            Self::Word => value & 0xffff,
            Self::Long => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_addr_clears_high_byte() {
        assert_eq!(mask_addr(0xff10_0000), 0x0010_0000);
    }

    #[test]
    fn size_from_bits_rejects_invalid() {
        assert_eq!(Size::from_bits(8), Ok(Size::Byte));
        assert_eq!(Size::from_bits(24), Err(Error::InvalidSize(24)));
    }

    #[test]
    fn size_from_bytes_rejects_invalid() {
        assert_eq!(Size::from_bytes(4), Ok(Size::Long));
        assert_eq!(Size::from_bytes(3), Err(Error::InvalidWriteSize(3)));
    }

    #[test]
    fn truncate_masks_to_width() {
        assert_eq!(Size::Byte.truncate(0x1234), 0x34);
        assert_eq!(Size::Word.truncate(0x0001_2345), 0x2345);
        assert_eq!(Size::Long.truncate(0xdead_beef), 0xdead_beef);
    }
}
