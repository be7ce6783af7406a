//! Four-character codes used for SMC keys and data types.
//!
//! The controller reads a code as a 32-bit integer whose most significant
//! byte is the first character, so `"TC0P"` travels as `0x5443_3050`.

use std::{borrow::Cow, fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FourCcError {
    #[error("expected exactly 4 bytes, got {0}")]
    InvalidLength(usize),
    #[error("code contains a non-ASCII byte")]
    NonAscii,
}

/// A 4-character code such as the key `TC0P` or the data type `sp78`.
///
/// Type names shorter than 4 characters carry trailing spaces (`"ui8 "`),
/// so every code is exactly 4 bytes.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FourCc([u8; 4]);

impl FourCc {
    /// Wraps raw bytes without validation, for literals like `FourCc::new(*b"TC0P")`.
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Validates that `bytes` is exactly 4 ASCII bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FourCcError> {
        let Ok(code) = <[u8; 4]>::try_from(bytes) else {
            return Err(FourCcError::InvalidLength(bytes.len()));
        };
        if !code.is_ascii() {
            return Err(FourCcError::NonAscii);
        }
        Ok(Self(code))
    }

    /// Decodes a code as packed in a parameter block.
    pub const fn from_u32(packed: u32) -> Self {
        Self(packed.to_be_bytes())
    }

    /// Packs the code most-significant-byte first.
    pub const fn to_u32(self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

impl FromStr for FourCc {
    type Err = FourCcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(s.as_bytes())
    }
}

impl TryFrom<&str> for FourCc {
    type Error = FourCcError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<FourCc> for u32 {
    fn from(code: FourCc) -> Self {
        code.to_u32()
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({:?})", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_most_significant_byte_first() {
        let key: FourCc = "TC0P".parse().unwrap();
        assert_eq!(key.to_u32(), 0x5443_3050);
        assert_eq!(FourCc::new(*b"sp78").to_u32(), 0x7370_3738);
    }

    #[test]
    fn round_trip_through_packed_form() {
        for s in ["TC0P", "sp78", "ui8 ", "FS! ", "#KEY", "F0Md", "ch8*", "ZZZZ"] {
            let code: FourCc = s.parse().unwrap();
            let back = FourCc::from_u32(code.to_u32());
            assert_eq!(back, code);
            assert_eq!(back.to_string(), s);
        }
    }

    #[test]
    fn round_trip_all_printable() {
        for c in b' '..=b'~' {
            let code = FourCc::from_bytes(&[c, b'a', c, b'0']).unwrap();
            assert_eq!(FourCc::from_u32(code.to_u32()).as_bytes(), &[c, b'a', c, b'0']);
        }
    }

    #[test]
    fn rejects_bad_codes() {
        assert_eq!("TC0".parse::<FourCc>(), Err(FourCcError::InvalidLength(3)));
        assert_eq!("TC0PX".parse::<FourCc>(), Err(FourCcError::InvalidLength(5)));
        assert_eq!("".parse::<FourCc>(), Err(FourCcError::InvalidLength(0)));
        assert_eq!("TCé".parse::<FourCc>(), Err(FourCcError::NonAscii));
    }

    #[test]
    fn debug_shows_text() {
        assert_eq!(format!("{:?}", FourCc::new(*b"F0Tg")), "FourCc(\"F0Tg\")");
    }
}
