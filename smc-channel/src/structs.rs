use core::mem::offset_of;

use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::{error::SmcError, fourcc::FourCc};

/// Method selector of the SMC user-client's structured call.
pub const KERNEL_INDEX_SMC: u32 = 2;

/// Byte array type for SMC data.
///
/// SMC values are stored as byte arrays with a maximum length of [`SMC_BYTES_LEN`].
pub type SMCBytes = [u8; SMC_BYTES_LEN];

/// Maximum size in bytes for SMC data.
pub const SMC_BYTES_LEN: usize = 32;

/// Size in bytes of [`SMCParamBlock`], in both directions of a call.
pub const SMC_PARAM_BLOCK_LEN: usize = 80;

/// Operation selector stored in [`SMCParamBlock::command`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    ReadBytes = 5,
    WriteBytes = 6,
    ReadKeyInfo = 9,
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> Self {
        cmd as u8
    }
}

impl TryFrom<u8> for Command {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            5 => Ok(Self::ReadBytes),
            6 => Ok(Self::WriteBytes),
            9 => Ok(Self::ReadKeyInfo),
            other => Err(other),
        }
    }
}

/// The parameter block exchanged with the controller.
///
/// The same 80-byte shape is used as input and output of every call:
///
/// ```text
///  0.. 4  key        (u32, four-character code packed big-endian)
///  4..24  reserved
/// 24..28  data_size  (u32, valid bytes in `data`, at most 32)
/// 28..32  data_type  (u32, four-character code packed big-endian)
/// 32..64  data
/// 64      command
/// 65..68  reserved
/// 68      result     (controller status)
/// 69..80  reserved
/// ```
///
/// All reserved regions are zero on construction and are carried through
/// [`SMCParamBlock::from_bytes`] unchanged.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct SMCParamBlock {
    pub key: u32,
    pub reserved0: [u8; 20],
    pub data_size: u32,
    pub data_type: u32,
    pub data: SMCBytes,
    pub command: u8,
    pub reserved1: [u8; 3],
    pub result: u8,
    pub reserved2: [u8; 3],
    pub reserved3: [u8; 8],
}

// The controller firmware expects this exact shape.
static_assertions::assert_eq_size!(SMCParamBlock, [u8; SMC_PARAM_BLOCK_LEN]);
static_assertions::const_assert_eq!(offset_of!(SMCParamBlock, key), 0);
static_assertions::const_assert_eq!(offset_of!(SMCParamBlock, reserved0), 4);
static_assertions::const_assert_eq!(offset_of!(SMCParamBlock, data_size), 24);
static_assertions::const_assert_eq!(offset_of!(SMCParamBlock, data_type), 28);
static_assertions::const_assert_eq!(offset_of!(SMCParamBlock, data), 32);
static_assertions::const_assert_eq!(offset_of!(SMCParamBlock, command), 64);
static_assertions::const_assert_eq!(offset_of!(SMCParamBlock, reserved1), 65);
static_assertions::const_assert_eq!(offset_of!(SMCParamBlock, result), 68);
static_assertions::const_assert_eq!(offset_of!(SMCParamBlock, reserved2), 69);
static_assertions::const_assert_eq!(offset_of!(SMCParamBlock, reserved3), 72);

impl SMCParamBlock {
    /// A zeroed block addressed to `key` with the given command.
    pub fn request(key: FourCc, command: Command) -> Self {
        Self {
            key: key.to_u32(),
            command: command.into(),
            ..Default::default()
        }
    }

    /// Builds a write request.
    ///
    /// `data.len()` becomes `data_size`; the rest of the data field stays zero.
    /// Payloads longer than [`SMC_BYTES_LEN`] are rejected.
    pub fn write_request(key: FourCc, data_type: FourCc, data: &[u8]) -> Result<Self, SmcError> {
        let size = data.len();
        if size > SMC_BYTES_LEN {
            return Err(SmcError::DataTooLong(size));
        }
        let mut block = Self::request(key, Command::WriteBytes);
        block.data_type = data_type.to_u32();
        block.data_size = size as u32;
        block.data[..size].copy_from_slice(data);
        Ok(block)
    }

    pub fn key_info_request(key: FourCc) -> Self {
        Self::request(key, Command::ReadKeyInfo)
    }

    /// `data_size` and `data_type` should come from a key info response.
    pub fn read_request(key: FourCc, data_type: FourCc, data_size: u32) -> Result<Self, SmcError> {
        if data_size as usize > SMC_BYTES_LEN {
            return Err(SmcError::DataTooLong(data_size as usize));
        }
        let mut block = Self::request(key, Command::ReadBytes);
        block.data_type = data_type.to_u32();
        block.data_size = data_size;
        Ok(block)
    }

    /// Decodes a block from exactly [`SMC_PARAM_BLOCK_LEN`] bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Self::read_from(bytes)
    }

    pub fn key(&self) -> FourCc {
        FourCc::from_u32(self.key)
    }

    pub fn data_type(&self) -> FourCc {
        FourCc::from_u32(self.data_type)
    }

    /// The declared part of the data field, clamped to its capacity.
    pub fn valid_bytes(&self) -> &[u8] {
        let size = std::cmp::min(self.data_size as usize, self.data.len());
        &self.data[..size]
    }

    pub fn reserved_is_zero(&self) -> bool {
        self.reserved0 == [0; 20]
            && self.reserved1 == [0; 3]
            && self.reserved2 == [0; 3]
            && self.reserved3 == [0; 8]
    }
}

/// Metadata about a SMC key.
///
/// Contains the data type and size of a key without its value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyInfo {
    pub data_size: u32,
    pub data_type: FourCc,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> FourCc {
        s.parse().unwrap()
    }

    #[test]
    fn write_request_layout() {
        let block = SMCParamBlock::write_request(key("TC0P"), key("sp78"), &[0x12, 0x34]).unwrap();
        let bytes = block.as_bytes();
        assert_eq!(bytes.len(), SMC_PARAM_BLOCK_LEN);
        assert_eq!(&bytes[0..4], &0x5443_3050u32.to_ne_bytes());
        assert_eq!(&bytes[24..28], &2u32.to_ne_bytes());
        assert_eq!(&bytes[28..32], &u32::from_be_bytes(*b"sp78").to_ne_bytes());
        assert_eq!(&bytes[32..34], &[0x12, 0x34]);
        assert!(bytes[34..64].iter().all(|&b| b == 0));
        assert_eq!(bytes[64], 6);
        assert_eq!(bytes[68], 0);
        assert!(block.reserved_is_zero());
    }

    #[test]
    fn reserved_regions_zero_for_every_size() {
        for size in 0..=SMC_BYTES_LEN {
            let data = vec![0xffu8; size];
            let block = SMCParamBlock::write_request(key("F0Tg"), key("fpe2"), &data).unwrap();
            assert_eq!(block.as_bytes().len(), SMC_PARAM_BLOCK_LEN);
            assert!(block.reserved_is_zero());
            assert_eq!(block.valid_bytes(), &data[..]);
            assert!(block.data[size..].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn oversized_payload_rejected() {
        let data = [0u8; SMC_BYTES_LEN + 1];
        let err = SMCParamBlock::write_request(key("F0Tg"), key("fpe2"), &data).unwrap_err();
        assert!(matches!(err, SmcError::DataTooLong(33)));
        assert!(SMCParamBlock::read_request(key("F0Tg"), key("fpe2"), 33).is_err());
    }

    #[test]
    fn from_bytes_preserves_reserved() {
        let raw: Vec<u8> = (0..SMC_PARAM_BLOCK_LEN as u8).collect();
        let block = SMCParamBlock::from_bytes(&raw).unwrap();
        assert_eq!(block.as_bytes(), &raw[..]);
        assert_eq!(block.command, 64);
        assert_eq!(block.result, 68);
        assert_eq!(block.reserved0[0], 4);
        assert!(SMCParamBlock::from_bytes(&raw[..79]).is_none());
    }

    #[test]
    fn command_bytes() {
        for cmd in [Command::ReadBytes, Command::WriteBytes, Command::ReadKeyInfo] {
            assert_eq!(Command::try_from(u8::from(cmd)), Ok(cmd));
        }
        assert_eq!(Command::try_from(7), Err(7));
    }
}
