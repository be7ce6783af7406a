//! The two status channels of a call: the transport's `kern_return_t` and
//! the controller's `result` byte.

use std::fmt;

/// `kern_return_t` / `IOReturn` as returned by the call primitives.
pub type KernReturn = i32;

const fn iokit_common_err(code: u32) -> KernReturn {
    (0xe000_0000 | code) as KernReturn
}

pub const KERN_SUCCESS: KernReturn = 0;
pub const KERN_INVALID_ARGUMENT: KernReturn = 4;
pub const KERN_FAILURE: KernReturn = 5;
pub const KERN_NO_ACCESS: KernReturn = 8;
pub const KERN_INVALID_NAME: KernReturn = 15;
pub const KERN_NOT_SUPPORTED: KernReturn = 46;
pub const MACH_SEND_INVALID_DEST: KernReturn = 0x1000_0003;

pub const IO_RETURN_ERROR: KernReturn = iokit_common_err(0x2bc);
pub const IO_RETURN_NO_DEVICE: KernReturn = iokit_common_err(0x2c0);
pub const IO_RETURN_NOT_PRIVILEGED: KernReturn = iokit_common_err(0x2c1);
pub const IO_RETURN_BAD_ARGUMENT: KernReturn = iokit_common_err(0x2c2);
pub const IO_RETURN_UNSUPPORTED: KernReturn = iokit_common_err(0x2c7);
pub const IO_RETURN_NOT_OPEN: KernReturn = iokit_common_err(0x2cd);
pub const IO_RETURN_NOT_PERMITTED: KernReturn = iokit_common_err(0x2e2);
pub const IO_RETURN_UNDERRUN: KernReturn = iokit_common_err(0x2e7);
pub const IO_RETURN_NOT_FOUND: KernReturn = iokit_common_err(0x2f0);

/// Failure class of a transport status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernErrorKind {
    /// The service or resource does not exist.
    NotFound,
    InvalidArgument,
    PermissionDenied,
    /// The connection is closed, stale or was never opened.
    InvalidHandle,
    Failure,
}

/// A non-success transport status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub struct KernError(KernReturn);

impl fmt::Display for KernError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:08x})", describe(self.0), self.0)
    }
}

impl KernError {
    /// Returns `None` for `KERN_SUCCESS`.
    pub fn new(code: KernReturn) -> Option<Self> {
        (code != KERN_SUCCESS).then_some(Self(code))
    }

    /// Wraps a status already known to be a failure.
    pub(crate) const fn from_raw(code: KernReturn) -> Self {
        debug_assert!(code != KERN_SUCCESS);
        Self(code)
    }

    /// Maps a raw status to `Ok(())` or the error it carries.
    pub fn check(code: KernReturn) -> Result<(), Self> {
        Self::new(code).map_or(Ok(()), Err)
    }

    pub fn code(&self) -> KernReturn {
        self.0
    }

    pub fn kind(&self) -> KernErrorKind {
        match self.0 {
            IO_RETURN_NOT_FOUND | IO_RETURN_NO_DEVICE | KERN_INVALID_NAME => KernErrorKind::NotFound,
            KERN_INVALID_ARGUMENT | IO_RETURN_BAD_ARGUMENT | IO_RETURN_UNDERRUN => {
                KernErrorKind::InvalidArgument
            }
            KERN_NO_ACCESS | IO_RETURN_NOT_PRIVILEGED | IO_RETURN_NOT_PERMITTED => {
                KernErrorKind::PermissionDenied
            }
            IO_RETURN_NOT_OPEN | MACH_SEND_INVALID_DEST => KernErrorKind::InvalidHandle,
            _ => KernErrorKind::Failure,
        }
    }
}

#[cfg(target_os = "macos")]
fn describe(code: KernReturn) -> std::borrow::Cow<'static, str> {
    crate::iokit::err_str(code)
}

#[cfg(not(target_os = "macos"))]
fn describe(code: KernReturn) -> std::borrow::Cow<'static, str> {
    let s = match code {
        KERN_INVALID_ARGUMENT => "(os/kern) invalid argument",
        KERN_FAILURE => "(os/kern) failure",
        KERN_NO_ACCESS => "(os/kern) protection failure",
        KERN_INVALID_NAME => "(os/kern) invalid name",
        KERN_NOT_SUPPORTED => "(os/kern) not supported",
        MACH_SEND_INVALID_DEST => "(ipc/send) invalid destination port",
        IO_RETURN_ERROR => "(iokit/common) general error",
        IO_RETURN_NO_DEVICE => "(iokit/common) no such device",
        IO_RETURN_NOT_PRIVILEGED => "(iokit/common) privilege violation",
        IO_RETURN_BAD_ARGUMENT => "(iokit/common) invalid argument",
        IO_RETURN_UNSUPPORTED => "(iokit/common) unsupported function",
        IO_RETURN_NOT_OPEN => "(iokit/common) device not open",
        IO_RETURN_NOT_PERMITTED => "(iokit/common) not permitted",
        IO_RETURN_UNDERRUN => "(iokit/common) data underrun",
        IO_RETURN_NOT_FOUND => "(iokit/common) data was not found",
        _ => "unknown error code",
    };
    s.into()
}

/// The controller's verdict, read from [`crate::structs::SMCParamBlock::result`].
///
/// Bytes without a name are kept as [`SmcResult::Other`]; [`SmcResult::code`]
/// always gives back the byte the controller sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SmcResult {
    Success,
    Error,
    CommCollision,
    SpuriousData,
    BadCommand,
    BadParameter,
    KeyNotFound,
    KeyNotReadable,
    KeyNotWritable,
    KeySizeMismatch,
    FramingError,
    BadArgument,
    Timeout,
    KeyIndexRange,
    BadFunctionParameter,
    Other(u8),
}

impl SmcResult {
    pub const fn code(self) -> u8 {
        match self {
            Self::Success => 0x00,
            Self::Error => 0x01,
            Self::CommCollision => 0x80,
            Self::SpuriousData => 0x81,
            Self::BadCommand => 0x82,
            Self::BadParameter => 0x83,
            Self::KeyNotFound => 0x84,
            Self::KeyNotReadable => 0x85,
            Self::KeyNotWritable => 0x86,
            Self::KeySizeMismatch => 0x87,
            Self::FramingError => 0x88,
            Self::BadArgument => 0x89,
            Self::Timeout => 0xb7,
            Self::KeyIndexRange => 0xb8,
            Self::BadFunctionParameter => 0xc0,
            Self::Other(code) => code,
        }
    }

    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<u8> for SmcResult {
    fn from(code: u8) -> Self {
        match code {
            0x00 => Self::Success,
            0x01 => Self::Error,
            0x80 => Self::CommCollision,
            0x81 => Self::SpuriousData,
            0x82 => Self::BadCommand,
            0x83 => Self::BadParameter,
            0x84 => Self::KeyNotFound,
            0x85 => Self::KeyNotReadable,
            0x86 => Self::KeyNotWritable,
            0x87 => Self::KeySizeMismatch,
            0x88 => Self::FramingError,
            0x89 => Self::BadArgument,
            0xb7 => Self::Timeout,
            0xb8 => Self::KeyIndexRange,
            0xc0 => Self::BadFunctionParameter,
            other => Self::Other(other),
        }
    }
}

impl From<SmcResult> for u8 {
    fn from(result: SmcResult) -> Self {
        result.code()
    }
}

impl fmt::Display for SmcResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::CommCollision => "communication collision",
            Self::SpuriousData => "spurious data",
            Self::BadCommand => "bad command",
            Self::BadParameter => "bad parameter",
            Self::KeyNotFound => "key not found",
            Self::KeyNotReadable => "key not readable",
            Self::KeyNotWritable => "key not writable",
            Self::KeySizeMismatch => "key size mismatch",
            Self::FramingError => "framing error",
            Self::BadArgument => "bad argument",
            Self::Timeout => "timeout",
            Self::KeyIndexRange => "key index out of range",
            Self::BadFunctionParameter => "bad function parameter",
            Self::Other(_) => "unknown result",
        };
        write!(f, "{name} (0x{:02x})", self.code())
    }
}
