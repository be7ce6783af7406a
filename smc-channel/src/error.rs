use thiserror::Error;

use crate::{
    fourcc::{FourCc, FourCcError},
    status::{KernError, SmcResult},
    structs::SMC_BYTES_LEN,
};

#[derive(Debug, Error)]
pub enum SmcError {
    /// The call primitive itself failed; no part of the response is usable.
    #[error("transport error: {0}")]
    Transport(#[from] KernError),

    /// The controller refused or failed the operation.
    ///
    /// Only produced by [`crate::channel::SmcResponse::into_checked`]; the
    /// exchange methods report controller results as data.
    #[error("controller error: {0}")]
    Controller(SmcResult),

    #[error("payload of {0} bytes exceeds the {max}-byte data field", max = SMC_BYTES_LEN)]
    DataTooLong(usize),

    #[error("invalid four-character code: {0}")]
    InvalidCode(#[from] FourCcError),

    #[error("invalid service name {0:?}")]
    InvalidServiceName(String),

    /// Key info declared a size the data field can not hold.
    #[error("{key} declares {data_size} bytes, more than the {max}-byte data field", max = SMC_BYTES_LEN)]
    KeyInfoTooLarge { key: FourCc, data_size: u32 },

    /// Key info declared a size of zero, so there is no value to read.
    #[error("{0} holds no data")]
    EmptyKey(FourCc),
}

pub type Result<T> = std::result::Result<T, SmcError>;

impl SmcError {
    /// The transport status, if this is a transport failure.
    pub fn kern_error(&self) -> Option<KernError> {
        match self {
            Self::Transport(err) => Some(*err),
            _ => None,
        }
    }
}
