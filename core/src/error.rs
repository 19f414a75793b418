use crate::config::ConfigError;
use crate::message::{EncodingError, ResponseType};
use crate::status::{IccStatus, SlotError};
use crate::transport::TransportError;

/// Failures of a command/response exchange.
///
/// None of these poison the session: the sequence counter has already moved
/// past the failed exchange and the next call starts cleanly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CcidError {
    #[error("Could not frame the command: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Timed out waiting for the reader")]
    Timeout,

    #[error("Reader accepted {written} of {expected} octets")]
    ShortWrite { written: usize, expected: usize },

    #[error("Response of {0} octets is shorter than a message header")]
    ShortRead(usize),

    #[error("Response sequence {actual} does not match command sequence {expected}")]
    SequenceMismatch { expected: u8, actual: u8 },

    #[error("Response slot {actual} does not match command slot {expected}")]
    SlotMismatch { expected: u8, actual: u8 },

    #[error("Expected {expected:?} response, got message type 0x{actual:02X}")]
    UnexpectedMessageType { expected: ResponseType, actual: u8 },

    #[error("Reader reported a failed command ({icc:?}): {error}")]
    CommandFailed { icc: IccStatus, error: SlotError },

    #[error("Chained response (bChainParameter 0x{0:02X}) is not supported")]
    ChainingUnsupported(u8),

    #[error("Card requested more than {0} time extensions")]
    TooManyTimeExtensions(u32),

    #[error("Transport error: {0}")]
    Transport(TransportError),

    #[error("Invalid session configuration: {0}")]
    Config(#[from] ConfigError),
}

impl From<TransportError> for CcidError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Timeout => CcidError::Timeout,
            error => CcidError::Transport(error),
        }
    }
}

pub type Result<T> = std::result::Result<T, CcidError>;
