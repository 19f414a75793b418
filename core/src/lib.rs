//! A crate to drive a smart-card reader through raw USB CCID bulk transfers.

#[cfg(feature = "usb")]
pub mod usb;

pub mod atr;
pub mod config;
pub mod error;
pub mod message;
pub mod sequence;
pub mod session;
pub mod status;
pub mod transport;

pub use atr::AnswerToReset;
pub use config::{SessionConfig, Voltage};
pub use error::{CcidError, Result};
pub use message::{decode_response, encode_command, Command, CommandType, Response, ResponseType};
pub use sequence::SequenceTracker;
pub use session::{PowerState, Session};
pub use transport::{BulkTransport, TransportError};
