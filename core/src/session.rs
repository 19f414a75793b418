//! Stateful CCID client driving one claimed reader interface.
//!
//! ## Exchange discipline
//! Every call writes exactly one command and reads until the matching
//! response arrives. A response is accepted only if
//!
//! - it is at least one header long,
//! - its `bSeq` equals the sequence number of the command just written,
//! - its `bSlot` equals the configured slot, and
//! - its message type is the reply defined for the command.
//!
//! Bulk pipes carry no checksum, so these checks are the only protection
//! against stale, truncated or misrouted frames. Nothing is retried: a
//! repeated power transition is worse than a reported error.
//!
//! ## Usage
//! ```rust,no_run
//! # #[cfg(feature = "usb")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use ccid_bulk::usb::UsbReader;
//! use ccid_bulk::{Session, SessionConfig};
//!
//! let reader = UsbReader::open(0x072F, 0x90CC)?;
//! let mut session = Session::new(reader, SessionConfig::default())?;
//!
//! session.power_off()?;
//! let atr = session.power_on()?;
//! assert!(atr.starts_with(&[0x3B]));
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "usb"))]
//! # fn main() {}
//! ```

#[cfg(feature = "tracing")]
use tracing::{debug, info, warn};

use crate::atr::AnswerToReset;
use crate::config::SessionConfig;
use crate::error::{CcidError, Result};
use crate::message::{check_payload_len, Command, CommandType, DecodeError, Response};
use crate::sequence::SequenceTracker;
use crate::status::SlotError;
use crate::transport::BulkTransport;

#[cfg(not(feature = "tracing"))]
macro_rules! debug {
    ($($t: tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! info {
    ($($t: tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! warn {
    ($($t: tt)*) => {};
}

/// Largest single bulk-IN transfer requested from the transport.
const READ_BUFFER_SIZE: usize = 1024;

/// `bChainParameter` of a data block that holds the whole answer.
const CHAIN_BEGINS_AND_ENDS: u8 = 0x00;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum PowerState {
    /// Nothing was switched yet in this session.
    Unknown,
    PoweredOn,
    PoweredOff,
}

/// A CCID session over one bulk pipe pair.
///
/// The session exclusively owns the transport and the sequence counter;
/// only one command is ever in flight.
pub struct Session<T>
where
    T: BulkTransport,
{
    transport: T,
    config: SessionConfig,
    sequence: SequenceTracker,
    last_atr: Option<AnswerToReset>,
    power_state: PowerState,
}

impl<T> Session<T>
where
    T: BulkTransport,
{
    /// Opens a session on a claimed interface.
    pub fn new(transport: T, config: SessionConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            transport,
            config,
            sequence: SequenceTracker::new(),
            last_atr: None,
            power_state: PowerState::Unknown,
        })
    }

    /// Powers the card on and returns its Answer-To-Reset.
    ///
    /// Checking the ATR contents against the expected card is left to the caller.
    pub fn power_on(&mut self) -> Result<AnswerToReset> {
        let voltage = self.config.voltage.into();
        let response = self.exchange(CommandType::IccPowerOn, voltage, Vec::new())?;
        ensure_processed(&response)?;

        let atr = AnswerToReset::new(reconcile(&response));
        info!("Card powered on, ATR: {}", hex::encode(atr.as_bytes()));

        self.last_atr = Some(atr.clone());
        self.power_state = PowerState::PoweredOn;

        Ok(atr)
    }

    /// Powers the card off and returns the slot status envelope as received.
    ///
    /// A reader answering with a failed command status leaves the power
    /// state and the stored ATR untouched.
    pub fn power_off(&mut self) -> Result<Response> {
        let response = self.exchange(CommandType::IccPowerOff, 0, Vec::new())?;

        if response.status.is_failed() {
            warn!("Power off failed: {}", SlotError::from(response.error));
        } else {
            info!("Card powered off");

            self.last_atr = None;
            self.power_state = PowerState::PoweredOff;
        }

        Ok(response)
    }

    /// Queries the slot without changing the card's power state.
    pub fn slot_status(&mut self) -> Result<Response> {
        self.exchange(CommandType::GetSlotStatus, 0, Vec::new())
    }

    /// Sends an APDU to the powered card and returns the card's answer,
    /// status words included.
    ///
    /// Only short exchanges are supported: the APDU must fit in one packet
    /// and the answer must arrive as a single, unchained data block.
    pub fn transmit(&mut self, apdu: &[u8]) -> Result<Vec<u8>> {
        let response = self.exchange(CommandType::XfrBlock, 0, apdu.to_vec())?;
        ensure_processed(&response)?;

        match response.chain_parameter {
            CHAIN_BEGINS_AND_ENDS => Ok(reconcile(&response)),
            chain => Err(CcidError::ChainingUnsupported(chain)),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn sequence(&self) -> &SequenceTracker {
        &self.sequence
    }

    /// The ATR of the last successful power-on, cleared by power-off.
    pub fn last_atr(&self) -> Option<&AnswerToReset> {
        self.last_atr.as_ref()
    }

    pub fn power_state(&self) -> PowerState {
        self.power_state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Ends the session, handing the interface back for release.
    pub fn into_transport(self) -> T {
        self.transport
    }

    fn exchange(
        &mut self,
        message_type: CommandType,
        reserved: u8,
        payload: Vec<u8>,
    ) -> Result<Response> {
        // Reject unframeable payloads before a sequence number is spent.
        check_payload_len(payload.len())?;

        let command = Command::new(message_type, self.config.slot, self.sequence.next())
            .with_reserved(reserved)
            .with_payload(payload);
        let frame = command.encode()?;

        debug!("TX: {}", hex::encode(&frame));

        let written = self.transport.write_bulk(&frame, self.config.timeout)?;
        if written != frame.len() {
            return Err(CcidError::ShortWrite {
                written,
                expected: frame.len(),
            });
        }

        let mut extensions = 0u32;
        loop {
            let raw = self
                .transport
                .read_bulk(READ_BUFFER_SIZE, self.config.timeout)?;

            debug!("RX: {}", hex::encode(&raw));

            let response = self.validate(&command, &raw)?;
            if !response.status.is_time_extension() {
                return Ok(response);
            }

            extensions += 1;
            if extensions > self.config.max_time_extensions {
                return Err(CcidError::TooManyTimeExtensions(
                    self.config.max_time_extensions,
                ));
            }

            debug!("Card requested a time extension ({} so far)", extensions);
        }
    }

    fn validate(&self, command: &Command, raw: &[u8]) -> Result<Response> {
        let expected = command.message_type.expected_response();
        let response = Response::decode(raw).map_err(|e| match e {
            DecodeError::Truncated(len) => CcidError::ShortRead(len),
            DecodeError::UnknownMessageType(actual) => {
                CcidError::UnexpectedMessageType { expected, actual }
            }
        })?;

        let sequence = self.sequence.current();
        if response.sequence != sequence {
            return Err(CcidError::SequenceMismatch {
                expected: sequence,
                actual: response.sequence,
            });
        }

        if response.slot != command.slot {
            return Err(CcidError::SlotMismatch {
                expected: command.slot,
                actual: response.slot,
            });
        }

        if response.message_type != expected {
            return Err(CcidError::UnexpectedMessageType {
                expected,
                actual: response.message_type.into(),
            });
        }

        Ok(response)
    }
}

fn ensure_processed(response: &Response) -> Result<()> {
    match response.status.is_failed() {
        true => Err(CcidError::CommandFailed {
            icc: response.status.icc_status(),
            error: SlotError::from(response.error),
        }),
        _ => Ok(()),
    }
}

/// Cuts the payload down to `dwLength`, tolerating readers that pad or
/// truncate their packets.
fn reconcile(response: &Response) -> Vec<u8> {
    let data = response.data();

    if data.len() < response.payload.len() {
        warn!(
            "Dropping {} octets of padding",
            response.payload.len() - data.len()
        );
    } else if (data.len() as u64) < u64::from(response.data_length) {
        warn!(
            "Reader announced {} octets but sent {}",
            response.data_length,
            data.len()
        );
    }

    data.to_vec()
}
