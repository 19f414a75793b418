//! Decoding of the `bStatus` and `bError` octets of reader responses.

/// Presence and activation state of the card in the slot (bits 0-1).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum IccStatus {
    PresentActive,
    PresentInactive,
    NotPresent,
    Reserved,
}

/// Outcome of the command the response answers (bits 6-7).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum CommandStatus {
    Processed,
    Failed,
    /// The card needs more time; the real answer follows with the same sequence.
    TimeExtension,
    Reserved,
}

/// The raw `bStatus` octet of a response.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SlotStatus(u8);

impl SlotStatus {
    pub fn icc_status(self) -> IccStatus {
        match self.0 & 0x03 {
            0 => IccStatus::PresentActive,
            1 => IccStatus::PresentInactive,
            2 => IccStatus::NotPresent,
            _ => IccStatus::Reserved,
        }
    }

    pub fn command_status(self) -> CommandStatus {
        match self.0 >> 6 {
            0 => CommandStatus::Processed,
            1 => CommandStatus::Failed,
            2 => CommandStatus::TimeExtension,
            _ => CommandStatus::Reserved,
        }
    }

    pub fn is_failed(self) -> bool {
        self.command_status() == CommandStatus::Failed
    }

    pub fn is_time_extension(self) -> bool {
        self.command_status() == CommandStatus::TimeExtension
    }
}

impl From<u8> for SlotStatus {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl From<SlotStatus> for u8 {
    fn from(SlotStatus(value): SlotStatus) -> Self {
        value
    }
}

/// Slot error reported in `bError` when the command failed.
///
/// Values below `0x80` that are not listed name the offset of the
/// offending field in the command.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    #[error("Command aborted")]
    CmdAborted,

    #[error("Card did not respond (ICC mute)")]
    IccMute,

    #[error("Parity error during transfer")]
    XfrParityError,

    #[error("Overrun during transfer")]
    XfrOverrun,

    #[error("Hardware error")]
    HwError,

    #[error("Bad ATR TS octet")]
    BadAtrTs,

    #[error("Bad ATR checksum")]
    BadAtrTck,

    #[error("Card protocol not supported")]
    IccProtocolNotSupported,

    #[error("Card class not supported")]
    IccClassNotSupported,

    #[error("Procedure byte conflict")]
    ProcedureByteConflict,

    #[error("Protocol deactivated")]
    DeactivatedProtocol,

    #[error("Busy with automatic sequence")]
    BusyWithAutoSequence,

    #[error("PIN entry timed out")]
    PinTimeout,

    #[error("PIN entry cancelled")]
    PinCancelled,

    #[error("Slot busy")]
    CmdSlotBusy,

    #[error("Command not supported")]
    CommandNotSupported,

    #[error("Bad parameter at offset {0}")]
    BadParameter(u8),

    #[error("Reader-specific error 0x{0:02X}")]
    Other(u8),
}

impl From<u8> for SlotError {
    fn from(value: u8) -> Self {
        use SlotError::*;

        match value {
            0xFF => CmdAborted,
            0xFE => IccMute,
            0xFD => XfrParityError,
            0xFC => XfrOverrun,
            0xFB => HwError,
            0xF8 => BadAtrTs,
            0xF7 => BadAtrTck,
            0xF6 => IccProtocolNotSupported,
            0xF5 => IccClassNotSupported,
            0xF4 => ProcedureByteConflict,
            0xF3 => DeactivatedProtocol,
            0xF2 => BusyWithAutoSequence,
            0xF0 => PinTimeout,
            0xEF => PinCancelled,
            0xE0 => CmdSlotBusy,
            0x00 => CommandNotSupported,
            offset @ 0x01..=0x7F => BadParameter(offset),
            code => Other(code),
        }
    }
}
