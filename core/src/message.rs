//! CCID bulk message framing.
//!
//! Every message on the bulk pipes starts with the same 10-octet header,
//! all multi-octet fields little-endian:
//!
//! ```text
//! Offset  Size  Command (PC -> reader)     Response (reader -> PC)
//! 0       1     bMessageType               bMessageType
//! 1       4     dwLength                   dwLength
//! 5       1     bSlot                      bSlot
//! 6       1     bSeq                       bSeq
//! 7       1     reserved / bPowerSelect    bStatus
//! 8       2     parameter                  bError, bChainParameter
//! 10      N     payload                    payload
//! ```
//!
//! This client never fragments, so a command must fit in one bulk packet.

use crate::status::SlotStatus;

/// Size of the fixed header shared by commands and responses.
pub const HEADER_SIZE: usize = 10;

/// Largest frame this client writes in a single bulk transfer.
pub const MAX_PACKET_SIZE: usize = 64;

/// Largest command payload that still fits in [`MAX_PACKET_SIZE`].
pub const MAX_PAYLOAD_SIZE: usize = MAX_PACKET_SIZE - HEADER_SIZE;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    #[error("Payload of {0} octets does not fit in the 32-bit length field")]
    LengthOverflow(usize),

    #[error("Frame of {len} octets exceeds the single-packet limit of {max} octets")]
    PacketTooLarge { len: usize, max: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Frame of {0} octets is shorter than the 10-octet header")]
    Truncated(usize),

    #[error("Unknown response message type 0x{0:02X}")]
    UnknownMessageType(u8),
}

/// Messages sent from the host to the reader.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandType {
    SetParameters = 0x61,
    IccPowerOn = 0x62,
    IccPowerOff = 0x63,
    GetSlotStatus = 0x65,
    Escape = 0x6B,
    GetParameters = 0x6C,
    ResetParameters = 0x6D,
    IccClock = 0x6E,
    XfrBlock = 0x6F,
    Abort = 0x72,
}

impl CommandType {
    /// The only response type a reader may answer this command with.
    pub fn expected_response(self) -> ResponseType {
        use CommandType::*;

        match self {
            IccPowerOn | XfrBlock => ResponseType::DataBlock,
            IccPowerOff | GetSlotStatus | IccClock | Abort => ResponseType::SlotStatus,
            SetParameters | GetParameters | ResetParameters => ResponseType::Parameters,
            Escape => ResponseType::Escape,
        }
    }
}

impl From<CommandType> for u8 {
    fn from(value: CommandType) -> Self {
        value as u8
    }
}

/// Messages sent from the reader to the host.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResponseType {
    DataBlock = 0x80,
    SlotStatus = 0x81,
    Parameters = 0x82,
    Escape = 0x83,
    DataRateAndClockFrequency = 0x84,
}

impl From<ResponseType> for u8 {
    fn from(value: ResponseType) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for ResponseType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use ResponseType::*;

        Ok(match value {
            0x80 => DataBlock,
            0x81 => SlotStatus,
            0x82 => Parameters,
            0x83 => Escape,
            0x84 => DataRateAndClockFrequency,
            code => return Err(DecodeError::UnknownMessageType(code)),
        })
    }
}

/// A command message to be written to the bulk-OUT endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub message_type: CommandType,
    pub slot: u8,
    pub sequence: u8,
    pub reserved: u8,
    pub parameter: u16,
    pub payload: Vec<u8>,
}

impl Command {
    /// Constructs a command with no payload and zeroed type-specific fields.
    pub fn new(message_type: CommandType, slot: u8, sequence: u8) -> Self {
        Self {
            message_type,
            slot,
            sequence,
            reserved: 0,
            parameter: 0,
            payload: Vec::new(),
        }
    }

    pub fn with_reserved(mut self, reserved: u8) -> Self {
        self.reserved = reserved;
        self
    }

    pub fn with_parameter(mut self, parameter: u16) -> Self {
        self.parameter = parameter;
        self
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    /// Converts the command into octets ready for a single bulk transfer.
    pub fn encode(&self) -> Result<Vec<u8>, EncodingError> {
        let length = check_payload_len(self.payload.len())?;

        let mut buffer = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        buffer.push(self.message_type.into());
        buffer.extend_from_slice(&length.to_le_bytes());
        buffer.push(self.slot);
        buffer.push(self.sequence);
        buffer.push(self.reserved);
        buffer.extend_from_slice(&self.parameter.to_le_bytes());
        buffer.extend_from_slice(&self.payload);

        Ok(buffer)
    }
}

/// Checks that a payload of `len` octets can be framed, returning the value
/// of the length field.
pub fn check_payload_len(len: usize) -> Result<u32, EncodingError> {
    let length = u32::try_from(len).map_err(|_| EncodingError::LengthOverflow(len))?;

    match HEADER_SIZE + len {
        total if total > MAX_PACKET_SIZE => Err(EncodingError::PacketTooLarge {
            len: total,
            max: MAX_PACKET_SIZE,
        }),
        _ => Ok(length),
    }
}

/// A response message read from the bulk-IN endpoint.
///
/// `payload` holds every octet after the header as received; it is not
/// trimmed or checked against `data_length` here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub message_type: ResponseType,
    pub data_length: u32,
    pub slot: u8,
    pub sequence: u8,
    pub status: SlotStatus,
    pub error: u8,
    pub chain_parameter: u8,
    pub payload: Vec<u8>,
}

impl Response {
    /// Parses a response from the octets of one bulk transfer.
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        if raw.len() < HEADER_SIZE {
            return Err(DecodeError::Truncated(raw.len()));
        }

        Ok(Self {
            message_type: ResponseType::try_from(raw[0])?,
            data_length: u32::from_le_bytes([raw[1], raw[2], raw[3], raw[4]]),
            slot: raw[5],
            sequence: raw[6],
            status: SlotStatus::from(raw[7]),
            error: raw[8],
            chain_parameter: raw[9],
            payload: raw[HEADER_SIZE..].to_vec(),
        })
    }

    /// Converts the response into octets, as a reader would send it.
    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        buffer.push(self.message_type.into());
        buffer.extend_from_slice(&self.data_length.to_le_bytes());
        buffer.push(self.slot);
        buffer.push(self.sequence);
        buffer.push(self.status.into());
        buffer.push(self.error);
        buffer.push(self.chain_parameter);
        buffer.extend_from_slice(&self.payload);

        buffer
    }

    /// The payload limited to the advertised `data_length`.
    pub fn data(&self) -> &[u8] {
        let len = usize::try_from(self.data_length).unwrap_or(usize::MAX);

        &self.payload[..len.min(self.payload.len())]
    }
}

/// Short form of [`Command::encode`].
pub fn encode_command(command: &Command) -> Result<Vec<u8>, EncodingError> {
    command.encode()
}

/// Short form of [`Response::decode`].
pub fn decode_response(raw: &[u8]) -> Result<Response, DecodeError> {
    Response::decode(raw)
}
