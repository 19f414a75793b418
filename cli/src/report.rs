use std::fmt::{self, Display, Formatter};

use ccid_bulk::atr::Convention;
use ccid_bulk::status::{CommandStatus, IccStatus};
use ccid_bulk::usb::ReaderInfo;
use ccid_bulk::{AnswerToReset, Response};
use serde::Serialize;

#[derive(Serialize)]
pub struct AtrReport {
    pub atr: String,
    pub convention: Option<Convention>,
    pub protocols: Option<Vec<u8>>,
    pub historical_bytes: Option<String>,
}

impl From<&AnswerToReset> for AtrReport {
    fn from(atr: &AnswerToReset) -> Self {
        Self {
            atr: hex::encode_upper(atr.as_bytes()),
            convention: atr.convention(),
            protocols: atr.protocols(),
            historical_bytes: atr.historical_bytes().map(hex::encode_upper),
        }
    }
}

impl Display for AtrReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "ATR = {}", self.atr)?;

        if let Some(convention) = &self.convention {
            writeln!(f, "  convention: {convention:?}")?;
        }

        if let Some(protocols) = &self.protocols {
            let protocols: Vec<String> = protocols.iter().map(|t| format!("T={t}")).collect();
            writeln!(f, "  protocols: {}", protocols.join(", "))?;
        }

        match &self.historical_bytes {
            Some(bytes) => write!(f, "  historical bytes: {bytes}"),
            None => write!(f, "  historical bytes: (truncated ATR)"),
        }
    }
}

#[derive(Serialize)]
pub struct StatusReport {
    pub message_type: u8,
    pub sequence: u8,
    pub icc: IccStatus,
    pub command: CommandStatus,
    pub error: u8,
    pub data: String,
}

impl From<&Response> for StatusReport {
    fn from(response: &Response) -> Self {
        Self {
            message_type: response.message_type.into(),
            sequence: response.sequence,
            icc: response.status.icc_status(),
            command: response.status.command_status(),
            error: response.error,
            data: hex::encode_upper(response.data()),
        }
    }
}

impl Display for StatusReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type=0x{:02X} seq={} icc={:?} command={:?} error=0x{:02X}",
            self.message_type, self.sequence, self.icc, self.command, self.error,
        )?;

        if !self.data.is_empty() {
            write!(f, " data={}", self.data)?;
        }

        Ok(())
    }
}

#[derive(Serialize)]
pub struct TransmitReport {
    pub response: String,
}

impl Display for TransmitReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.response)
    }
}

#[derive(Serialize)]
#[serde(transparent)]
pub struct ReaderList(pub Vec<ReaderInfo>);

impl Display for ReaderList {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "No CCID readers found");
        }

        let lines: Vec<String> = self
            .0
            .iter()
            .map(|r| {
                format!(
                    "{:04X}:{:04X}  bus {:03} address {:03}  interface {}",
                    r.vendor_id, r.product_id, r.bus, r.address, r.interface
                )
            })
            .collect();

        write!(f, "{}", lines.join("\n"))
    }
}
