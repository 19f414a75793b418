//! Session configuration.

use std::time::Duration;

/// Timeout used by the bring-up scripts for every bulk transfer.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// How many time-extension frames are skipped before giving up on a command.
pub const DEFAULT_MAX_TIME_EXTENSIONS: u32 = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Transfer timeout {0:?} is outside 1 ms ..= {max} ms", max = u32::MAX)]
    TimeoutOutOfRange(Duration),
}

/// Voltage requested in `bPowerSelect` when powering the card on.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum Voltage {
    Automatic = 0x00,
    #[default]
    V5 = 0x01,
    V3 = 0x02,
    V1_8 = 0x03,
}

impl From<Voltage> for u8 {
    fn from(value: Voltage) -> Self {
        value as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    /// Deadline for each bulk write and each bulk read.
    pub timeout: Duration,

    /// Slot addressed by every command; `0` for single-slot readers.
    pub slot: u8,

    pub voltage: Voltage,

    pub max_time_extensions: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            slot: 0,
            voltage: Voltage::default(),
            max_time_extensions: DEFAULT_MAX_TIME_EXTENSIONS,
        }
    }
}

impl SessionConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_slot(mut self, slot: u8) -> Self {
        self.slot = slot;
        self
    }

    pub fn with_voltage(mut self, voltage: Voltage) -> Self {
        self.voltage = voltage;
        self
    }

    pub fn with_max_time_extensions(mut self, max_time_extensions: u32) -> Self {
        self.max_time_extensions = max_time_extensions;
        self
    }

    /// Rejects settings the transfer layer would misinterpret.
    /// libusb takes whole milliseconds as a 32-bit value and treats 0 as
    /// "wait forever", so the timeout must land in `1..=u32::MAX` ms.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let millis = self.timeout.as_millis();
        if millis == 0 || millis > u128::from(u32::MAX) {
            return Err(ConfigError::TimeoutOutOfRange(self.timeout));
        }

        Ok(())
    }
}
