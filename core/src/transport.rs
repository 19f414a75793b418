//! The bulk pipe pair a session talks through.
//!
//! A binding owns a claimed USB interface with one bulk-OUT and one
//! bulk-IN endpoint. Enumeration and claiming happen before a session
//! exists; see the `usb` module for the libusb binding.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Transfer timed out")]
    Timeout,

    #[error("Device disconnected")]
    Disconnected,

    #[error("Transfer failed: {0}")]
    Io(String),
}

/// Raw bulk transfers on an already claimed CCID interface.
pub trait BulkTransport {
    /// Writes `data` to the bulk-OUT endpoint, returning the number of octets accepted.
    fn write_bulk(&mut self, data: &[u8], timeout: Duration) -> Result<usize, TransportError>;

    /// Reads one transfer of at most `max_len` octets from the bulk-IN endpoint.
    fn read_bulk(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError>;
}

impl<T> BulkTransport for Box<T>
where
    T: BulkTransport + ?Sized,
{
    fn write_bulk(&mut self, data: &[u8], timeout: Duration) -> Result<usize, TransportError> {
        (**self).write_bulk(data, timeout)
    }

    fn read_bulk(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        (**self).read_bulk(max_len, timeout)
    }
}
