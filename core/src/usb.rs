//! libusb support for ccid-bulk.
//! Can be enabled by turning `usb` feature on.
//!
//! ## Why bypass PC/SC?
//! pcscd claims every CCID interface it sees. When it is not running, or
//! when a reader misbehaves badly enough that pcscd refuses it, the bulk
//! pipes can be driven directly. Stop pcscd before opening a reader here,
//! or the interface claim fails with [`Error::InterfaceBusy`].
//!
//! ## Usage
//! ```rust,no_run
//! use ccid_bulk::usb::{list_readers, UsbReader};
//!
//! for info in list_readers().unwrap() {
//!     println!("{:04x}:{:04x}", info.vendor_id, info.product_id);
//! }
//!
//! let reader = UsbReader::open(0x072F, 0x90CC).unwrap();
//! ```

use std::time::Duration;

use rusb::{Context, Device, DeviceHandle, Direction, TransferType, UsbContext};

#[cfg(feature = "tracing")]
use tracing::debug;

use crate::transport::{BulkTransport, TransportError};

#[cfg(not(feature = "tracing"))]
macro_rules! debug {
    ($($t: tt)*) => {};
}

/// Interface class of smart-card readers.
pub const CLASS_CCID: u8 = 0x0B;
pub const SUBCLASS_NONE: u8 = 0x00;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Error occurred while communicating with libusb: {0}")]
    Usb(#[from] rusb::Error),

    #[error("No device {vendor_id:04x}:{product_id:04x} with a CCID interface found")]
    ReaderNotFound { vendor_id: u16, product_id: u16 },

    #[error("CCID interface {interface} is held by another process (is pcscd running? stop it and retry): {source}")]
    InterfaceBusy {
        interface: u8,
        source: rusb::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// A USB device exposing a CCID interface.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ReaderInfo {
    pub vendor_id: u16,
    pub product_id: u16,
    pub bus: u8,
    pub address: u8,
    pub interface: u8,
}

/// Bulk endpoints of a CCID interface.
struct Endpoints {
    interface: u8,
    bulk_in: u8,
    bulk_out: u8,
}

/// A reader whose CCID interface is claimed for this process.
///
/// The interface is released when the reader is dropped.
pub struct UsbReader {
    handle: DeviceHandle<Context>,
    interface: u8,
    bulk_in: u8,
    bulk_out: u8,
}

impl UsbReader {
    /// Opens the first device matching the IDs and claims its CCID interface.
    pub fn open(vendor_id: u16, product_id: u16) -> Result<Self> {
        let context = Context::new()?;

        for device in context.devices()?.iter() {
            let descriptor = match device.device_descriptor() {
                Ok(d) => d,
                Err(_) => continue,
            };

            if descriptor.vendor_id() != vendor_id || descriptor.product_id() != product_id {
                continue;
            }

            if let Some(endpoints) = find_ccid_endpoints(&device)? {
                return Self::claim(&device, endpoints);
            }
        }

        Err(Error::ReaderNotFound {
            vendor_id,
            product_id,
        })
    }

    fn claim(device: &Device<Context>, endpoints: Endpoints) -> Result<Self> {
        let Endpoints {
            interface,
            bulk_in,
            bulk_out,
        } = endpoints;

        debug!(
            "Claiming CCID interface {} (IN=0x{:02x} OUT=0x{:02x})",
            interface, bulk_in, bulk_out
        );

        let handle = device.open()?;

        #[cfg(target_os = "linux")]
        {
            if handle.kernel_driver_active(interface).unwrap_or(false) {
                handle.detach_kernel_driver(interface)?;
            }
        }

        handle
            .claim_interface(interface)
            .map_err(|e| claim_error(interface, e))?;

        Ok(Self {
            handle,
            interface,
            bulk_in,
            bulk_out,
        })
    }

    pub fn interface(&self) -> u8 {
        self.interface
    }
}

impl BulkTransport for UsbReader {
    fn write_bulk(
        &mut self,
        data: &[u8],
        timeout: Duration,
    ) -> std::result::Result<usize, TransportError> {
        self.handle
            .write_bulk(self.bulk_out, data, timeout)
            .map_err(transport_error)
    }

    fn read_bulk(
        &mut self,
        max_len: usize,
        timeout: Duration,
    ) -> std::result::Result<Vec<u8>, TransportError> {
        let mut buf = vec![0u8; max_len];
        let read = self
            .handle
            .read_bulk(self.bulk_in, &mut buf, timeout)
            .map_err(transport_error)?;

        buf.truncate(read);
        Ok(buf)
    }
}

impl Drop for UsbReader {
    fn drop(&mut self) {
        let _ = self.handle.release_interface(self.interface);
    }
}

/// Lists every connected device that exposes a CCID interface.
pub fn list_readers() -> Result<Vec<ReaderInfo>> {
    let context = Context::new()?;
    let mut readers = Vec::new();

    for device in context.devices()?.iter() {
        let descriptor = match device.device_descriptor() {
            Ok(d) => d,
            Err(_) => continue,
        };

        // Devices we may not inspect are simply not listed.
        if let Ok(Some(endpoints)) = find_ccid_endpoints(&device) {
            readers.push(ReaderInfo {
                vendor_id: descriptor.vendor_id(),
                product_id: descriptor.product_id(),
                bus: device.bus_number(),
                address: device.address(),
                interface: endpoints.interface,
            });
        }
    }

    Ok(readers)
}

fn find_ccid_endpoints(device: &Device<Context>) -> Result<Option<Endpoints>> {
    let config = device.active_config_descriptor()?;

    for interface in config.interfaces() {
        for descriptor in interface.descriptors() {
            if descriptor.class_code() != CLASS_CCID
                || descriptor.sub_class_code() != SUBCLASS_NONE
            {
                continue;
            }

            let mut bulk_in = None;
            let mut bulk_out = None;

            for endpoint in descriptor.endpoint_descriptors() {
                if endpoint.transfer_type() != TransferType::Bulk {
                    continue;
                }

                match endpoint.direction() {
                    Direction::In => bulk_in = Some(endpoint.address()),
                    Direction::Out => bulk_out = Some(endpoint.address()),
                }
            }

            if let (Some(bulk_in), Some(bulk_out)) = (bulk_in, bulk_out) {
                return Ok(Some(Endpoints {
                    interface: descriptor.interface_number(),
                    bulk_in,
                    bulk_out,
                }));
            }
        }
    }

    Ok(None)
}

fn claim_error(interface: u8, error: rusb::Error) -> Error {
    match error {
        rusb::Error::Busy | rusb::Error::Access => Error::InterfaceBusy {
            interface,
            source: error,
        },
        e => Error::Usb(e),
    }
}

fn transport_error(error: rusb::Error) -> TransportError {
    match error {
        rusb::Error::Timeout => TransportError::Timeout,
        rusb::Error::NoDevice => TransportError::Disconnected,
        e => TransportError::Io(e.to_string()),
    }
}
