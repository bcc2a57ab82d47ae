//! A small directory of attached USB devices, built for talking to serial
//! converters such as FTDI's FT232/FT2232/FT4232 families.
//!
//! The crate finds devices by vendor and product ID, reads their string
//! descriptors (serial number, manufacturer and product) as proper Unicode,
//! and performs raw bulk reads from an opened device.
//!
//! # What This Crate Does
//!
//! - Device enumeration with a vendor/product filter, or a built-in list of
//!   FTDI products
//! - UTF-16LE string descriptor decoding, without the ASCII down-conversion
//!   many USB helpers apply
//! - Scoped ownership of native device references and handles
//! - Blocking bulk reads, with or without a deadline
//!
//! Interface claiming, write transfers, isochronous and interrupt transfers,
//! and hot-plug events are out of scope. If needed, the raw libusb bindings are
//! available in the [`ffi`] module.
//!
//! # Requirements
//!
//! libusb-1.0 must be available on the target platform. Enable the `vendored`
//! feature to build it from source instead.
//!
//! # Background
//!
//! A USB device describes itself through descriptors. The device descriptor
//! carries the vendor and product IDs together with *indices* of human-readable
//! strings; each string has to be fetched separately with a control transfer,
//! in one of the languages listed by string descriptor 0. The text comes back
//! as little-endian UTF-16.
//!
//! Data moves through endpoints. Bulk endpoints are used for large transfers
//! where correctness matters more than latency. An endpoint address with bit 7
//! set (e.g. `0x85`) is an IN endpoint, carrying data from the device to the
//! host.
//!
//! ## Error Handling
//!
//! Every failure is returned to the caller immediately; nothing is retried.
//! By default a device that cannot be resolved aborts the whole scan, see
//! [`ErrorPolicy`]. Bulk reads return a [`TransferError`], which keeps the
//! number of bytes that arrived before the failure.
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade and never installs a logger.
//! Enumeration is reported at `debug` level, individual descriptor reads and
//! transfers at `trace`.
//!
//! ## Resource Ownership
//!
//! Each [`DeviceRecord`] owns one native reference on its device, and each
//! [`OpenHandle`] owns one native handle. Both are released exactly once, when
//! the value is dropped or closed. The transport itself is shared through an
//! `Arc`, so libusb stays initialised until the last record and handle is gone.
//!
//! # Simple Example
//!
//! ```no_run
//! use usbdir::{Directory, VendorProductFilter};
//!
//! // Scan for FTDI devices.
//! let directory = Directory::libusb();
//! let devices = directory
//!     .find_all(VendorProductFilter::FTDI)
//!     .expect("failed to list devices");
//!
//! // Open the first device found.
//! let handle = devices[0].open().expect("failed to open device");
//!
//! // Read from IN endpoint 1, waiting as long as it takes.
//! let mut buf = vec![0; 512];
//! let n = handle.bulk_read(0x81, &mut buf).expect("bulk read failed");
//! println!("{} sent {:?}", devices[0].serial(), &buf[..n]);
//! ```
#![warn(clippy::all, clippy::pedantic, clippy::cargo, missing_docs)]
// Error conditions are those of libusb, which documents them per function.
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

pub mod descriptor;
mod device;
mod endpoint;
mod error;
pub mod ffi;
mod filter;
pub mod prelude;
mod scan;
pub mod transport;

pub use device::{DeviceRecord, OpenHandle};
pub use endpoint::Endpoint;
pub(crate) use error::try_libusb;
pub use error::{Error, MalformedDescriptor, Result, TransferError, UsbError};
pub use filter::{VendorProductFilter, FTDI_PRODUCT_IDS, FTDI_VENDOR_ID};
pub use scan::{Directory, ErrorPolicy, ScanOptions};
pub use transport::{Libusb, Transport};

/// Get the version of the linked libusb.
#[must_use]
pub fn library_version() -> Version {
    let (major, minor, micro, nano) = transport::libusb::version();
    Version {
        major,
        minor,
        micro,
        nano,
    }
}

/// libusb library version.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Version {
    major: u16,
    minor: u16,
    micro: u16,
    nano: u32,
}

impl Version {
    /// Major version number.
    #[must_use]
    pub fn major(&self) -> u16 {
        self.major
    }

    /// Minor version number.
    #[must_use]
    pub fn minor(&self) -> u16 {
        self.minor
    }

    /// Micro version number.
    #[must_use]
    pub fn micro(&self) -> u16 {
        self.micro
    }

    /// Nano version number.
    #[must_use]
    pub fn nano(&self) -> u32 {
        self.nano
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "libusb v{}.{}.{}.{}",
            self.major, self.minor, self.micro, self.nano
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_display() {
        let version = Version {
            major: 1,
            minor: 0,
            micro: 26,
            nano: 11791,
        };
        assert_eq!(version.to_string(), "libusb v1.0.26.11791");
    }
}
