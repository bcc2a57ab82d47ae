//! The USB stack the directory is built on.
//!
//! [`Transport`] is the capability interface consumed by the rest of the
//! crate: enumeration, descriptor queries, handle open/close, native
//! reference counting and blocking bulk transfers. [`Libusb`] implements it
//! on top of libusb-1.0.

pub(crate) mod libusb;
#[cfg(test)]
pub(crate) mod sim;

use std::{fmt::Debug, time::Duration};

pub use self::libusb::{Libusb, LibusbDevice, LibusbDeviceList, LibusbHandle};
use crate::{descriptor::DeviceDescriptor, TransferError, UsbError};

/// Primitives the device directory needs from a USB stack.
///
/// Devices are opaque, copyable references into the stack. They stay valid
/// while the [`DeviceList`](Transport::DeviceList) they came from is alive, or
/// for as long as a reference taken with [`ref_device`](Transport::ref_device)
/// is held.
pub trait Transport {
    /// Opaque native device.
    type Device: Copy + Debug;
    /// Opaque native connection handle.
    type Handle: Debug;
    /// Owned enumeration result. Dropping it releases the enumeration buffer.
    type DeviceList: AsRef<[Self::Device]>;

    /// Initialise the USB subsystem. Calling this more than once is harmless.
    fn init(&self) -> Result<(), UsbError>;

    /// List every device currently attached.
    fn list_devices(&self) -> Result<Self::DeviceList, UsbError>;

    /// Read the device descriptor of `device`.
    fn device_descriptor(&self, device: Self::Device) -> Result<DeviceDescriptor, UsbError>;

    /// Take a native reference on `device`.
    fn ref_device(&self, device: Self::Device);

    /// Release a reference taken with [`ref_device`](Transport::ref_device).
    fn unref_device(&self, device: Self::Device);

    /// Open a connection to `device`.
    fn open(&self, device: Self::Device) -> Result<Self::Handle, UsbError>;

    /// Close a connection returned by [`open`](Transport::open).
    fn close(&self, handle: Self::Handle);

    /// Request string descriptor `index` in `language` into `buf`.
    ///
    /// Returns the number of bytes written into `buf`.
    fn string_descriptor(
        &self,
        handle: &Self::Handle,
        index: u8,
        language: u16,
        buf: &mut [u8],
    ) -> Result<usize, UsbError>;

    /// Perform one blocking bulk transfer on `endpoint`.
    ///
    /// A `timeout` of `None` waits forever. On failure the error carries the
    /// number of bytes written into `buf` before the transfer failed.
    fn bulk_transfer(
        &self,
        handle: &Self::Handle,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<usize, TransferError>;
}
