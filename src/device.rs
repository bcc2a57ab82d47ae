use std::{
    fmt::Display,
    mem::ManuallyDrop,
    sync::Arc,
    time::Duration,
};

use log::{debug, trace, warn};

use crate::{
    descriptor::{
        decode_language_id, decode_string, DeviceDescriptor, LanguageId, STRING_DESCRIPTOR_BUF_LEN,
    },
    scan::ScanOptions,
    transport::Transport,
    Endpoint, Error, MalformedDescriptor, Result, TransferError, UsbError,
};

/// One native device reference, released when dropped.
#[derive(Debug)]
pub(crate) struct DeviceRef<T: Transport> {
    transport: Arc<T>,
    raw: T::Device,
}

impl<T: Transport> DeviceRef<T> {
    /// Take a new reference on `raw`.
    pub(crate) fn acquire(transport: Arc<T>, raw: T::Device) -> Self {
        transport.ref_device(raw);
        Self { transport, raw }
    }
}

impl<T: Transport> Clone for DeviceRef<T> {
    fn clone(&self) -> Self {
        Self::acquire(Arc::clone(&self.transport), self.raw)
    }
}

impl<T: Transport> Drop for DeviceRef<T> {
    fn drop(&mut self) {
        self.transport.unref_device(self.raw);
    }
}

/// A device found by [`Directory::scan`](crate::Directory::scan).
///
/// The record owns a native reference on the device, so it remains valid
/// after the enumeration that found it has finished. The reference is
/// released when the record is dropped or [closed](DeviceRecord::close).
///
/// # Example
///
/// ```no_run
/// use usbdir::{Directory, VendorProductFilter};
///
/// let directory = Directory::libusb();
/// for record in directory.find_all(VendorProductFilter::FTDI).unwrap() {
///     println!("{record}");
/// }
/// ```
#[derive(Debug)]
pub struct DeviceRecord<T: Transport> {
    device: DeviceRef<T>,
    descriptor: DeviceDescriptor,
    language: LanguageId,
    serial: String,
    manufacturer: Option<String>,
    product: Option<String>,
}

impl<T: Transport> DeviceRecord<T> {
    /// Read the strings of a device that passed the filter.
    ///
    /// A transient handle is opened for the descriptor requests and closed on
    /// every path out of this function. Only the serial number is required;
    /// the manufacturer and product strings are left out if they cannot be read.
    pub(crate) fn resolve(
        transport: &Arc<T>,
        raw: T::Device,
        descriptor: DeviceDescriptor,
        options: &ScanOptions,
    ) -> Result<Self> {
        let device = DeviceRef::acquire(Arc::clone(transport), raw);
        let handle = OpenHandle::open(&device)?;
        let language = handle.language()?;
        let serial = handle
            .read_string(descriptor.serial_index, language)?
            .filter(|serial| !serial.is_empty())
            .ok_or(Error::MissingSerial {
                vendor_id: descriptor.vendor_id,
                product_id: descriptor.product_id,
            })?;
        let manufacturer = if options.reads_manufacturer() {
            handle.read_optional_string(descriptor.manufacturer_index, language, "manufacturer")
        } else {
            None
        };
        let product = if options.reads_product() {
            handle.read_optional_string(descriptor.product_index, language, "product")
        } else {
            None
        };
        handle.close();
        debug!(
            "resolved {:04x}:{:04x} serial {serial:?}",
            descriptor.vendor_id, descriptor.product_id
        );
        Ok(Self {
            device,
            descriptor,
            language,
            serial,
            manufacturer,
            product,
        })
    }

    /// Open a persistent handle to the device.
    pub fn open(&self) -> Result<OpenHandle<T>> {
        OpenHandle::open(&self.device)
    }

    /// Release the native device reference.
    ///
    /// Equivalent to dropping the record.
    pub fn close(self) {}

    /// Decoded serial number.
    #[must_use]
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Decoded manufacturer string, if the device has one, it was requested and
    /// it could be read.
    #[must_use]
    pub fn manufacturer(&self) -> Option<&str> {
        self.manufacturer.as_deref()
    }

    /// Decoded product description, if the device has one, it was requested and
    /// it could be read.
    #[must_use]
    pub fn product(&self) -> Option<&str> {
        self.product.as_deref()
    }

    /// USB vendor ID.
    #[must_use]
    pub fn vendor_id(&self) -> u16 {
        self.descriptor.vendor_id
    }

    /// USB product ID.
    #[must_use]
    pub fn product_id(&self) -> u16 {
        self.descriptor.product_id
    }

    /// Language the strings were requested in.
    #[must_use]
    pub fn language(&self) -> LanguageId {
        self.language
    }

    /// The device descriptor read during the scan.
    #[must_use]
    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    /// The native device.
    ///
    /// Valid for as long as the record is alive.
    #[must_use]
    pub fn raw_device(&self) -> T::Device {
        self.device.raw
    }
}

impl<T: Transport> Display for DeviceRecord<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04x}:{:04x} serial {}",
            self.vendor_id(),
            self.product_id(),
            self.serial
        )?;
        if let Some(manufacturer) = &self.manufacturer {
            write!(f, ", manufacturer {manufacturer}")?;
        }
        if let Some(product) = &self.product {
            write!(f, ", product {product}")?;
        }
        Ok(())
    }
}

/// An open connection to a device.
///
/// The handle is closed when dropped or [closed](OpenHandle::close). It holds
/// its own reference on the device, so it may outlive the [`DeviceRecord`] it
/// was opened from.
///
/// No locking is added around transfers; concurrent use follows the
/// transport's own thread-safety rules.
///
/// # Example
///
/// ```no_run
/// use usbdir::{Directory, VendorProductFilter};
///
/// let directory = Directory::libusb();
/// let record = directory
///     .find_by_serial(VendorProductFilter::new(0x1d50, 0x6018), "D6DC8DB0")
///     .unwrap()
///     .expect("device not found");
/// let handle = record.open().unwrap();
///
/// let mut buf = [0u8; 256];
/// loop {
///     let n = handle.bulk_read(0x85, &mut buf).unwrap();
///     println!("{:?}", &buf[..n]);
/// }
/// ```
#[derive(Debug)]
pub struct OpenHandle<T: Transport> {
    handle: ManuallyDrop<T::Handle>,
    device: DeviceRef<T>,
}

impl<T: Transport> OpenHandle<T> {
    fn open(device: &DeviceRef<T>) -> Result<Self> {
        let handle = device.transport.open(device.raw)?;
        Ok(Self {
            handle: ManuallyDrop::new(handle),
            device: device.clone(),
        })
    }

    fn transport(&self) -> &T {
        &self.device.transport
    }

    /// The native handle.
    ///
    /// Valid for as long as this value is alive; do not close it directly.
    #[must_use]
    pub fn handle(&self) -> &T::Handle {
        &self.handle
    }

    /// Read the first language ID from the device's language table.
    pub fn language(&self) -> Result<LanguageId> {
        let mut buf = [0u8; STRING_DESCRIPTOR_BUF_LEN];
        let returned = self
            .transport()
            .string_descriptor(&self.handle, 0, 0, &mut buf)?;
        trace!("language table: {returned} bytes");
        let raw = buf
            .get(..returned)
            .ok_or(MalformedDescriptor::ReturnedPastBuffer {
                returned,
                capacity: buf.len(),
            })?;
        Ok(decode_language_id(raw)?)
    }

    /// Read and decode string descriptor `index`.
    ///
    /// Index 0 means the device has no such string and yields `None`.
    pub fn read_string(&self, index: u8, language: LanguageId) -> Result<Option<String>> {
        if index == 0 {
            return Ok(None);
        }
        let mut buf = [0u8; STRING_DESCRIPTOR_BUF_LEN];
        let returned =
            self.transport()
                .string_descriptor(&self.handle, index, language.id(), &mut buf)?;
        trace!(
            "string descriptor {index} (language {:#06x}): {returned} bytes",
            language.id()
        );
        Ok(Some(decode_string(&buf, returned)?))
    }

    /// Like [`read_string`](OpenHandle::read_string), but a failure is logged
    /// and yields `None`.
    fn read_optional_string(
        &self,
        index: u8,
        language: LanguageId,
        what: &str,
    ) -> Option<String> {
        self.read_string(index, language).unwrap_or_else(|err| {
            warn!("ignoring unreadable {what} string (index {index}): {err}");
            None
        })
    }

    /// Perform one bulk read, waiting as long as it takes.
    ///
    /// Returns the number of bytes written into `buf`. A failed transfer may
    /// still have written data; see [`TransferError::transferred`].
    pub fn bulk_read(
        &self,
        endpoint: impl Into<Endpoint>,
        buf: &mut [u8],
    ) -> Result<usize, TransferError> {
        self.bulk_read_with(endpoint, buf, None)
    }

    /// Perform one bulk read that fails with [`UsbError::Timeout`] after `timeout`.
    pub fn bulk_read_timeout(
        &self,
        endpoint: impl Into<Endpoint>,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransferError> {
        self.bulk_read_with(endpoint, buf, Some(timeout))
    }

    /// Perform one bulk read with an optional deadline.
    ///
    /// Only IN endpoints are accepted; an OUT endpoint fails with
    /// [`UsbError::InvalidParam`] before anything is sent.
    pub fn bulk_read_with(
        &self,
        endpoint: impl Into<Endpoint>,
        buf: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<usize, TransferError> {
        let endpoint = endpoint.into();
        if endpoint.is_out() {
            return Err(TransferError::new(UsbError::InvalidParam, 0));
        }
        match self
            .transport()
            .bulk_transfer(&self.handle, endpoint.address(), buf, timeout)
        {
            Ok(read) => {
                trace!("bulk read {read} bytes from {:#04x}", endpoint.address());
                Ok(read)
            }
            Err(err) => {
                if err.transferred() > 0 {
                    warn!(
                        "bulk read from {:#04x} failed after {} bytes: {}",
                        endpoint.address(),
                        err.transferred(),
                        err.error()
                    );
                }
                Err(err)
            }
        }
    }

    /// Close the handle.
    ///
    /// Equivalent to dropping it.
    pub fn close(self) {}
}

impl<T: Transport> Drop for OpenHandle<T> {
    fn drop(&mut self) {
        // SAFETY: the handle is never used again after being taken.
        let handle = unsafe { ManuallyDrop::take(&mut self.handle) };
        self.device.transport.close(handle);
    }
}
