use std::sync::Arc;

use log::{debug, warn};

use crate::{
    transport::{Libusb, Transport},
    DeviceRecord, Result, VendorProductFilter,
};

/// What to do when a device that passed the filter cannot be resolved.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum ErrorPolicy {
    /// Abort the whole scan with the device's error. No records are returned.
    #[default]
    Abort,
    /// Log the error and leave the device out of the results.
    Skip,
}

/// Settings for [`Directory::scan`].
///
/// ```
/// use usbdir::{ErrorPolicy, ScanOptions, VendorProductFilter};
///
/// let options = ScanOptions::default()
///     .with_filter(VendorProductFilter::new(0x1d50, 0x6018))
///     .with_product(false)
///     .with_error_policy(ErrorPolicy::Skip);
/// assert!(options.reads_manufacturer());
/// assert!(!options.reads_product());
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ScanOptions {
    filter: VendorProductFilter,
    read_manufacturer: bool,
    read_product: bool,
    error_policy: ErrorPolicy,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            filter: VendorProductFilter::FTDI,
            read_manufacturer: true,
            read_product: true,
            error_policy: ErrorPolicy::Abort,
        }
    }
}

impl ScanOptions {
    /// Vendor/product pair to match; see [`VendorProductFilter::matches`].
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<VendorProductFilter>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Whether to read the manufacturer string of each device.
    ///
    /// A manufacturer string that cannot be read is logged and left out.
    #[must_use]
    pub fn with_manufacturer(mut self, read: bool) -> Self {
        self.read_manufacturer = read;
        self
    }

    /// Whether to read the product string of each device.
    ///
    /// A product string that cannot be read is logged and left out.
    #[must_use]
    pub fn with_product(mut self, read: bool) -> Self {
        self.read_product = read;
        self
    }

    /// How to treat devices whose serial number cannot be read.
    #[must_use]
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// The vendor/product filter.
    #[must_use]
    pub fn filter(&self) -> VendorProductFilter {
        self.filter
    }

    /// Whether manufacturer strings are read.
    #[must_use]
    pub fn reads_manufacturer(&self) -> bool {
        self.read_manufacturer
    }

    /// Whether product strings are read.
    #[must_use]
    pub fn reads_product(&self) -> bool {
        self.read_product
    }

    /// How devices whose serial cannot be read are treated.
    #[must_use]
    pub fn error_policy(&self) -> ErrorPolicy {
        self.error_policy
    }
}

/// Finds attached devices and resolves their string descriptors.
///
/// The transport is shared with every record and handle the directory hands
/// out, and is only released once all of them are gone.
#[derive(Debug)]
pub struct Directory<T: Transport> {
    transport: Arc<T>,
}

impl Directory<Libusb> {
    /// A directory over the system's libusb.
    #[must_use]
    pub fn libusb() -> Self {
        Self::new(Libusb::new())
    }
}

impl<T: Transport> Directory<T> {
    /// A directory over `transport`.
    pub fn new(transport: T) -> Self {
        Self::from_shared(Arc::new(transport))
    }

    /// A directory over a transport that is already shared.
    pub fn from_shared(transport: Arc<T>) -> Self {
        Self { transport }
    }

    /// The shared transport.
    #[must_use]
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Find every device matching `filter`, in enumeration order.
    ///
    /// Any failure aborts the search; see [`scan`](Directory::scan).
    pub fn find_all(&self, filter: impl Into<VendorProductFilter>) -> Result<Vec<DeviceRecord<T>>> {
        self.scan(&ScanOptions::default().with_filter(filter))
    }

    /// Find the device matching `filter` whose serial number is `serial`.
    ///
    /// Every other record found on the way is released.
    pub fn find_by_serial(
        &self,
        filter: impl Into<VendorProductFilter>,
        serial: &str,
    ) -> Result<Option<DeviceRecord<T>>> {
        Ok(self
            .find_all(filter)?
            .into_iter()
            .find(|record| record.serial() == serial))
    }

    /// Enumerate attached devices and resolve the ones that pass the filter.
    ///
    /// A failure to read any device descriptor aborts the scan. A failure to
    /// open a matching device or read its serial number is handled according
    /// to [`ScanOptions::error_policy`]. Unreadable manufacturer and product
    /// strings are logged and left out. An abort releases every record resolved so
    /// far; no partial results are returned.
    pub fn scan(&self, options: &ScanOptions) -> Result<Vec<DeviceRecord<T>>> {
        self.transport.init()?;
        // Devices are only valid while the list is alive; each record takes
        // its own reference before the list is dropped.
        let list = self.transport.list_devices()?;
        let devices = list.as_ref();
        debug!("scanning {} USB devices", devices.len());

        let mut candidates = Vec::new();
        for &device in devices {
            let descriptor = self.transport.device_descriptor(device)?;
            if options.filter.matches(descriptor.vendor_id, descriptor.product_id) {
                debug!(
                    "found {:04x}:{:04x}",
                    descriptor.vendor_id, descriptor.product_id
                );
                candidates.push((device, descriptor));
            }
        }

        let mut records = Vec::with_capacity(candidates.len());
        for (device, descriptor) in candidates {
            match DeviceRecord::resolve(&self.transport, device, descriptor, options) {
                Ok(record) => records.push(record),
                Err(err) if options.error_policy == ErrorPolicy::Skip => warn!(
                    "skipping {:04x}:{:04x}: {err}",
                    descriptor.vendor_id, descriptor.product_id
                ),
                Err(err) => return Err(err),
            }
        }
        Ok(records)
    }
}
