/// FTDI's USB vendor ID.
pub const FTDI_VENDOR_ID: u16 = 0x0403;

/// FTDI product IDs matched by [`VendorProductFilter::FTDI`]:
/// FT232R/FT245R, FT2232, FT4232H, FT232H and FT230X/FT231X.
pub const FTDI_PRODUCT_IDS: [u16; 5] = [0x6001, 0x6010, 0x6011, 0x6014, 0x6015];

/// Selects which devices an enumeration keeps.
///
/// An explicit vendor/product pair matches exactly. The pair `(0, 0)` is not
/// "match nothing": it stands for the built-in list of FTDI serial converters.
///
/// ```
/// use usbdir::VendorProductFilter;
///
/// let ftdi = VendorProductFilter::FTDI;
/// assert!(ftdi.matches(0x0403, 0x6015));
/// assert!(!ftdi.matches(0x0403, 0x9999));
///
/// let exact = VendorProductFilter::new(0x1d50, 0x6018);
/// assert!(exact.matches(0x1d50, 0x6018));
/// assert!(!exact.matches(0x0403, 0x6015));
/// ```
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct VendorProductFilter {
    vendor_id: u16,
    product_id: u16,
}

impl VendorProductFilter {
    /// The FTDI allowlist sentinel.
    pub const FTDI: VendorProductFilter = VendorProductFilter::new(0, 0);

    /// Match devices with exactly this vendor and product ID.
    #[must_use]
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }

    /// Vendor ID to match, 0 for the allowlist sentinel.
    #[must_use]
    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    /// Product ID to match, 0 for the allowlist sentinel.
    #[must_use]
    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    /// Whether this is the `(0, 0)` sentinel standing for the FTDI allowlist.
    #[must_use]
    pub fn is_ftdi_allowlist(&self) -> bool {
        self.vendor_id == 0 && self.product_id == 0
    }

    /// Whether a device with the given IDs passes the filter.
    #[must_use]
    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        if vendor_id == self.vendor_id && product_id == self.product_id {
            return true;
        }
        self.is_ftdi_allowlist()
            && vendor_id == FTDI_VENDOR_ID
            && FTDI_PRODUCT_IDS.contains(&product_id)
    }
}

impl From<(u16, u16)> for VendorProductFilter {
    fn from((vendor_id, product_id): (u16, u16)) -> Self {
        Self::new(vendor_id, product_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_matches_every_allowlisted_product() {
        for product_id in FTDI_PRODUCT_IDS {
            assert!(VendorProductFilter::FTDI.matches(FTDI_VENDOR_ID, product_id));
        }
    }

    #[test]
    fn sentinel_rejects_other_devices() {
        let filter = VendorProductFilter::default();
        assert!(filter.is_ftdi_allowlist());
        assert!(!filter.matches(FTDI_VENDOR_ID, 0x9999));
        assert!(!filter.matches(0x1d50, 0x6015));
    }

    #[test]
    fn explicit_ftdi_pair_does_not_use_allowlist() {
        let filter = VendorProductFilter::from((FTDI_VENDOR_ID, 0x6001));
        assert!(!filter.is_ftdi_allowlist());
        assert!(filter.matches(FTDI_VENDOR_ID, 0x6001));
        assert!(!filter.matches(FTDI_VENDOR_ID, 0x6014));
    }
}
