//! Public prelude of the crate containing the most commonly used types and functions.

pub use crate::{
    DeviceRecord, Directory, Endpoint, Error, ErrorPolicy, OpenHandle, Result, ScanOptions,
    TransferError, UsbError, VendorProductFilter,
};
