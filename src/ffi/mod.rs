//! Re-export of the `libusb1-sys` crate.
//!
//! This module contains the raw libusb-1.0 bindings. Most users will not need to use
//! this module directly, and should instead use the higher-level abstractions provided by
//! the rest of the crate.

pub use libusb1_sys::constants::*;
pub use libusb1_sys::*;

