use std::ffi::c_int;

use num_enum::{FromPrimitive, IntoPrimitive};

/// Result type used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error returned by enumeration, decoding, opening and reading.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The transport reported a failure.
    #[error("transport error: {0}")]
    Transport(#[from] UsbError),
    /// A string descriptor violated its length invariants.
    #[error("malformed descriptor: {0}")]
    MalformedDescriptor(#[from] MalformedDescriptor),
    /// The device does not provide a usable serial number string.
    #[error("device {vendor_id:04x}:{product_id:04x} has no serial number")]
    MissingSerial {
        /// Vendor ID of the device.
        vendor_id: u16,
        /// Product ID of the device.
        product_id: u16,
    },
}

impl From<TransferError> for Error {
    fn from(value: TransferError) -> Self {
        Error::Transport(value.error)
    }
}

/// Represents an error code returned by libusb.
///
/// The discriminants are the native (negative) libusb codes, so an error may
/// be constructed from one:
///
/// ```
/// use usbdir::UsbError;
///
/// let err = UsbError::from(-4);
/// assert_eq!(err, UsbError::NoDevice);
/// assert_eq!(err.code(), -4);
/// ```
///
/// Codes libusb does not define map to [`UsbError::Other`].
#[derive(
    thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, IntoPrimitive,
)]
#[repr(i32)]
pub enum UsbError {
    /// Input/output error.
    #[error("input/output error (error code -1)")]
    Io = -1,
    /// Invalid parameter.
    #[error("invalid parameter (error code -2)")]
    InvalidParam = -2,
    /// Access denied, usually insufficient permissions.
    #[error("access denied (error code -3)")]
    Access = -3,
    /// The device has been disconnected.
    #[error("no such device (error code -4)")]
    NoDevice = -4,
    /// Entity not found.
    #[error("entity not found (error code -5)")]
    NotFound = -5,
    /// Resource busy.
    #[error("resource busy (error code -6)")]
    Busy = -6,
    /// Operation timed out.
    #[error("operation timed out (error code -7)")]
    Timeout = -7,
    /// The device sent more data than requested.
    #[error("overflow (error code -8)")]
    Overflow = -8,
    /// Pipe error, usually an endpoint stall.
    #[error("pipe error (error code -9)")]
    Pipe = -9,
    /// System call interrupted.
    #[error("system call interrupted (error code -10)")]
    Interrupted = -10,
    /// Insufficient memory.
    #[error("insufficient memory (error code -11)")]
    NoMem = -11,
    /// Operation not supported on this platform.
    #[error("operation not supported (error code -12)")]
    NotSupported = -12,
    /// Any other error, including codes libusb does not define.
    #[num_enum(default)]
    #[error("other error (error code -99)")]
    Other = -99,
}

impl UsbError {
    /// Get the native libusb error code.
    #[must_use]
    pub fn code(&self) -> c_int {
        i32::from(*self)
    }
}

/// A string descriptor whose header disagrees with the data actually returned.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MalformedDescriptor {
    /// Fewer bytes were returned than the descriptor kind needs.
    #[error("descriptor needs at least {required} bytes, {returned} returned")]
    TooShort {
        /// Minimum byte count for the descriptor kind.
        required: usize,
        /// Byte count reported by the transport.
        returned: usize,
    },
    /// The transport reported more bytes than the buffer can hold.
    #[error("transport reported {returned} bytes for a {capacity} byte buffer")]
    ReturnedPastBuffer {
        /// Byte count reported by the transport.
        returned: usize,
        /// Size of the buffer handed to the transport.
        capacity: usize,
    },
    /// Byte 0 claims more data than the transport returned.
    #[error("declared length {declared} exceeds the {returned} bytes returned")]
    DeclaredLengthExceedsReturned {
        /// Length from byte 0 of the descriptor.
        declared: usize,
        /// Byte count reported by the transport.
        returned: usize,
    },
    /// Byte 0 claims a length shorter than the two byte header.
    #[error("declared length {declared} is shorter than the descriptor header")]
    DeclaredLengthBelowHeader {
        /// Length from byte 0 of the descriptor.
        declared: usize,
    },
}

/// A failed bulk transfer.
///
/// Some transfers move data before failing, so the byte count written into the
/// caller's buffer is kept alongside the error.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[error("{error} after {transferred} bytes")]
pub struct TransferError {
    error: UsbError,
    transferred: usize,
}

impl TransferError {
    /// Create a transfer error from the native error and the partial byte count.
    #[must_use]
    pub fn new(error: UsbError, transferred: usize) -> Self {
        Self { error, transferred }
    }

    /// The transport error that ended the transfer.
    #[must_use]
    pub fn error(&self) -> UsbError {
        self.error
    }

    /// Number of bytes written into the buffer before the failure.
    #[must_use]
    pub fn transferred(&self) -> usize {
        self.transferred
    }
}

/// Convert a libusb return value into a `Result`.
///
/// Negative values are errors; anything else is passed through unchanged.
macro_rules! try_libusb {
    ($expr:expr) => {
        match $expr {
            #[allow(clippy::cast_possible_truncation, trivial_numeric_casts)]
            code if code < 0 => Err($crate::error::UsbError::from(code as i32)),
            code => Ok(code),
        }
    };
}

pub(crate) use try_libusb;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_codes_map_to_other() {
        assert_eq!(UsbError::from(-42), UsbError::Other);
        assert_eq!(UsbError::from(-99), UsbError::Other);
    }

    #[test]
    fn try_libusb_passes_non_negative_values() {
        let ok: std::result::Result<i32, UsbError> = try_libusb!(7);
        assert_eq!(ok, Ok(7));
        let err: std::result::Result<isize, UsbError> = try_libusb!(-6_isize);
        assert_eq!(err, Err(UsbError::Busy));
    }

    #[test]
    fn transfer_error_converts_to_transport_error() {
        let err = TransferError::new(UsbError::Pipe, 12);
        assert_eq!(err.transferred(), 12);
        assert_eq!(Error::from(err), Error::Transport(UsbError::Pipe));
    }
}
