//! USB descriptor types and the string descriptor decoder.
//!
//! String descriptors share one layout:
//!
//! | offset | size | field |
//! |--------|------|-------|
//! | 0      | 1    | `bLength`, total length including the header |
//! | 1      | 1    | `bDescriptorType`, `0x03` for strings |
//! | 2      | n    | little-endian UTF-16 code units |
//!
//! String index 0 is special: instead of text it returns the list of language
//! IDs the device supports, and the first entry is used to request every other
//! string.
//!
//! # Resources
//! - <https://www.beyondlogic.org/usbnutshell/usb5.shtml#StringDescriptors>

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::MalformedDescriptor;

/// Size of the buffer used to request a string descriptor.
pub const STRING_DESCRIPTOR_BUF_LEN: usize = 128;

const HEADER_SIZE: usize = 2;
const LANGUAGE_DESCRIPTOR_MIN_LEN: usize = 4;

/// Standard descriptor type codes, as found in byte 1 of a descriptor.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum DescriptorType {
    /// Device descriptor.
    Device = 0x01,
    /// Configuration descriptor.
    Configuration = 0x02,
    /// String descriptor, including the language table at index 0.
    String = 0x03,
    /// Interface descriptor.
    Interface = 0x04,
    /// Endpoint descriptor.
    Endpoint = 0x05,
}

/// Language identifier used when requesting string descriptors.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct LanguageId(u16);

impl LanguageId {
    /// English (United States).
    pub const ENGLISH_US: LanguageId = LanguageId(0x0409);

    /// Wrap a raw language identifier.
    #[must_use]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// The raw 16-bit identifier.
    #[must_use]
    pub const fn id(self) -> u16 {
        self.0
    }
}

impl From<LanguageId> for u16 {
    fn from(value: LanguageId) -> Self {
        value.0
    }
}

/// Fields of a USB device descriptor needed to select a device and read its strings.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct DeviceDescriptor {
    /// `idVendor`
    pub vendor_id: u16,
    /// `idProduct`
    pub product_id: u16,
    /// `iManufacturer`, 0 when the device has no manufacturer string.
    pub manufacturer_index: u8,
    /// `iProduct`, 0 when the device has no product string.
    pub product_index: u8,
    /// `iSerialNumber`, 0 when the device has no serial number string.
    pub serial_index: u8,
}

/// Extract the language ID from the descriptor returned for string index 0.
///
/// `raw` must hold exactly the bytes returned by the transport. The first
/// language in the table is returned.
///
/// ```
/// use usbdir::descriptor::{decode_language_id, LanguageId};
///
/// let language = decode_language_id(&[4, 3, 0x09, 0x04]).unwrap();
/// assert_eq!(language, LanguageId::ENGLISH_US);
/// ```
pub fn decode_language_id(raw: &[u8]) -> Result<LanguageId, MalformedDescriptor> {
    if raw.len() < LANGUAGE_DESCRIPTOR_MIN_LEN {
        return Err(MalformedDescriptor::TooShort {
            required: LANGUAGE_DESCRIPTOR_MIN_LEN,
            returned: raw.len(),
        });
    }
    Ok(LanguageId(u16::from_le_bytes([raw[2], raw[3]])))
}

/// Decode a string descriptor into Unicode text.
///
/// `returned_len` is the number of bytes the transport wrote into `raw`; the
/// buffer itself may be larger. Only the bytes covered by the declared length
/// in byte 0 are decoded. Invalid UTF-16 is replaced with U+FFFD, and a
/// dangling odd byte at the end of the payload is ignored.
///
/// ```
/// use usbdir::descriptor::decode_string;
///
/// let mut buf = [0u8; 128];
/// buf[..6].copy_from_slice(&[6, 3, b'O', 0, b'K', 0]);
/// assert_eq!(decode_string(&buf, 6).unwrap(), "OK");
/// ```
pub fn decode_string(raw: &[u8], returned_len: usize) -> Result<String, MalformedDescriptor> {
    if returned_len < HEADER_SIZE {
        return Err(MalformedDescriptor::TooShort {
            required: HEADER_SIZE,
            returned: returned_len,
        });
    }
    if returned_len > raw.len() {
        return Err(MalformedDescriptor::ReturnedPastBuffer {
            returned: returned_len,
            capacity: raw.len(),
        });
    }
    let declared = usize::from(raw[0]);
    if declared > returned_len {
        return Err(MalformedDescriptor::DeclaredLengthExceedsReturned {
            declared,
            returned: returned_len,
        });
    }
    if declared < HEADER_SIZE {
        return Err(MalformedDescriptor::DeclaredLengthBelowHeader { declared });
    }
    let units = raw[HEADER_SIZE..declared]
        .chunks_exact(2)
        .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
        .collect::<Vec<_>>();
    Ok(String::from_utf16_lossy(&units))
}

/// The descriptor type byte of a raw descriptor, if present and known.
#[must_use]
pub fn descriptor_type(raw: &[u8]) -> Option<DescriptorType> {
    raw.get(1)
        .and_then(|&kind| DescriptorType::try_from(kind).ok())
}
