use std::{
    ffi::{c_int, c_uint},
    mem::MaybeUninit,
    ptr::{self, NonNull},
    sync::{Mutex, PoisonError},
    time::Duration,
};

use log::trace;

use super::Transport;
use crate::{descriptor::DeviceDescriptor, ffi, try_libusb, TransferError, UsbError};

/// [`Transport`] backed by the libusb-1.0 default context.
///
/// The subsystem is initialised on the first [`init`](Transport::init) call and
/// shut down when the value is dropped. libusb counts users of its default
/// context, so several `Libusb` values may coexist in one process.
///
/// The directory shares its transport with every record and handle it creates,
/// so the context outlives all of them.
#[derive(Debug, Default)]
pub struct Libusb {
    initialized: Mutex<bool>,
}

impl Libusb {
    /// Create a transport. Nothing is initialised until first use.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Drop for Libusb {
    fn drop(&mut self) {
        let initialized = self
            .initialized
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if *initialized {
            trace!("shutting down libusb");
            unsafe { ffi::libusb_exit(ptr::null_mut()) };
        }
    }
}

/// Pointer to a `libusb_device`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct LibusbDevice(NonNull<ffi::libusb_device>);

// SAFETY: libusb device objects are reference counted with atomic operations
// and may be used from any thread.
unsafe impl Send for LibusbDevice {}
unsafe impl Sync for LibusbDevice {}

impl LibusbDevice {
    /// The raw pointer, for use with the [ffi] bindings.
    #[must_use]
    pub fn as_ptr(self) -> *mut ffi::libusb_device {
        self.0.as_ptr()
    }
}

/// Open `libusb_device_handle`.
#[derive(Debug)]
pub struct LibusbHandle(NonNull<ffi::libusb_device_handle>);

// SAFETY: libusb's synchronous I/O functions may be called from any thread.
unsafe impl Send for LibusbHandle {}

impl LibusbHandle {
    /// The raw pointer, for use with the [ffi] bindings.
    #[must_use]
    pub fn as_ptr(&self) -> *mut ffi::libusb_device_handle {
        self.0.as_ptr()
    }
}

/// Device list returned by `libusb_get_device_list`.
///
/// The list holds one reference per device and releases all of them, along
/// with the list itself, when dropped.
#[derive(Debug)]
pub struct LibusbDeviceList {
    list: *const *mut ffi::libusb_device,
    devices: Vec<LibusbDevice>,
}

impl AsRef<[LibusbDevice]> for LibusbDeviceList {
    fn as_ref(&self) -> &[LibusbDevice] {
        &self.devices
    }
}

impl Drop for LibusbDeviceList {
    fn drop(&mut self) {
        unsafe { ffi::libusb_free_device_list(self.list, 1) };
    }
}

impl Transport for Libusb {
    type Device = LibusbDevice;
    type Handle = LibusbHandle;
    type DeviceList = LibusbDeviceList;

    fn init(&self) -> Result<(), UsbError> {
        let mut initialized = self
            .initialized
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !*initialized {
            try_libusb!(unsafe { ffi::libusb_init(ptr::null_mut()) })?;
            *initialized = true;
            trace!("libusb initialised");
        }
        Ok(())
    }

    fn list_devices(&self) -> Result<LibusbDeviceList, UsbError> {
        let mut list: *const *mut ffi::libusb_device = ptr::null();
        let len = try_libusb!(unsafe { ffi::libusb_get_device_list(ptr::null_mut(), &mut list) })?;
        let len = usize::try_from(len).map_err(|_| UsbError::Other)?;
        let devices = if list.is_null() {
            Vec::new()
        } else {
            // SAFETY: libusb wrote `len` device pointers, followed by a null terminator.
            unsafe { std::slice::from_raw_parts(list, len) }
                .iter()
                .filter_map(|&device| NonNull::new(device).map(LibusbDevice))
                .collect()
        };
        Ok(LibusbDeviceList { list, devices })
    }

    fn device_descriptor(&self, device: LibusbDevice) -> Result<DeviceDescriptor, UsbError> {
        let mut descriptor = MaybeUninit::<ffi::libusb_device_descriptor>::uninit();
        try_libusb!(unsafe {
            ffi::libusb_get_device_descriptor(device.as_ptr(), descriptor.as_mut_ptr())
        })?;
        // SAFETY: the descriptor is fully written when the call succeeds.
        let descriptor = unsafe { descriptor.assume_init() };
        Ok(DeviceDescriptor {
            vendor_id: descriptor.idVendor,
            product_id: descriptor.idProduct,
            manufacturer_index: descriptor.iManufacturer,
            product_index: descriptor.iProduct,
            serial_index: descriptor.iSerialNumber,
        })
    }

    fn ref_device(&self, device: LibusbDevice) {
        unsafe { ffi::libusb_ref_device(device.as_ptr()) };
    }

    fn unref_device(&self, device: LibusbDevice) {
        unsafe { ffi::libusb_unref_device(device.as_ptr()) };
    }

    fn open(&self, device: LibusbDevice) -> Result<LibusbHandle, UsbError> {
        let mut handle: *mut ffi::libusb_device_handle = ptr::null_mut();
        try_libusb!(unsafe { ffi::libusb_open(device.as_ptr(), &mut handle) })?;
        NonNull::new(handle).map(LibusbHandle).ok_or(UsbError::Other)
    }

    fn close(&self, handle: LibusbHandle) {
        unsafe { ffi::libusb_close(handle.as_ptr()) };
    }

    fn string_descriptor(
        &self,
        handle: &LibusbHandle,
        index: u8,
        language: u16,
        buf: &mut [u8],
    ) -> Result<usize, UsbError> {
        let length = c_int::try_from(buf.len()).unwrap_or(c_int::MAX);
        let written = try_libusb!(unsafe {
            ffi::libusb_get_string_descriptor(
                handle.as_ptr(),
                index,
                language,
                buf.as_mut_ptr(),
                length,
            )
        })?;
        usize::try_from(written).map_err(|_| UsbError::Other)
    }

    fn bulk_transfer(
        &self,
        handle: &LibusbHandle,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<usize, TransferError> {
        let length = c_int::try_from(buf.len()).unwrap_or(c_int::MAX);
        let mut transferred: c_int = 0;
        let code = unsafe {
            ffi::libusb_bulk_transfer(
                handle.as_ptr(),
                endpoint,
                buf.as_mut_ptr(),
                length,
                &mut transferred,
                timeout_ms(timeout),
            )
        };
        let transferred = usize::try_from(transferred).unwrap_or(0);
        match try_libusb!(code) {
            Ok(_) => Ok(transferred),
            Err(error) => Err(TransferError::new(error, transferred)),
        }
    }
}

/// libusb treats a timeout of 0 as "wait forever", so a requested deadline is
/// never allowed to round down to it.
fn timeout_ms(timeout: Option<Duration>) -> c_uint {
    match timeout {
        None => 0,
        Some(timeout) => c_uint::try_from(timeout.as_millis())
            .unwrap_or(c_uint::MAX)
            .max(1),
    }
}

/// Version of the linked libusb.
pub(crate) fn version() -> (u16, u16, u16, u32) {
    // SAFETY: libusb returns a pointer to a static structure.
    let version = unsafe { &*ffi::libusb_get_version() };
    (
        version.major,
        version.minor,
        version.micro,
        u32::from(version.nano),
    )
}
