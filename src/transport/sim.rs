//! In-memory transport used by the unit tests.
//!
//! Every native call is recorded so tests can check that references and
//! handles are released exactly once.

use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
    time::Duration,
};

use super::Transport;
use crate::{descriptor::DeviceDescriptor, TransferError, UsbError};

pub(crate) const SERIAL_INDEX: u8 = 3;
pub(crate) const MANUFACTURER_INDEX: u8 = 1;
pub(crate) const PRODUCT_INDEX: u8 = 2;

/// Outcome of one simulated bulk transfer.
#[derive(Debug, Clone)]
pub(crate) enum BulkReply {
    Data(Vec<u8>),
    /// Bytes delivered before the transfer failed.
    Partial(Vec<u8>, UsbError),
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SimDevice {
    descriptor: DeviceDescriptor,
    descriptor_error: Option<UsbError>,
    open_error: Option<UsbError>,
    strings: HashMap<u8, Result<Vec<u8>, UsbError>>,
    bulk: VecDeque<BulkReply>,
}

impl SimDevice {
    /// A device with an English language table and no strings.
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        let mut device = Self {
            descriptor: DeviceDescriptor {
                vendor_id,
                product_id,
                ..DeviceDescriptor::default()
            },
            ..Self::default()
        };
        device.strings.insert(0, Ok(vec![4, 3, 0x09, 0x04]));
        device
    }

    pub fn with_serial(mut self, serial: &str) -> Self {
        self.descriptor.serial_index = SERIAL_INDEX;
        self.with_raw_string(SERIAL_INDEX, encode(serial))
    }

    pub fn with_manufacturer(mut self, manufacturer: &str) -> Self {
        self.descriptor.manufacturer_index = MANUFACTURER_INDEX;
        self.with_raw_string(MANUFACTURER_INDEX, encode(manufacturer))
    }

    pub fn with_product(mut self, product: &str) -> Self {
        self.descriptor.product_index = PRODUCT_INDEX;
        self.with_raw_string(PRODUCT_INDEX, encode(product))
    }

    pub fn with_raw_string(mut self, index: u8, raw: Vec<u8>) -> Self {
        self.strings.insert(index, Ok(raw));
        self
    }

    pub fn with_string_error(mut self, index: u8, error: UsbError) -> Self {
        if index == SERIAL_INDEX {
            self.descriptor.serial_index = SERIAL_INDEX;
        }
        self.strings.insert(index, Err(error));
        self
    }

    pub fn with_descriptor_error(mut self, error: UsbError) -> Self {
        self.descriptor_error = Some(error);
        self
    }

    pub fn with_open_error(mut self, error: UsbError) -> Self {
        self.open_error = Some(error);
        self
    }

    pub fn with_bulk(mut self, reply: BulkReply) -> Self {
        self.bulk.push_back(reply);
        self
    }
}

/// Encode `text` as a complete string descriptor.
pub(crate) fn encode(text: &str) -> Vec<u8> {
    let payload = text
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect::<Vec<_>>();
    let mut raw = vec![u8::try_from(payload.len() + 2).unwrap(), 0x03];
    raw.extend(payload);
    raw
}

#[derive(Debug, Default)]
struct SimState {
    init_calls: usize,
    refs: Vec<isize>,
    next_handle: usize,
    open: Vec<usize>,
    closed: usize,
    string_requests: Vec<(u8, u16)>,
    bulk: Vec<VecDeque<BulkReply>>,
    timeouts: Vec<Option<Duration>>,
}

#[derive(Debug)]
pub(crate) struct SimHandle {
    id: usize,
    device: usize,
}

/// Simulated USB stack; devices are identified by their position.
#[derive(Debug, Default)]
pub(crate) struct SimTransport {
    devices: Vec<SimDevice>,
    list_error: Option<UsbError>,
    init_error: Option<UsbError>,
    state: Mutex<SimState>,
}

impl SimTransport {
    pub fn new(devices: Vec<SimDevice>) -> Self {
        let state = SimState {
            refs: vec![0; devices.len()],
            bulk: devices.iter().map(|device| device.bulk.clone()).collect(),
            ..SimState::default()
        };
        Self {
            devices,
            state: Mutex::new(state),
            ..Self::default()
        }
    }

    pub fn with_list_error(mut self, error: UsbError) -> Self {
        self.list_error = Some(error);
        self
    }

    pub fn with_init_error(mut self, error: UsbError) -> Self {
        self.init_error = Some(error);
        self
    }

    /// References taken with `ref_device` and not yet released, per device.
    pub fn outstanding_refs(&self) -> Vec<isize> {
        self.state.lock().unwrap().refs.clone()
    }

    /// Handles opened and not yet closed.
    pub fn open_handles(&self) -> usize {
        self.state.lock().unwrap().open.len()
    }

    pub fn closed_handles(&self) -> usize {
        self.state.lock().unwrap().closed
    }

    pub fn init_calls(&self) -> usize {
        self.state.lock().unwrap().init_calls
    }

    pub fn string_requests(&self) -> Vec<(u8, u16)> {
        self.state.lock().unwrap().string_requests.clone()
    }

    pub fn timeouts(&self) -> Vec<Option<Duration>> {
        self.state.lock().unwrap().timeouts.clone()
    }

    pub fn is_balanced(&self) -> bool {
        self.open_handles() == 0 && self.outstanding_refs().iter().all(|&refs| refs == 0)
    }
}

impl Transport for SimTransport {
    type Device = usize;
    type Handle = SimHandle;
    type DeviceList = Vec<usize>;

    fn init(&self) -> Result<(), UsbError> {
        self.state.lock().unwrap().init_calls += 1;
        self.init_error.map_or(Ok(()), Err)
    }

    fn list_devices(&self) -> Result<Vec<usize>, UsbError> {
        match self.list_error {
            Some(error) => Err(error),
            None => Ok((0..self.devices.len()).collect()),
        }
    }

    fn device_descriptor(&self, device: usize) -> Result<DeviceDescriptor, UsbError> {
        let device = &self.devices[device];
        device.descriptor_error.map_or(Ok(device.descriptor), Err)
    }

    fn ref_device(&self, device: usize) {
        self.state.lock().unwrap().refs[device] += 1;
    }

    fn unref_device(&self, device: usize) {
        let mut state = self.state.lock().unwrap();
        state.refs[device] -= 1;
        assert!(state.refs[device] >= 0, "device {device} released twice");
    }

    fn open(&self, device: usize) -> Result<SimHandle, UsbError> {
        if let Some(error) = self.devices[device].open_error {
            return Err(error);
        }
        let mut state = self.state.lock().unwrap();
        let id = state.next_handle;
        state.next_handle += 1;
        state.open.push(id);
        Ok(SimHandle { id, device })
    }

    fn close(&self, handle: SimHandle) {
        let mut state = self.state.lock().unwrap();
        let position = state
            .open
            .iter()
            .position(|&id| id == handle.id)
            .expect("handle closed twice");
        state.open.remove(position);
        state.closed += 1;
    }

    fn string_descriptor(
        &self,
        handle: &SimHandle,
        index: u8,
        language: u16,
        buf: &mut [u8],
    ) -> Result<usize, UsbError> {
        self.state
            .lock()
            .unwrap()
            .string_requests
            .push((index, language));
        match self.devices[handle.device].strings.get(&index) {
            Some(Ok(raw)) => {
                let len = raw.len().min(buf.len());
                buf[..len].copy_from_slice(&raw[..len]);
                Ok(len)
            }
            Some(Err(error)) => Err(*error),
            None => Err(UsbError::Pipe),
        }
    }

    fn bulk_transfer(
        &self,
        handle: &SimHandle,
        _endpoint: u8,
        buf: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<usize, TransferError> {
        let mut state = self.state.lock().unwrap();
        state.timeouts.push(timeout);
        let reply = state.bulk[handle.device].pop_front();
        let (data, error) = match reply {
            Some(BulkReply::Data(data)) => (data, None),
            Some(BulkReply::Partial(data, error)) => (data, Some(error)),
            None => (Vec::new(), Some(UsbError::Timeout)),
        };
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        match error {
            None => Ok(len),
            Some(error) => Err(TransferError::new(error, len)),
        }
    }
}
