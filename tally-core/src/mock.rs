//! In-memory relay backend and message sender for tests.
//!
//! Both hand out a cloneable handle sharing their bookkeeping, so a test can
//! move the mock into a driver or controller and still inspect what happened.

use std::collections::VecDeque;
use std::ffi::CString;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::RelayError;
use crate::io::{IoError, MessageSender};
use crate::relay::{
    DeviceCandidate, RelayBackend, RelayCommand, RelayDevice, REPORT_LEN, USB_PID, USB_VID,
};

/// One simulated HID device.
#[derive(Debug, Clone)]
pub struct MockRelay {
    pub serial: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub fail_open: bool,
    pub fail_report: bool,
}

impl MockRelay {
    /// A relay board with the given serial.
    pub fn new(serial: &str) -> Self {
        MockRelay {
            serial: serial.to_string(),
            vendor_id: USB_VID,
            product_id: USB_PID,
            fail_open: false,
            fail_report: false,
        }
    }

    pub fn with_ids(mut self, vendor_id: u16, product_id: u16) -> Self {
        self.vendor_id = vendor_id;
        self.product_id = product_id;
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn failing_report(mut self) -> Self {
        self.fail_report = true;
        self
    }
}

#[derive(Debug, Default)]
struct MockState {
    relays: Vec<MockRelay>,
    enumerations: usize,
    open_paths: Vec<String>,
    open_devices: Vec<String>,
    write_attempts: usize,
    written: Vec<RelayCommand>,
    closes: usize,
    pending_write_failures: usize,
}

/// Shared view of a [`MockBackend`]'s bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make the next `count` writes fail.
    pub fn fail_next_writes(&self, count: usize) {
        self.lock().pending_write_failures = count;
    }

    /// Remove every device from future enumerations.
    pub fn unplug_all(&self) {
        self.lock().relays.clear();
    }

    pub fn plug(&self, relay: MockRelay) {
        self.lock().relays.push(relay);
    }

    pub fn enumerations(&self) -> usize {
        self.lock().enumerations
    }

    /// Paths passed to `open`, in order, failed attempts included.
    pub fn open_paths(&self) -> Vec<String> {
        self.lock().open_paths.clone()
    }

    pub fn open_attempts(&self) -> usize {
        self.lock().open_paths.len()
    }

    /// Paths of devices opened and not yet closed.
    pub fn open_devices(&self) -> Vec<String> {
        self.lock().open_devices.clone()
    }

    pub fn write_attempts(&self) -> usize {
        self.lock().write_attempts
    }

    /// Commands that reached a device successfully.
    pub fn written(&self) -> Vec<RelayCommand> {
        self.lock().written.clone()
    }

    pub fn closes(&self) -> usize {
        self.lock().closes
    }
}

/// Scriptable [`RelayBackend`].
#[derive(Debug, Default)]
pub struct MockBackend {
    handle: MockHandle,
}

impl MockBackend {
    pub fn new(relays: Vec<MockRelay>) -> Self {
        let handle = MockHandle::default();
        handle.lock().relays = relays;
        MockBackend { handle }
    }

    pub fn handle(&self) -> MockHandle {
        self.handle.clone()
    }
}

fn mock_path(index: usize) -> String {
    format!("relay-{}", index)
}

impl RelayBackend for MockBackend {
    type Device = MockDevice;

    fn enumerate(&mut self) -> Result<Vec<DeviceCandidate>, RelayError> {
        let mut state = self.handle.lock();
        state.enumerations += 1;
        let candidates = state
            .relays
            .iter()
            .enumerate()
            .map(|(i, relay)| DeviceCandidate {
                path: CString::new(mock_path(i)).unwrap_or_default(),
                vendor_id: relay.vendor_id,
                product_id: relay.product_id,
            })
            .collect();
        Ok(candidates)
    }

    fn open(&mut self, candidate: &DeviceCandidate) -> Result<MockDevice, RelayError> {
        let path = candidate.path.to_string_lossy().into_owned();
        let mut state = self.handle.lock();
        state.open_paths.push(path.clone());

        let relay = state
            .relays
            .iter()
            .enumerate()
            .find(|(i, _)| mock_path(*i) == path)
            .map(|(_, relay)| relay.clone())
            .ok_or_else(|| RelayError::io("no such device"))?;
        if relay.fail_open {
            return Err(RelayError::io("open failed"));
        }

        state.open_devices.push(path.clone());
        Ok(MockDevice {
            path,
            relay,
            handle: self.handle.clone(),
        })
    }
}

/// Device handed out by [`MockBackend`].
#[derive(Debug)]
pub struct MockDevice {
    path: String,
    relay: MockRelay,
    handle: MockHandle,
}

impl RelayDevice for MockDevice {
    fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize, RelayError> {
        if self.relay.fail_report {
            return Err(RelayError::io("feature report failed"));
        }
        let mut report = [0u8; REPORT_LEN];
        for (dst, src) in report[1..6].iter_mut().zip(self.relay.serial.bytes()) {
            *dst = src;
        }
        let len = buf.len().min(REPORT_LEN);
        buf[..len].copy_from_slice(&report[..len]);
        Ok(len)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, RelayError> {
        let mut state = self.handle.lock();
        state.write_attempts += 1;
        if state.pending_write_failures > 0 {
            state.pending_write_failures -= 1;
            return Err(RelayError::io("write failed"));
        }
        let command =
            RelayCommand::from_bytes(data).ok_or_else(|| RelayError::io("unknown command"))?;
        state.written.push(command);
        Ok(data.len())
    }

    fn close(self) -> Result<(), RelayError> {
        let mut state = self.handle.lock();
        state.closes += 1;
        if let Some(pos) = state.open_devices.iter().position(|p| *p == self.path) {
            state.open_devices.remove(pos);
        }
        Ok(())
    }
}

/// [`MessageSender`] that records every packet.
#[derive(Debug, Clone, Default)]
pub struct MockSender {
    sent: Arc<Mutex<VecDeque<Vec<u8>>>>,
    fail: Arc<Mutex<bool>>,
}

impl MockSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }

    /// Packets sent so far, oldest first.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}

impl MessageSender for MockSender {
    fn send_packet(&mut self, packet: &[u8]) -> Result<usize, IoError> {
        if *self.fail.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(IoError::new(111, "Connection refused"));
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(packet.to_vec());
        Ok(packet.len())
    }
}
