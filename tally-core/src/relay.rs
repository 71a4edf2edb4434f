//! USB HID relay driver.
//!
//! Supports the ubiquitous "USBRelay" boards (V-USB, `16c0:05df`). The
//! board exposes a 9-byte feature report holding its serial number and
//! accepts 9-byte output reports that switch relay 1.
//!
//! # Report layout
//!
//! ```text
//! feature report 0:  [0] report id  [1..=5] serial (ASCII, zero padded)  [6..=8] state
//! output report:     [0] report id  [1] opcode (FF = on, FD = off)  [2] relay number  [3..] 0
//! ```
//!
//! The HID library itself sits behind [`RelayBackend`] so the retry logic can
//! be exercised without hardware.

use std::ffi::CString;

use crate::error::RelayError;

/// Vendor id of the supported relay boards
pub const USB_VID: u16 = 0x16c0;
/// Product id of the supported relay boards
pub const USB_PID: u16 = 0x05df;

/// Length of both feature and output reports, report id included
pub const REPORT_LEN: usize = 9;

const SERIAL_START: usize = 1;
const SERIAL_END: usize = 6;

/// Toggle attempts before giving up; only a failed write earns a retry.
pub const WRITE_ATTEMPTS: usize = 2;

const ON_COMMAND: [u8; REPORT_LEN] = [0x00, 0xff, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
const OFF_COMMAND: [u8; REPORT_LEN] = [0x00, 0xfd, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

/// Relay 1 switch commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayCommand {
    On,
    Off,
}

impl RelayCommand {
    pub fn for_light(on: bool) -> Self {
        if on {
            RelayCommand::On
        } else {
            RelayCommand::Off
        }
    }

    /// Output report bytes, report id first.
    pub const fn bytes(self) -> &'static [u8; REPORT_LEN] {
        match self {
            RelayCommand::On => &ON_COMMAND,
            RelayCommand::Off => &OFF_COMMAND,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes == ON_COMMAND {
            Some(RelayCommand::On)
        } else if bytes == OFF_COMMAND {
            Some(RelayCommand::Off)
        } else {
            None
        }
    }
}

impl std::fmt::Display for RelayCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayCommand::On => write!(f, "ON"),
            RelayCommand::Off => write!(f, "OFF"),
        }
    }
}

/// One entry of the HID enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCandidate {
    /// Platform device path, as accepted by the backend's `open`
    pub path: CString,
    pub vendor_id: u16,
    pub product_id: u16,
}

impl DeviceCandidate {
    pub fn is_relay(&self) -> bool {
        self.vendor_id == USB_VID && self.product_id == USB_PID
    }
}

/// A relay found by [`RelayDriver::detect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedRelay {
    pub path: CString,
    pub serial: String,
}

/// An open HID device.
pub trait RelayDevice {
    /// Read a feature report; `buf[0]` holds the report id on entry.
    ///
    /// Returns the number of bytes read.
    fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize, RelayError>;

    /// Write an output report, report id first.
    fn write(&mut self, data: &[u8]) -> Result<usize, RelayError>;

    /// Release the device.
    fn close(self) -> Result<(), RelayError>
    where
        Self: Sized;
}

/// Access to the HID subsystem.
pub trait RelayBackend {
    type Device: RelayDevice;

    /// List every HID device currently attached, in enumeration order.
    fn enumerate(&mut self) -> Result<Vec<DeviceCandidate>, RelayError>;

    fn open(&mut self, candidate: &DeviceCandidate) -> Result<Self::Device, RelayError>;
}

/// Extract the serial number from a feature report.
///
/// Bytes 1..=5, trailing zero padding removed, non-ASCII bytes replaced by
/// U+FFFD.
pub fn parse_serial(report: &[u8]) -> String {
    let end = report.len().min(SERIAL_END);
    let raw = report.get(SERIAL_START..end).unwrap_or_default();
    let trimmed_len = raw.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);

    raw[..trimmed_len]
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { '\u{FFFD}' })
        .collect()
}

fn close_device<D: RelayDevice>(device: D) {
    if let Err(e) = device.close() {
        log::debug!("device.close(): {}", e);
    }
}

fn read_serial<D: RelayDevice>(device: &mut D) -> Result<String, RelayError> {
    let mut report = [0u8; REPORT_LEN];
    let len = device.get_feature_report(&mut report)?;
    Ok(parse_serial(&report[..len.min(REPORT_LEN)]))
}

/// Owns the (at most one) open relay and applies the retry policy.
pub struct RelayDriver<B: RelayBackend> {
    backend: B,
    serial: Option<String>,
    device: Option<B::Device>,
}

impl<B: RelayBackend> RelayDriver<B> {
    /// `serial` restricts the driver to the board with that exact serial; an
    /// empty serial means no restriction.
    pub fn new(backend: B, serial: Option<String>) -> Self {
        RelayDriver {
            backend,
            serial: serial.filter(|s| !s.is_empty()),
            device: None,
        }
    }

    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    /// Locate and open the relay, replacing any handle already held.
    pub fn open(&mut self) -> Result<(), RelayError> {
        self.close();
        let device = self.locate()?;
        self.device = Some(device);
        Ok(())
    }

    fn locate(&mut self) -> Result<B::Device, RelayError> {
        for candidate in self.backend.enumerate()? {
            if !candidate.is_relay() {
                continue;
            }

            let mut device = match self.backend.open(&candidate) {
                Ok(device) => device,
                Err(e) => {
                    log::warn!("Cannot open device {:?}: {}", candidate.path, e);
                    continue;
                }
            };

            let device_serial = match read_serial(&mut device) {
                Ok(serial) => serial,
                Err(e) => {
                    close_device(device);
                    return Err(e);
                }
            };

            match &self.serial {
                Some(wanted) if *wanted != device_serial => {
                    log::debug!("Ignoring USB Relay device {:?}", device_serial);
                    close_device(device);
                }
                Some(_) => return Ok(device),
                None => {
                    log::debug!(
                        "Using the first device found: {:?} (serial: {:?})",
                        candidate.path,
                        device_serial
                    );
                    return Ok(device);
                }
            }
        }

        Err(RelayError::DeviceNotFound)
    }

    /// List every attached relay with its serial, without keeping any open.
    ///
    /// Boards that cannot be opened or read are logged and skipped. The
    /// serial filter is not applied.
    pub fn detect(&mut self) -> Result<Vec<DetectedRelay>, RelayError> {
        let mut found = Vec::new();

        for candidate in self.backend.enumerate()? {
            if !candidate.is_relay() {
                continue;
            }

            let mut device = match self.backend.open(&candidate) {
                Ok(device) => device,
                Err(e) => {
                    log::warn!("Cannot open device {:?}: {}", candidate.path, e);
                    continue;
                }
            };

            match read_serial(&mut device) {
                Ok(serial) => found.push(DetectedRelay {
                    path: candidate.path.clone(),
                    serial,
                }),
                Err(e) => log::warn!("Cannot read serial of {:?}: {}", candidate.path, e),
            }
            close_device(device);
        }

        Ok(found)
    }

    /// Write `command` to the open relay.
    ///
    /// A failed write closes the handle so the next attempt re-enumerates.
    pub fn write(&mut self, command: RelayCommand) -> Result<(), RelayError> {
        let device = self
            .device
            .as_mut()
            .ok_or_else(|| RelayError::io("device is not open"))?;

        match device.write(command.bytes()) {
            Ok(_) => Ok(()),
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    /// Release the relay; a no-op when nothing is open.
    pub fn close(&mut self) {
        if let Some(device) = self.device.take() {
            close_device(device);
        }
    }

    /// Switch the light, opening the relay on demand.
    ///
    /// A failed open gives up immediately. A failed write closes the device
    /// and gets exactly one more open + write cycle.
    pub fn set_light(&mut self, on: bool) -> Result<(), RelayError> {
        let command = RelayCommand::for_light(on);
        let mut attempt = 1;

        loop {
            if self.device.is_none() {
                if let Err(e) = self.open() {
                    log::warn!("Could not open the relay device: {}", e);
                    return Err(e);
                }
            }

            match self.write(command) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    log::warn!("Could not write to the relay device: {}", e);
                    if attempt >= WRITE_ATTEMPTS {
                        return Err(e);
                    }
                    attempt += 1;
                }
            }
        }
    }
}

impl<B: RelayBackend> Drop for RelayDriver<B> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBackend, MockRelay};

    #[test]
    fn test_commands() {
        assert_eq!(RelayCommand::On.bytes(), &ON_COMMAND);
        assert_eq!(RelayCommand::Off.bytes()[1], 0xfd);
        assert_eq!(RelayCommand::for_light(true), RelayCommand::On);
        assert_eq!(RelayCommand::from_bytes(&OFF_COMMAND), Some(RelayCommand::Off));
        assert_eq!(RelayCommand::from_bytes(&[0u8; 9]), None);
    }

    #[test]
    fn test_parse_serial() {
        let report = [0x00, b'A', b'B', b'1', b'2', b'3', 0x01, 0x00, 0x00];
        assert_eq!(parse_serial(&report), "AB123");

        let report = [0x00, b'Q', b'Z', 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(parse_serial(&report), "QZ");

        // Only trailing padding is trimmed
        let report = [0x00, b'A', 0x00, b'B', 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(parse_serial(&report), "A\0B");

        let report = [0x00, b'A', 0xff, b'C', 0x00, 0x00];
        assert_eq!(parse_serial(&report), "A\u{FFFD}C");

        assert_eq!(parse_serial(&[0x00]), "");
        assert_eq!(parse_serial(&[]), "");
    }

    #[test]
    fn test_serial_filter_selects_match() {
        let backend = MockBackend::new(vec![MockRelay::new("AB123"), MockRelay::new("AB124")]);
        let handle = backend.handle();
        let mut driver = RelayDriver::new(backend, Some("AB124".to_string()));

        driver.open().unwrap();
        assert!(driver.is_open());
        assert_eq!(handle.open_paths(), vec!["relay-0", "relay-1"]);
        assert_eq!(handle.open_devices(), vec!["relay-1"]);
    }

    #[test]
    fn test_no_filter_selects_first() {
        let backend = MockBackend::new(vec![MockRelay::new("AB123"), MockRelay::new("AB124")]);
        let handle = backend.handle();
        let mut driver = RelayDriver::new(backend, None);

        driver.open().unwrap();
        assert_eq!(handle.open_paths(), vec!["relay-0"]);
        assert_eq!(handle.open_devices(), vec!["relay-0"]);
    }

    #[test]
    fn test_empty_serial_filter_selects_first() {
        let backend = MockBackend::new(vec![MockRelay::new("AB123"), MockRelay::new("AB124")]);
        let handle = backend.handle();
        let mut driver = RelayDriver::new(backend, Some(String::new()));
        assert_eq!(driver.serial(), None);

        driver.open().unwrap();
        assert_eq!(handle.open_devices(), vec!["relay-0"]);

        let driver = RelayDriver::new(MockBackend::new(vec![]), Some("AB124".to_string()));
        assert_eq!(driver.serial(), Some("AB124"));
    }

    #[test]
    fn test_serial_filter_is_case_sensitive() {
        let backend = MockBackend::new(vec![MockRelay::new("AB123")]);
        let handle = backend.handle();
        let mut driver = RelayDriver::new(backend, Some("ab123".to_string()));

        assert_eq!(driver.open(), Err(RelayError::DeviceNotFound));
        assert!(!driver.is_open());
        assert!(handle.open_devices().is_empty());
    }

    #[test]
    fn test_other_devices_are_ignored() {
        let backend = MockBackend::new(vec![
            MockRelay::new("KBD01").with_ids(0x046d, 0xc31c),
            MockRelay::new("AB123"),
        ]);
        let handle = backend.handle();
        let mut driver = RelayDriver::new(backend, None);

        driver.open().unwrap();
        assert_eq!(handle.open_paths(), vec!["relay-1"]);
    }

    #[test]
    fn test_unopenable_candidate_is_skipped() {
        let backend = MockBackend::new(vec![
            MockRelay::new("AB123").failing_open(),
            MockRelay::new("AB124"),
        ]);
        let handle = backend.handle();
        let mut driver = RelayDriver::new(backend, None);

        driver.open().unwrap();
        assert_eq!(handle.open_devices(), vec!["relay-1"]);
    }

    #[test]
    fn test_unreadable_serial_aborts_open() {
        let backend = MockBackend::new(vec![
            MockRelay::new("AB123").failing_report(),
            MockRelay::new("AB124"),
        ]);
        let handle = backend.handle();
        let mut driver = RelayDriver::new(backend, None);

        assert!(matches!(driver.open(), Err(RelayError::DeviceIo(_))));
        assert!(handle.open_devices().is_empty());
    }

    #[test]
    fn test_no_device() {
        let backend = MockBackend::new(vec![]);
        let handle = backend.handle();
        let mut driver = RelayDriver::new(backend, None);

        assert_eq!(driver.set_light(true), Err(RelayError::DeviceNotFound));
        assert_eq!(handle.enumerations(), 1);
        assert_eq!(handle.write_attempts(), 0);
    }

    #[test]
    fn test_write_opens_lazily_and_keeps_device() {
        let backend = MockBackend::new(vec![MockRelay::new("AB123")]);
        let handle = backend.handle();
        let mut driver = RelayDriver::new(backend, None);

        driver.set_light(true).unwrap();
        driver.set_light(false).unwrap();

        assert_eq!(handle.open_attempts(), 1);
        assert_eq!(
            handle.written(),
            vec![RelayCommand::On, RelayCommand::Off]
        );
    }

    #[test]
    fn test_retry_after_write_failure() {
        let backend = MockBackend::new(vec![MockRelay::new("AB123")]);
        let handle = backend.handle();
        handle.fail_next_writes(1);
        let mut driver = RelayDriver::new(backend, None);

        assert_eq!(driver.set_light(true), Ok(()));
        assert_eq!(handle.open_attempts(), 2);
        assert_eq!(handle.write_attempts(), 2);
        assert_eq!(handle.written(), vec![RelayCommand::On]);
        assert!(driver.is_open());
    }

    #[test]
    fn test_gives_up_after_second_write_failure() {
        let backend = MockBackend::new(vec![MockRelay::new("AB123")]);
        let handle = backend.handle();
        handle.fail_next_writes(2);
        let mut driver = RelayDriver::new(backend, None);

        assert!(matches!(driver.set_light(true), Err(RelayError::DeviceIo(_))));
        assert_eq!(handle.open_attempts(), 2);
        assert_eq!(handle.write_attempts(), 2);
        assert!(handle.written().is_empty());
        assert!(!driver.is_open());
        assert!(handle.open_devices().is_empty());

        // Next toggle tries again from scratch
        assert_eq!(driver.set_light(true), Ok(()));
        assert_eq!(handle.open_attempts(), 3);
    }

    #[test]
    fn test_open_failure_on_retry_is_not_retried() {
        let backend = MockBackend::new(vec![MockRelay::new("AB123")]);
        let handle = backend.handle();
        let mut driver = RelayDriver::new(backend, None);
        driver.set_light(false).unwrap();

        // Relay unplugged: write fails, reopen finds nothing
        handle.fail_next_writes(1);
        handle.unplug_all();

        assert_eq!(driver.set_light(true), Err(RelayError::DeviceNotFound));
        assert_eq!(handle.write_attempts(), 2);
        assert_eq!(handle.enumerations(), 2);
    }

    #[test]
    fn test_close_is_idempotent() {
        let backend = MockBackend::new(vec![MockRelay::new("AB123")]);
        let handle = backend.handle();
        let mut driver = RelayDriver::new(backend, None);

        driver.close();
        driver.open().unwrap();
        driver.close();
        driver.close();
        assert!(!driver.is_open());
        assert_eq!(handle.closes(), 1);
    }

    #[test]
    fn test_write_without_open() {
        let backend = MockBackend::new(vec![MockRelay::new("AB123")]);
        let mut driver = RelayDriver::new(backend, None);
        assert!(matches!(
            driver.write(RelayCommand::On),
            Err(RelayError::DeviceIo(_))
        ));
    }

    #[test]
    fn test_detect_lists_all_relays() {
        let backend = MockBackend::new(vec![
            MockRelay::new("AB123"),
            MockRelay::new("KBD01").with_ids(0x046d, 0xc31c),
            MockRelay::new("AB124"),
            MockRelay::new("XX999").failing_open(),
        ]);
        let handle = backend.handle();
        let mut driver = RelayDriver::new(backend, Some("AB124".to_string()));

        let found = driver.detect().unwrap();
        let serials: Vec<&str> = found.iter().map(|r| r.serial.as_str()).collect();
        assert_eq!(serials, vec!["AB123", "AB124"]);
        assert!(!driver.is_open());
        assert!(handle.open_devices().is_empty());
        assert!(handle.written().is_empty());
    }
}
