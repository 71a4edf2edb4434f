//! hidapi implementation of [`RelayBackend`].
//!
//! The HID library is initialised on first use rather than at startup, so a
//! host without a working HID stack still runs the OSC side and simply
//! reports "could not open the relay device" on every toggle.

use hidapi::{HidApi, HidDevice, HidError};
use tally_core::{DeviceCandidate, RelayBackend, RelayDevice, RelayError};

fn hid_error(e: HidError) -> RelayError {
    RelayError::io(e.to_string())
}

#[derive(Default)]
pub struct HidRelayBackend {
    api: Option<HidApi>,
}

impl HidRelayBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// The HID context with a fresh device list.
    fn api(&mut self) -> Result<&mut HidApi, RelayError> {
        match self.api {
            Some(ref mut api) => {
                api.refresh_devices().map_err(hid_error)?;
            }
            None => {
                log::trace!("Initialising hidapi");
                self.api = Some(HidApi::new().map_err(hid_error)?);
            }
        }
        self.api
            .as_mut()
            .ok_or_else(|| RelayError::io("hidapi is not initialised"))
    }
}

impl RelayBackend for HidRelayBackend {
    type Device = HidRelayDevice;

    fn enumerate(&mut self) -> Result<Vec<DeviceCandidate>, RelayError> {
        let api = self.api()?;
        Ok(api
            .device_list()
            .map(|info| DeviceCandidate {
                path: info.path().to_owned(),
                vendor_id: info.vendor_id(),
                product_id: info.product_id(),
            })
            .collect())
    }

    fn open(&mut self, candidate: &DeviceCandidate) -> Result<HidRelayDevice, RelayError> {
        let api = self
            .api
            .as_ref()
            .ok_or_else(|| RelayError::io("hidapi is not initialised"))?;
        let device = api.open_path(&candidate.path).map_err(hid_error)?;
        Ok(HidRelayDevice { device })
    }
}

pub struct HidRelayDevice {
    device: HidDevice,
}

impl RelayDevice for HidRelayDevice {
    fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize, RelayError> {
        self.device.get_feature_report(buf).map_err(hid_error)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, RelayError> {
        self.device.write(data).map_err(hid_error)
    }

    fn close(self) -> Result<(), RelayError> {
        // hidapi closes the handle on drop
        drop(self.device);
        Ok(())
    }
}
