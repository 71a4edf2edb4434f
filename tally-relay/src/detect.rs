//! `--detect`: list attached relays and exit.

use tally_core::{DetectedRelay, RelayBackend, RelayDriver, RelayError};

/// Log every relay board found, never switching any of them.
pub fn detect<B: RelayBackend>(backend: B) -> Result<Vec<DetectedRelay>, RelayError> {
    let mut driver = RelayDriver::new(backend, None);
    let found = driver.detect()?;

    for relay in &found {
        log::info!(
            "Device {:?} found, serial number: {:?}",
            relay.path,
            relay.serial
        );
    }
    if found.is_empty() {
        log::info!("No USB Relay device found");
    }
    Ok(found)
}
