//! Error types for the relay driver and the OSC wire format

use thiserror::Error;

/// Errors raised while locating or talking to the USB relay.
///
/// None of these are fatal: the controller logs them and carries on, and the
/// next toggle tries again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// Enumeration finished without a device matching VID/PID (and serial)
    #[error("No matching USB Relay device found")]
    DeviceNotFound,

    /// Open, feature report or write failed on an identified device
    #[error("USB Relay I/O error: {0}")]
    DeviceIo(String),
}

impl RelayError {
    pub fn io(message: impl Into<String>) -> Self {
        RelayError::DeviceIo(message.into())
    }
}

/// Errors that can occur when decoding inbound OSC datagrams
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Datagram is not a valid OSC packet
    #[error("Cannot decode OSC packet: {0}")]
    Decode(String),

    /// Outbound message could not be encoded
    #[error("Cannot encode OSC packet: {0}")]
    Encode(String),
}

impl From<rosc::OscError> for ParseError {
    fn from(e: rosc::OscError) -> Self {
        ParseError::Decode(format!("{:?}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_error_display() {
        assert_eq!(
            RelayError::DeviceNotFound.to_string(),
            "No matching USB Relay device found"
        );
        assert_eq!(
            RelayError::io("broken pipe").to_string(),
            "USB Relay I/O error: broken pipe"
        );
    }
}
