//! Outbound I/O abstraction for the platform-independent controller.
//!
//! The controller never touches a socket. Whenever it needs to talk to the
//! DAW (the feedback "ping") it hands an encoded OSC packet to a
//! [`MessageSender`], which the native shell implements on top of its UDP
//! socket and tests implement with a recorder.
//!
//! # Design
//!
//! The trait is **synchronous**: the controller runs inline on the event loop
//! thread and a UDP send never blocks in practice. Receiving is the shell's
//! business and lives next to the socket.
//!
//! # Example
//!
//! ```rust
//! use tally_core::io::{IoError, MessageSender};
//!
//! struct Discard;
//!
//! impl MessageSender for Discard {
//!     fn send_packet(&mut self, packet: &[u8]) -> Result<usize, IoError> {
//!         Ok(packet.len())
//!     }
//! }
//! ```

use core::fmt;

// =============================================================================
// Error Types
// =============================================================================

/// I/O error type for outbound sends.
///
/// Kept minimal so shells can map whatever their socket layer reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoError {
    /// Raw OS error code, or -1 when there is none
    pub code: i32,
    /// Human-readable error message
    pub message: String,
}

impl IoError {
    /// Create a new I/O error with a code and message.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create a "would block" error (socket buffer full).
    pub fn would_block() -> Self {
        Self::new(-11, "Operation would block")
    }

    /// Check if this is a "would block" error.
    pub fn is_would_block(&self) -> bool {
        self.code == -11
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::WouldBlock {
            return Self::would_block();
        }
        Self::new(e.raw_os_error().unwrap_or(-1), e.to_string())
    }
}

// =============================================================================
// MessageSender Trait
// =============================================================================

/// Sends encoded OSC packets to the single configured peer.
///
/// The destination is fixed when the sender is built; callers only supply
/// the payload.
pub trait MessageSender {
    /// Send one datagram to the peer.
    ///
    /// Returns the number of bytes sent.
    fn send_packet(&mut self, packet: &[u8]) -> Result<usize, IoError>;
}
