//! # Tally Core
//!
//! Platform-independent logic that turns Ardour's record state into a USB
//! relay command.
//!
//! This crate contains the state machines and wire formats with **no socket
//! or HID dependencies**, so every decision the tally makes can be tested
//! without a DAW or a relay attached.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  tally-core (no tokio, no hidapi)                           │
//! │  ├── protocol/   (OSC addresses → InboundMessage)           │
//! │  ├── policy/     (record flags + mode → light on/off)       │
//! │  ├── watchdog/   (ping / heartbeat timers)                  │
//! │  ├── relay/      (RelayDriver over RelayBackend)            │
//! │  ├── controller/ (TallyController wires it all)             │
//! │  └── io/         (MessageSender)                            │
//! └─────────────────────────────────────────────────────────────┘
//!                               ▲
//!                  ┌────────────┴────────────┐
//!                  │  tally-relay            │
//!                  │  (UDP endpoint, hidapi) │
//!                  └─────────────────────────┘
//! ```
//!
//! ## Example: Driving the Controller
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use tally_core::mock::{MockBackend, MockRelay, MockSender};
//! use tally_core::{CombinationMode, InboundMessage, RelayDriver, TallyController};
//!
//! let backend = MockBackend::new(vec![MockRelay::new("AB123")]);
//! let relay = RelayDriver::new(backend, None);
//! let mut tally = TallyController::new(
//!     CombinationMode::Both,
//!     Duration::from_secs(5),
//!     relay,
//!     MockSender::new(),
//! );
//!
//! tally.start();
//! tally.handle_message(&InboundMessage::RecEnableToggle(true), 0);
//! tally.handle_message(&InboundMessage::RecordTally(true), 0);
//! assert!(tally.light());
//! ```

pub mod controller;
pub mod error;
pub mod io;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod policy;
pub mod protocol;
pub mod relay;
pub mod watchdog;

// Re-export commonly used types
pub use controller::TallyController;
pub use error::{ParseError, RelayError};
pub use io::{IoError, MessageSender};
pub use policy::{decide, CombinationMode, TallyState};
pub use protocol::{InboundMessage, Route};
pub use relay::{
    DetectedRelay, DeviceCandidate, RelayBackend, RelayCommand, RelayDevice, RelayDriver,
};
pub use watchdog::{PeerState, Watchdog, WatchdogEvent};
