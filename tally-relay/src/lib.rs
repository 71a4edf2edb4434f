//! # Ardour Tally Relay
//!
//! Switches a USB relay (and the tally light wired to it) from Ardour's OSC
//! record state.
//!
//! This crate provides the native shell around [`tally_core`]:
//! - Parses the command line ([`Cli`])
//! - Listens for Ardour's OSC feedback on a UDP port
//! - Drives the relay through hidapi
//! - Turns the light off on SIGTERM / Ctrl-C
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    tally-relay                          │
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────────────┐ │
//! │  │ OscReceiver │  │ OscSender   │  │ HidRelayBackend  │ │
//! │  │ (tokio UDP) │  │ (std UDP)   │  │ (hidapi)         │ │
//! │  └──────┬──────┘  └──────▲──────┘  └────────▲─────────┘ │
//! │         │                │                  │           │
//! │         ▼                │                  │           │
//! │  ┌─────────────────────────────────────────────────────┐│
//! │  │ Endpoint (single task, 1 s poll)                    ││
//! │  │   └── tally_core::TallyController                   ││
//! │  └─────────────────────────────────────────────────────┘│
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example: Starting the Endpoint
//!
//! ```rust,no_run
//! use clap::Parser;
//! use std::time::Duration;
//! use tally_relay::Cli;
//! use tokio_graceful_shutdown::{SubsystemBuilder, Toplevel};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let args = Cli::parse_from(["ardour-tally-relay", "-p", "8000"]);
//!     let endpoint = tally_relay::build_endpoint(&args).unwrap();
//!
//!     Toplevel::new(|s| async move {
//!         s.start(SubsystemBuilder::new("Tally", |subsys| endpoint.run(subsys)));
//!     })
//!     .catch_signals()
//!     .handle_shutdown_requests(Duration::from_secs(5))
//!     .await
//!     .unwrap();
//! }
//! ```
//!
//! ## Command-Line Interface
//!
//! See [`Cli`] for all available options. Key options:
//!
//! - `-p, --port` - Local OSC port (default: 8000)
//! - `-a, --ardour` - Ardour host[:port] (default: localhost:3819)
//! - `-m, --mode` - master, track or both (default: both)
//! - `-s, --serial` - Only use the relay with this serial number
//! - `--detect` - List attached relays and exit

pub mod config;
pub mod detect;
pub mod endpoint;
pub mod error;
pub mod hid_relay;
pub mod osc;

pub use config::{Cli, Mode, PeerAddress};
pub use endpoint::{Endpoint, MessageReceiver};
pub use error::TallyError;

use hid_relay::HidRelayBackend;
use osc::{OscReceiver, OscSender};
use tally_core::{RelayDriver, TallyController};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub type TallyEndpoint = Endpoint<OscReceiver, HidRelayBackend, OscSender>;

/// Resolve the peer, bind the listen port and wire up the controller.
///
/// The relay is not touched yet; that happens when the endpoint starts.
pub fn build_endpoint(args: &Cli) -> Result<TallyEndpoint, TallyError> {
    let peer = PeerAddress::parse(&args.ardour)?;
    let peer_addr = peer.resolve()?;
    log::debug!("Ardour {} resolves to {}", peer, peer_addr);

    let (receiver, sender) = osc::bind(args.port)?.split(peer_addr);

    let relay = RelayDriver::new(HidRelayBackend::new(), args.serial.clone());
    let controller = TallyController::new(
        args.mode.into(),
        args.ping_interval(),
        relay,
        sender,
    );

    Ok(Endpoint::new(receiver, controller, peer.to_string()))
}
