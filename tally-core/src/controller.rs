//! Tally controller: record state in, relay commands out.
//!
//! [`TallyController`] owns every piece of mutable state (record flags,
//! watchdog timers, relay handle) and is driven by its shell from a single
//! thread:
//!
//! ```text
//!  InboundMessage ──▶ handle_message ──┐
//!                                      ├──▶ decide(state, mode) ──▶ RelayDriver
//!  tick(now) ──▶ Watchdog::poll ───────┘
//!                      │
//!                      └──▶ MessageSender (feedback request)
//! ```

use std::time::Duration;

use crate::io::MessageSender;
use crate::policy::{decide, CombinationMode, TallyState};
use crate::protocol::{self, InboundMessage};
use crate::relay::{RelayBackend, RelayDriver};
use crate::watchdog::{Watchdog, WatchdogEvent};

fn on_off(on: bool) -> &'static str {
    if on {
        "ON"
    } else {
        "OFF"
    }
}

pub struct TallyController<B: RelayBackend, S: MessageSender> {
    mode: CombinationMode,
    state: TallyState,
    watchdog: Watchdog,
    relay: RelayDriver<B>,
    sender: S,
}

impl<B: RelayBackend, S: MessageSender> TallyController<B, S> {
    pub fn new(
        mode: CombinationMode,
        ping_interval: Duration,
        relay: RelayDriver<B>,
        sender: S,
    ) -> Self {
        TallyController {
            mode,
            state: TallyState::default(),
            watchdog: Watchdog::new(ping_interval),
            relay,
            sender,
        }
    }

    pub fn state(&self) -> TallyState {
        self.state
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    pub fn relay(&self) -> &RelayDriver<B> {
        &self.relay
    }

    /// Desired light state.
    pub fn light(&self) -> bool {
        decide(self.state, self.mode)
    }

    /// Put the relay in a known state; both flags are off so this turns the
    /// light off.
    pub fn start(&mut self) {
        self.toggle_light();
    }

    /// Ask Ardour for feedback (the watchdog "ping").
    pub fn request_feedback(&mut self, current_time_ms: u64) {
        log::debug!("Asking Ardour for feedback");
        match protocol::feedback_request() {
            Ok(packet) => {
                if let Err(e) = self.sender.send_packet(&packet) {
                    log::warn!("Cannot send feedback request: {}", e);
                }
            }
            Err(e) => log::error!("{}", e),
        }
        self.watchdog.ping_sent(current_time_ms);
    }

    pub fn handle_message(&mut self, message: &InboundMessage, current_time_ms: u64) {
        log::debug!("message received {:?}", message);
        match message {
            InboundMessage::RecEnableToggle(on) => {
                if *on != self.state.master_record {
                    log::info!("Master Record {}", on_off(*on));
                    self.state.master_record = *on;
                    self.toggle_light();
                }
            }
            InboundMessage::RecordTally(on) => {
                if *on != self.state.track_record {
                    log::info!("Track Record {}", on_off(*on));
                    self.state.track_record = *on;
                    self.toggle_light();
                }
            }
            InboundMessage::Heartbeat => self.watchdog.heartbeat(current_time_ms),
            InboundMessage::Other(_) => {}
        }
    }

    /// Periodic service: pings and peer-loss detection.
    pub fn tick(&mut self, current_time_ms: u64) {
        for event in self.watchdog.poll(current_time_ms) {
            match event {
                WatchdogEvent::PingDue { silence_ms } => {
                    if silence_ms == u64::MAX {
                        log::debug!("no message received yet");
                    } else {
                        log::debug!(
                            "no message received in {:.3}s",
                            silence_ms as f64 / 1000.0
                        );
                    }
                    self.request_feedback(current_time_ms);
                }
                WatchdogEvent::PeerLost { silence_ms } => {
                    log::info!(
                        "No heartbeat heard from Ardour in {:.3}s",
                        silence_ms as f64 / 1000.0
                    );
                    self.state.clear();
                    self.toggle_light();
                }
            }
        }
    }

    /// Final toggle before exit: the light is always left off.
    pub fn shutdown(&mut self) {
        self.state.clear();
        self.toggle_light();
        self.relay.close();
    }

    fn toggle_light(&mut self) {
        let on = self.light();
        log::info!("Turning the tally light {}", on_off(on));
        if let Err(e) = self.relay.set_light(on) {
            log::debug!("Tally light left as it was: {}", e);
        }
    }
}
