//! Liveness watchdog for the Ardour OSC peer.
//!
//! Ardour only sends feedback to surfaces that asked for it, and it only
//! sends `/heartbeat` while feedback is enabled. The watchdog therefore does
//! two jobs on every tick:
//!
//! - re-send the feedback request when nothing has been heard or sent for
//!   longer than the ping interval, and
//! - declare the peer lost when heartbeats stop for three ping intervals.
//!
//! ```text
//!            heartbeat                       heartbeat
//!   ┌──────────────┐  ─────────────────▶  ┌───────────┐ ◀─┐
//!   │ Disconnected │                      │ Connected │   │ heartbeat
//!   └──────────────┘  ◀─────────────────  └───────────┘ ──┘
//!                     silence > 3 × interval
//! ```
//!
//! Like the rest of this crate it is a pure state machine: time is passed in
//! as milliseconds on a monotonic clock and the caller performs the I/O.

use std::time::Duration;

/// Default interval between feedback requests.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(5);

/// Heartbeat silence, in ping intervals, after which the peer is lost.
pub const DISCONNECT_FACTOR: u64 = 3;

/// Peer liveness as seen by the watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// No heartbeat since start or since the last disconnect
    Disconnected,
    /// Heartbeat seen within the disconnect threshold
    Connected,
}

impl std::fmt::Display for PeerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeerState::Disconnected => write!(f, "Disconnected"),
            PeerState::Connected => write!(f, "Connected"),
        }
    }
}

/// Actions the watchdog asks its owner to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogEvent {
    /// Nothing sent or heard for `silence_ms`; send a feedback request
    PingDue { silence_ms: u64 },
    /// No heartbeat for `silence_ms`; the peer is gone and the tally must be
    /// reset
    PeerLost { silence_ms: u64 },
}

/// Tracks the last ping sent and the last heartbeat received.
#[derive(Debug, Clone)]
pub struct Watchdog {
    ping_interval_ms: u64,
    last_ping_ms: Option<u64>,
    last_heartbeat_ms: Option<u64>,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new(DEFAULT_PING_INTERVAL)
    }
}

impl Watchdog {
    pub fn new(ping_interval: Duration) -> Self {
        Watchdog {
            ping_interval_ms: ping_interval.as_millis() as u64,
            last_ping_ms: None,
            last_heartbeat_ms: None,
        }
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn disconnect_threshold(&self) -> Duration {
        Duration::from_millis(self.disconnect_threshold_ms())
    }

    fn disconnect_threshold_ms(&self) -> u64 {
        self.ping_interval_ms.saturating_mul(DISCONNECT_FACTOR)
    }

    pub fn last_ping_ms(&self) -> Option<u64> {
        self.last_ping_ms
    }

    pub fn last_heartbeat_ms(&self) -> Option<u64> {
        self.last_heartbeat_ms
    }

    pub fn state(&self) -> PeerState {
        match self.last_heartbeat_ms {
            Some(_) => PeerState::Connected,
            None => PeerState::Disconnected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == PeerState::Connected
    }

    /// Record a heartbeat from the peer.
    pub fn heartbeat(&mut self, current_time_ms: u64) {
        self.last_heartbeat_ms = Some(current_time_ms);
    }

    /// Record that a feedback request went out.
    pub fn ping_sent(&mut self, current_time_ms: u64) {
        self.last_ping_ms = Some(current_time_ms);
    }

    /// Time since the last ping or heartbeat, whichever is newer.
    ///
    /// `None` if neither has ever happened.
    pub fn silence_ms(&self, current_time_ms: u64) -> Option<u64> {
        let last = match (self.last_ping_ms, self.last_heartbeat_ms) {
            (Some(p), Some(h)) => p.max(h),
            (Some(t), None) | (None, Some(t)) => t,
            (None, None) => return None,
        };
        Some(current_time_ms.saturating_sub(last))
    }

    /// Evaluate both timers.
    ///
    /// A `PeerLost` event has already cleared the heartbeat timestamp; the
    /// caller is responsible for resetting the tally state. A `PingDue` event
    /// does not update the ping timestamp, call [`Watchdog::ping_sent`] once
    /// the request is out.
    pub fn poll(&mut self, current_time_ms: u64) -> Vec<WatchdogEvent> {
        let mut events = Vec::new();

        match self.silence_ms(current_time_ms) {
            Some(silence_ms) if silence_ms <= self.ping_interval_ms => {}
            silence => events.push(WatchdogEvent::PingDue {
                silence_ms: silence.unwrap_or(u64::MAX),
            }),
        }

        if let Some(last) = self.last_heartbeat_ms {
            let silence_ms = current_time_ms.saturating_sub(last);
            if silence_ms > self.disconnect_threshold_ms() {
                self.last_heartbeat_ms = None;
                events.push(WatchdogEvent::PeerLost { silence_ms });
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_three_intervals() {
        let watchdog = Watchdog::new(Duration::from_secs(5));
        assert_eq!(watchdog.ping_interval(), Duration::from_secs(5));
        assert_eq!(watchdog.disconnect_threshold(), Duration::from_secs(15));

        let watchdog = Watchdog::new(Duration::from_secs_f64(0.5));
        assert_eq!(watchdog.disconnect_threshold(), Duration::from_millis(1500));
    }

    #[test]
    fn test_ping_due_when_never_pinged() {
        let mut watchdog = Watchdog::default();
        assert_eq!(watchdog.silence_ms(0), None);
        assert_eq!(
            watchdog.poll(0),
            vec![WatchdogEvent::PingDue {
                silence_ms: u64::MAX
            }]
        );
    }

    #[test]
    fn test_ping_emission() {
        let mut watchdog = Watchdog::new(Duration::from_secs(5));
        watchdog.ping_sent(0);

        assert!(watchdog.poll(5_000).is_empty());

        let events = watchdog.poll(5_001);
        assert_eq!(events, vec![WatchdogEvent::PingDue { silence_ms: 5_001 }]);
        watchdog.ping_sent(5_001);
        assert_eq!(watchdog.last_ping_ms(), Some(5_001));

        // Exactly one ping per interval
        assert!(watchdog.poll(6_000).is_empty());
    }

    #[test]
    fn test_heartbeat_postpones_ping() {
        let mut watchdog = Watchdog::new(Duration::from_secs(5));
        watchdog.ping_sent(0);
        watchdog.heartbeat(4_000);

        assert!(watchdog.poll(8_000).is_empty());
        assert_eq!(
            watchdog.poll(9_500),
            vec![WatchdogEvent::PingDue { silence_ms: 5_500 }]
        );
    }

    #[test]
    fn test_disconnect_after_threshold() {
        let mut watchdog = Watchdog::new(Duration::from_secs(5));
        watchdog.heartbeat(0);
        assert_eq!(watchdog.state(), PeerState::Connected);

        let events = watchdog.poll(14_000);
        assert!(!events
            .iter()
            .any(|e| matches!(e, WatchdogEvent::PeerLost { .. })));
        assert!(watchdog.is_connected());

        let events = watchdog.poll(16_000);
        assert!(events.contains(&WatchdogEvent::PeerLost { silence_ms: 16_000 }));
        assert_eq!(watchdog.state(), PeerState::Disconnected);
        assert_eq!(watchdog.last_heartbeat_ms(), None);

        // Lost only once
        let events = watchdog.poll(17_000);
        assert!(!events
            .iter()
            .any(|e| matches!(e, WatchdogEvent::PeerLost { .. })));
    }

    #[test]
    fn test_heartbeat_reconnects() {
        let mut watchdog = Watchdog::new(Duration::from_secs(5));
        watchdog.heartbeat(0);
        watchdog.poll(20_000);
        assert!(!watchdog.is_connected());

        watchdog.heartbeat(21_000);
        assert!(watchdog.is_connected());
        assert_eq!(watchdog.last_heartbeat_ms(), Some(21_000));
    }

    #[test]
    fn test_never_connected_never_lost() {
        let mut watchdog = Watchdog::new(Duration::from_secs(5));
        watchdog.ping_sent(0);
        let events = watchdog.poll(1_000_000);
        assert_eq!(
            events,
            vec![WatchdogEvent::PingDue {
                silence_ms: 1_000_000
            }]
        );
    }
}
