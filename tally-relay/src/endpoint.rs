//! OSC endpoint: the event loop around [`TallyController`].
//!
//! Everything runs on one task. Each loop iteration waits at most
//! [`POLL_INTERVAL`] for a datagram, dispatches whatever arrived, then lets
//! the watchdog run. Shutdown is observed at the same await point; once the
//! loop has exited the controller switches the light off.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tally_core::protocol::{self, MAX_DATAGRAM_SIZE};
use tally_core::{MessageSender, RelayBackend, TallyController};
use tokio::time::timeout;
use tokio_graceful_shutdown::SubsystemHandle;

use crate::error::TallyError;

/// How long one receive waits before the watchdog gets to run.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Source of inbound datagrams.
#[async_trait]
pub trait MessageReceiver: Send {
    /// Wait for one datagram; returns its length and sender.
    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

pub struct Endpoint<R, B, S>
where
    R: MessageReceiver,
    B: RelayBackend,
    S: MessageSender,
{
    receiver: R,
    controller: TallyController<B, S>,
    peer: String,
    poll_interval: Duration,
    start_time: Instant,
}

impl<R, B, S> Endpoint<R, B, S>
where
    R: MessageReceiver,
    B: RelayBackend,
    S: MessageSender,
{
    /// `peer` is only used for the startup announcement.
    pub fn new(receiver: R, controller: TallyController<B, S>, peer: String) -> Self {
        Endpoint {
            receiver,
            controller,
            peer,
            poll_interval: POLL_INTERVAL,
            start_time: Instant::now(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn controller(&self) -> &TallyController<B, S> {
        &self.controller
    }

    /// Milliseconds since the endpoint was created.
    fn current_time_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Run as a tokio-graceful-shutdown subsystem.
    pub async fn run(self, subsys: SubsystemHandle) -> Result<(), TallyError> {
        self.run_until(subsys.on_shutdown_requested()).await;
        Ok(())
    }

    /// Serve until `shutdown` completes, then turn the light off.
    ///
    /// Returns the endpoint so callers can inspect the final state.
    pub async fn run_until<F>(mut self, shutdown: F) -> Self
    where
        F: Future<Output = ()>,
    {
        self.controller.start();
        log::info!("Talking to Ardour at {}", self.peer);
        let now = self.current_time_ms();
        self.controller.request_feedback(now);

        tokio::pin!(shutdown);
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("Shutdown requested. Exiting.");
                    break;
                }
                r = timeout(self.poll_interval, self.receiver.recv(&mut buf)) => {
                    match r {
                        Ok(Ok((len, from))) => self.dispatch(&buf[..len], from),
                        Ok(Err(e)) => log::debug!("OSC receive failed: {}", e),
                        Err(_) => {}
                    }
                }
            }

            let now = self.current_time_ms();
            self.controller.tick(now);
        }

        self.controller.shutdown();
        self
    }

    fn dispatch(&mut self, datagram: &[u8], from: SocketAddr) {
        let now = self.current_time_ms();
        match protocol::decode(datagram) {
            Ok(messages) => {
                for message in &messages {
                    self.controller.handle_message(message, now);
                }
            }
            Err(e) => log::debug!("Dropping datagram from {}: {}", from, e),
        }
    }
}
