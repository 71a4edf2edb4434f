//! Command line configuration.

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use clap::Parser;
use tally_core::protocol::DEFAULT_ARDOUR_PORT;
use tally_core::CombinationMode;

use crate::error::TallyError;

#[derive(clap::ValueEnum, Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Light on while master record is enabled
    Master,
    /// Light on while a track is recording
    Track,
    /// Light on only when both are
    #[default]
    Both,
}

impl From<Mode> for CombinationMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Master => CombinationMode::Master,
            Mode::Track => CombinationMode::Track,
            Mode::Both => CombinationMode::Both,
        }
    }
}

/// Toggle USB relay in response to Ardour OSC messages.
#[derive(Parser, Clone, Debug)]
#[command(version, about)]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    /// Local port to listen on
    #[arg(short, long, default_value_t = 8000)]
    pub port: u16,

    /// Ardour host to connect to, with optional port number
    #[arg(short, long, default_value = "localhost:3819")]
    pub ardour: String,

    /// Turn the light on when master record is enabled, track record or both
    #[arg(short, long, default_value_t, value_enum)]
    pub mode: Mode,

    /// USB relay serial number
    #[arg(short, long)]
    pub serial: Option<String>,

    /// Ardour 'ping' interval, in seconds
    #[arg(short, long, default_value_t = 5.0, value_parser = parse_interval)]
    pub interval: f64,

    /// Enable debug output
    #[arg(short, long, default_value_t = false)]
    pub debug: bool,

    /// Detect connected USB Relay devices
    #[arg(long, default_value_t = false)]
    pub detect: bool,
}

impl Cli {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval)
    }

    pub fn log_level(&self) -> log::LevelFilter {
        let level = self.verbose.log_level_filter();
        if self.debug && level < log::LevelFilter::Debug {
            log::LevelFilter::Debug
        } else {
            level
        }
    }
}

fn parse_interval(s: &str) -> Result<f64, String> {
    let interval: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if interval.is_finite() && interval > 0.0 && interval < 1e9 {
        Ok(interval)
    } else {
        Err("interval must be a positive number of seconds".to_string())
    }
}

/// Ardour's OSC address as given on the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerAddress {
    pub host: String,
    pub port: u16,
}

impl PeerAddress {
    /// Parse `host` or `host:port`; the port defaults to 3819.
    pub fn parse(s: &str) -> Result<Self, TallyError> {
        let (host, port) = match s.split_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| TallyError::InvalidPeer(s.to_string()))?;
                (host, port)
            }
            None => (s, DEFAULT_ARDOUR_PORT),
        };
        if host.is_empty() {
            return Err(TallyError::InvalidPeer(s.to_string()));
        }
        Ok(PeerAddress {
            host: host.to_string(),
            port,
        })
    }

    /// First IPv4 address the host resolves to; the listen socket is IPv4.
    pub fn resolve(&self) -> Result<SocketAddr, TallyError> {
        let mut addrs = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|source| TallyError::Resolve {
                host: self.host.clone(),
                source,
            })?;
        addrs
            .find(SocketAddr::is_ipv4)
            .ok_or_else(|| TallyError::NoIpv4Address(self.host.clone()))
    }
}

impl std::fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
