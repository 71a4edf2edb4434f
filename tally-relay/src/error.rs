use miette::Diagnostic;
use thiserror::Error;

/// Startup failures. Anything that goes wrong once the loop runs is logged
/// and survived instead.
#[derive(Error, Debug, Diagnostic)]
pub enum TallyError {
    #[error("Cannot listen on UDP port {port}")]
    #[diagnostic(help("is another OSC surface already using this port?"))]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid Ardour address '{0}'")]
    #[diagnostic(help("use host or host:port, e.g. localhost:3819"))]
    InvalidPeer(String),
    #[error("Cannot resolve Ardour host '{host}'")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Ardour host '{0}' has no IPv4 address")]
    NoIpv4Address(String),
    #[error("USB relay error")]
    Relay(#[from] tally_core::RelayError),
}
