use clap::Parser;
use miette::Result;
use std::time::Duration;
use tokio_graceful_shutdown::{SubsystemBuilder, Toplevel};

use tally_relay::detect::detect;
use tally_relay::hid_relay::HidRelayBackend;
use tally_relay::{build_endpoint, Cli, TallyError};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Cli::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level())
        .parse_default_env()
        .init();

    log::debug!("ardour-tally-relay {} {:?}", tally_relay::VERSION, args);

    if args.detect {
        detect(HidRelayBackend::new()).map_err(TallyError::from)?;
        return Ok(());
    }

    let endpoint = build_endpoint(&args)?;

    Toplevel::new(move |s| async move {
        s.start(SubsystemBuilder::new("Tally", |subsys| endpoint.run(subsys)));
    })
    .catch_signals()
    .handle_shutdown_requests(Duration::from_secs(5))
    .await
    .map_err(Into::into)
}
