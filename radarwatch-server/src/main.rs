use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};
use miette::Result;
use std::time::Duration;
use tokio_graceful_shutdown::Toplevel;

use radarwatch_server::{config::ServerConfig, Cli, Session, VERSION};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let log_level = args.verbose.log_level_filter();
    env_logger::Builder::from_env(Env::default())
        .filter_level(log_level)
        .init();

    info!("Radarwatch {} loglevel {}", VERSION, log_level);
    if args.emulator {
        warn!("Emulator mode activated, this does the following:");
        warn!(" * Every configured radar is fed by a simulated antenna");
        warn!(" * Heading comes from the simulated radar");
        warn!(" * A single target moves through the picture");
    }

    let config =
        ServerConfig::load(args.config.as_deref()).map_err(|e| miette::miette!("{:#}", e))?;

    Toplevel::new(|s| async move {
        if let Err(e) = Session::new(&s, args, config) {
            error!("Cannot start: {}", e);
            s.request_shutdown();
        }
    })
    .catch_signals()
    .handle_shutdown_requests(Duration::from_millis(5000))
    .await
    .map_err(Into::into)
}
