//! # Radarwatch Server
//!
//! Guard zone daemon around [`radarwatch_core`].
//!
//! The server owns one [`RadarEngine`] and runs it with [`tokio`]:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  radarwatch-server                       │
//! │  ┌──────────────┐   ┌──────────────┐                     │
//! │  │ Emulator-N   │   │ Ticker       │  (subsystems)       │
//! │  │ spokes, hdg  │   │ power, alarm │                     │
//! │  └──────┬───────┘   └──────┬───────┘                     │
//! │         ▼                  ▼                             │
//! │  ┌─────────────────────────────────────────────────────┐ │
//! │  │          Arc<RadarEngine> (radarwatch-core)         │ │
//! │  └──────────────────────────┬──────────────────────────┘ │
//! │                             ▼                            │
//! │  ┌─────────────────────────────────────────────────────┐ │
//! │  │  ServerListener: log + power commands per radar     │ │
//! │  └─────────────────────────────────────────────────────┘ │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Components
//!
//! - [`Session`] - Engine, listener and configuration of a running server
//! - [`config::ServerConfig`] - JSON configuration file
//! - [`ticker::Ticker`] - Periodic engine tick
//! - `emulator::Emulator` - Emulated radar (feature `emulator`)
//!
//! ## Example: Starting the Server
//!
//! ```rust,no_run
//! use clap::Parser;
//! use radarwatch_server::{config::ServerConfig, Cli, Session};
//! use tokio_graceful_shutdown::Toplevel;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let args = Cli::parse_from(["radarwatch-server", "--emulator"]);
//!
//!     Toplevel::new(|s| async move {
//!         Session::new(&s, args, ServerConfig::default()).unwrap();
//!     })
//!     .catch_signals()
//!     .handle_shutdown_requests(Duration::from_secs(5))
//!     .await
//!     .unwrap();
//! }
//! ```

use clap::Parser;
use log::warn;
use radarwatch_core::{EngineError, RadarEngine};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle};

pub mod config;
#[cfg(feature = "emulator")]
pub mod emulator;
pub mod listener;
pub mod ticker;

use config::ServerConfig;
use listener::ServerListener;
use ticker::Ticker;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Clone, Debug)]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    /// Configuration file, instead of the one in the user's config directory
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Feed the radars from the built-in emulator
    #[arg(short, long, default_value_t = false)]
    pub emulator: bool,

    /// Engine tick interval in milliseconds, overrides the config file
    #[arg(short, long)]
    pub tick_ms: Option<u64>,
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("{0}")]
    Engine(#[from] EngineError),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Wall clock in milliseconds, the time base handed to the engine
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub struct Session {
    pub args: Cli,
    pub config: ServerConfig,
    pub engine: Arc<RadarEngine>,
    pub listener: Arc<ServerListener>,
}

impl Session {
    /// Set up the engine without starting anything
    pub fn new_base(args: Cli, config: ServerConfig) -> Result<Self, ServerError> {
        let engine = Arc::new(RadarEngine::new(config.engine.clone()));
        let listener = Arc::new(ServerListener::new());
        engine.add_listener(listener.clone());

        let now = now_millis();
        for radar in config.radars_or_default() {
            ServerConfig::apply_radar(&engine, &radar, now)?;
        }

        Ok(Session {
            args,
            config,
            engine,
            listener,
        })
    }

    /// Set up the engine and start the subsystems feeding and ticking it
    pub fn new(
        subsystem: &SubsystemHandle,
        args: Cli,
        config: ServerConfig,
    ) -> Result<Self, ServerError> {
        let session = Self::new_base(args, config)?;

        let tick_ms = session.args.tick_ms.unwrap_or(session.config.tick_ms);
        let ticker = Ticker::new(session.engine.clone(), tick_ms);
        subsystem.start(SubsystemBuilder::new("Ticker", move |a| ticker.run(a)));

        if session.args.emulator {
            session.start_emulators(subsystem)?;
        } else {
            warn!("No radar receive path configured; start with --emulator to generate data");
        }
        Ok(session)
    }

    #[cfg(feature = "emulator")]
    fn start_emulators(&self, subsystem: &SubsystemHandle) -> Result<(), ServerError> {
        use emulator::Emulator;
        use tokio::sync::mpsc;

        for radar in self.config.radars_or_default() {
            let handle = self.engine.handle(radar.id)?;
            let (tx, rx) = mpsc::unbounded_channel();
            self.listener.register(radar.id, tx);
            let emulator = Emulator::new(
                self.engine.clone(),
                handle,
                radar.resolution,
                self.config.emulator.clone(),
                rx,
            );
            log::info!("{}: emulated", radar.name());
            subsystem.start(SubsystemBuilder::new(
                format!("Emulator-{}", radar.id),
                move |a| emulator.run(a),
            ));
        }
        Ok(())
    }

    #[cfg(not(feature = "emulator"))]
    fn start_emulators(&self, _subsystem: &SubsystemHandle) -> Result<(), ServerError> {
        Err(ServerError::Config(
            "this build has no emulator support".to_string(),
        ))
    }
}
