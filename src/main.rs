//! metronomed: the metrics hub daemon.
//!
//! ```text
//!  plugins ──▶ updater ──▶ hub ──▶ subscriber queues ──▶ /stats WebSockets
//!                          ▲
//!            config ───────┘ (interval, limits, credentials)
//! ```
//!
//! Configuration comes from a TOML file (`metronomed.toml` when present)
//! with command-line flags taking precedence.

use std::path::{Path, PathBuf};

use clap::Parser;

use metronome::config::{load_config, MetronomeConfig};
use metronome::observability::logging::init_logging;
use metronome::plugins::PluginRegistry;

const DEFAULT_CONFIG_PATH: &str = "metronomed.toml";

#[derive(Parser)]
#[command(name = "metronomed")]
#[command(about = "Streams system metrics to WebSocket subscribers", long_about = None)]
struct Cli {
    /// Configuration file. Defaults to ./metronomed.toml when it exists.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP listen address, e.g. 0.0.0.0:8999.
    #[arg(long)]
    http: Option<String>,

    /// Basic Authentication username.
    #[arg(long)]
    username: Option<String>,

    /// Basic Authentication password.
    #[arg(long)]
    password: Option<String>,

    /// Write logs to this file instead of stdout.
    #[arg(long)]
    log: Option<String>,

    /// Milliseconds between collection rounds.
    #[arg(long)]
    interval_ms: Option<u64>,
}

impl Cli {
    fn apply(self, config: &mut MetronomeConfig) {
        if let Some(http) = self.http {
            config.server.bind_address = http;
        }
        if let Some(username) = self.username {
            config.server.username = username;
        }
        if let Some(password) = self.password {
            config.server.password = password;
        }
        if let Some(log) = self.log {
            config.observability.log_file = Some(log);
        }
        if let Some(interval_ms) = self.interval_ms {
            config.server.update_interval_ms = interval_ms;
        }
    }
}

fn read_config(path: Option<&Path>) -> Result<MetronomeConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(load_config(path)?),
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if default.exists() {
                Ok(load_config(default)?)
            } else {
                Ok(MetronomeConfig::default())
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = read_config(cli.config.as_deref())?;
    cli.apply(&mut config);

    init_logging(&config.observability)?;
    tracing::info!("metronomed v{} starting", env!("CARGO_PKG_VERSION"));

    let registry = PluginRegistry::from_config(&config.plugins)?;
    tracing::info!(
        bind_address = %config.server.bind_address,
        plugins = ?registry.names(),
        "Configuration loaded"
    );

    if let Err(e) = metronome::lifecycle::run(config, registry).await {
        tracing::error!(error = %e, "Startup failed");
        return Err(e.into());
    }
    Ok(())
}
