//! Dicerelay Server
//!
//! Run with: cargo run -- [PORT]
//!
//! # Configuration
//!
//! Settings are layered: defaults, then a TOML file (`--config` or a default
//! location), then `DICERELAY_*` environment variables, then flags.
//! `RUST_LOG` takes precedence over `logging.level`.

use anyhow::Context;
use clap::Parser;
use dicerelay::config::{generate_default_config, Config, LoggingConfig};
use dicerelay::websocket::RelayMode;
use dicerelay::{serve, AppState};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dicerelay")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "WebSocket fan-out relay with an optional dice roller")]
struct Cli {
    /// Port to listen on (default: 5069)
    port: Option<u16>,

    /// Address to bind to
    #[arg(long)]
    host: Option<String>,

    /// Broadcast mode
    #[arg(short, long, value_enum)]
    mode: Option<RelayMode>,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print a default config file and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", generate_default_config());
        return Ok(());
    }

    // Loading can log warnings before the configured subscriber exists
    let config = tracing::subscriber::with_default(bootstrap_subscriber(), || load_config(&cli))?;

    init_tracing(&config.logging);

    tracing::info!("Starting dicerelay v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Broadcast mode: {}", config.hub.mode.as_str());
    if config.server.allowed_origins.is_empty() {
        tracing::warn!("No allowed_origins configured, accepting WebSocket upgrades from any origin");
    }

    let state = AppState::new(config.clone())?;
    tracing::info!("Server address for envelopes: {}", state.server_ip);

    serve(state, &config.server).await?;

    tracing::info!("Dicerelay stopped");
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::load_default(),
    };

    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(host) = &cli.host {
        config.server.host = host.clone();
    }
    if let Some(mode) = cli.mode {
        config.hub.mode = mode;
    }
    config.validate()?;
    Ok(config)
}

/// Plain stderr logging used only while the config is loaded
fn bootstrap_subscriber() -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dicerelay=info".into()),
        )
        .with_writer(std::io::stderr)
        .finish()
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("dicerelay={},tower_http=info", logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_config_applies_flags_over_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[hub]\nqueue_capacity = 8\n").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let cli = Cli::try_parse_from(["dicerelay", "7000", "--mode", "dice", "-c", &path]).unwrap();
        let config = load_config(&cli).unwrap();

        assert_eq!(config.server.port, 7000);
        assert_eq!(config.hub.mode, RelayMode::Dice);
        assert_eq!(config.hub.queue_capacity, 8);
    }

    #[test]
    fn test_load_config_rejects_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[hub]\nqueue_capacity = 0\n").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let cli = Cli::try_parse_from(["dicerelay", "-c", &path]).unwrap();
        assert!(load_config(&cli).is_err());
    }

    #[test]
    fn test_bootstrap_subscriber_records_config_warnings() {
        tracing::subscriber::with_default(bootstrap_subscriber(), || {
            assert!(tracing::enabled!(target: "dicerelay::config", tracing::Level::WARN));
        });
    }
}
