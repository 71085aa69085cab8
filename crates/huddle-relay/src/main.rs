//! huddle-relay binary: bind, configure logging, serve.

use std::path::PathBuf;

use clap::Parser;
use huddle_config::HuddleConfig;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "huddle_relay=info";

#[derive(Parser)]
#[command(name = "huddle-relay", version, about = "Signaling relay for huddle rooms")]
struct Args {
    /// Port to listen on. Overrides `[relay] port`.
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind. Overrides `[relay] bind_address`.
    #[arg(long)]
    bind: Option<String>,

    /// Config file path override.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter directive, e.g. `huddle_relay=debug`.
    #[arg(long)]
    log_level: Option<String>,
}

/// `RUST_LOG` wins, then the flag, then the config file's level.
fn env_filter(flag: Option<&str>, config_level: Option<&str>) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let directive = flag
        .map(str::to_string)
        .or_else(|| config_level.map(|level| format!("huddle_relay={level}")))
        .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_string());
    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let loaded = match &args.config {
        Some(path) => huddle_config::load_config_from(path),
        None => huddle_config::load_config(),
    };
    let (config, config_error) = match loaded {
        Ok(config) => (config, None),
        Err(e) => (HuddleConfig::default(), Some(e)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(
            args.log_level.as_deref(),
            config_error.is_none().then_some(config.logging.level.as_str()),
        ))
        .init();

    if let Some(e) = config_error {
        tracing::warn!("Config load failed, using defaults: {e}");
    }

    let bind = args.bind.unwrap_or(config.relay.bind_address);
    let port = args.port.unwrap_or(config.relay.port);
    let addr = format!("{bind}:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Failed to bind TCP listener");

    if let Err(e) = huddle_relay::serve(listener).await {
        tracing::error!(error = %e, "relay stopped");
    }
}
