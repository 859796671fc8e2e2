use ayurchain::{api::Server, config::Config, ledger};
use tracing::info;

/// Configuration file used when `AYURCHAIN_CONFIG` is not set.
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// The main entry point for the batch service.
///
/// Initializes logging, loads the configuration, opens (and validates) the
/// ledger store once, and serves the REST API on top of it.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config_path =
        std::env::var("AYURCHAIN_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)?;
    info!("AyurChain starting with config from {}: {:?}", config_path, config);

    // A ledger that cannot be reached at startup is fatal; requests never run
    // against an unvalidated store.
    let store = ledger::open(&config).await?;

    let server = Server::new(config.api, store);
    server.start().await?;

    Ok(())
}
