//! Bootstraps the store: loads configuration, opens the pool and creates
//! any missing tables.
//!
//! Usage:
//!   trackstore                     # uses .env / process environment
//!   RUST_LOG=trackstore=debug ...  # log every statement

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;
use trackstore::{Config, Store};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(%err, "configuration");
            return ExitCode::FAILURE;
        }
    };

    let store = Store::connect(config.database);
    if let Err(err) = store.adapter().await {
        tracing::error!(%err, "database bootstrap failed");
        return ExitCode::FAILURE;
    }

    tracing::info!(server_address = %config.server_address, "store ready");
    ExitCode::SUCCESS
}
