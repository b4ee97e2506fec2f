//! Credgate Server
//!
//! Entry point for the credgate-backend server with configuration loading,
//! store client construction, and HTTP server startup.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use secrecy::SecretString;
use tokio::net::TcpListener;

use credgate_backend::state::AppState;

mod cli;
mod tracing_setup;

use cli::CliArgs;
use tracing_setup::install_tracing_from_config;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    if args.help_requested {
        CliArgs::print_help();
        return Ok(());
    }

    // Resolve config path: CLI > environment variable
    let config_path = args
        .config_path
        .or_else(|| std::env::var("CREDGATE_CONFIG_PATH").ok());

    let config = load_config(&config_path)?;
    credgate_config::validate_config(&config).context("invalid configuration")?;

    install_tracing_from_config(&config.logging);

    let app = build_app(&config)?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "server listening");

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Load configuration from file or defaults.
fn load_config(path: &Option<String>) -> anyhow::Result<credgate_config::Config> {
    match path.as_deref() {
        Some(p) => credgate_config::load_config(Some(p)).map_err(|e| {
            eprintln!("failed to load configuration: {e}");
            anyhow::anyhow!(e.to_string())
        }),
        None => credgate_config::load_config::<&std::path::Path>(None).map_err(|e| {
            eprintln!("failed to load configuration: {e}");
            anyhow::anyhow!(e.to_string())
        }),
    }
}

/// Build the application router, either normal or degraded mode.
///
/// Missing store configuration does not abort startup: the auth routes are
/// kept registered and answer every request with the misconfigured error.
fn build_app(config: &credgate_config::Config) -> anyhow::Result<Router> {
    let store_cfg = &config.store;

    if !store_cfg.is_configured() {
        tracing::error!("store endpoint or service key missing, starting degraded");
        return Ok(credgate_backend::build_degraded_router(&config.cors));
    }

    let endpoint = store_cfg.endpoint.as_deref().unwrap_or_default();
    let service_key = store_cfg.service_key.clone().unwrap_or_default();

    let store = credgate_store::RestStore::new(
        endpoint,
        SecretString::from(service_key),
        store_cfg.table.clone(),
        USER_AGENT,
    )
    .context("failed to build store client")?;

    tracing::info!(endpoint = %endpoint, table = %store_cfg.table, "user store configured");

    let state = AppState::new(Arc::new(store), store_cfg.touch_on_login);
    Ok(credgate_backend::build_router(Arc::new(state), &config.cors))
}
