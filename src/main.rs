//! Wirehub Server — Plugin & Event Dispatch Hub
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt};

use wirehub_api::{AppState, build_router};
use wirehub_auth::AuthGateway;
use wirehub_core::config::AppConfig;
use wirehub_core::{AppError, AppResult};
use wirehub_plugin::{DispatchEngine, EventPayload, PluginDescriptor, PluginLoader};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }
}

/// Load configuration from file and environment.
fn load_configuration() -> AppResult<AppConfig> {
    let env = std::env::var("WIREHUB_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging.
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => fmt().json().with_env_filter(filter).init(),
        _ => fmt().with_env_filter(filter).init(),
    }
}

async fn run(config: AppConfig) -> AppResult<()> {
    let engine = Arc::new(DispatchEngine::from_config(&config.plugins));
    let gateway = AuthGateway::from_config(&config.tokens)?;

    // Compiled-in plugins first, discovered plugins second, so discovered
    // handlers see the built-in buses already populated.
    engine
        .load_plugin(PluginDescriptor::from_factory(
            "audit",
            plugin_audit::manifest,
        ))
        .await?;

    let loader = PluginLoader::from_config(&config.plugins);
    let discovered = engine
        .load_plugins(&loader, config.plugins.fail_silently)
        .await?;
    tracing::info!(discovered = discovered.len(), "Plugins loaded");

    let spliced = engine
        .splice_auth(|requirement| gateway.verifier(requirement))
        .await;
    tracing::info!(
        routes = spliced,
        enabled = gateway.enabled(),
        "Token verification wired"
    );

    engine
        .fire_event(
            "server:start",
            EventPayload::new().with_string("event", "server:start"),
        )
        .await?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, engine.clone(), gateway);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("failed to bind {addr}: {e}")))?;
    tracing::info!(addr = %addr, "Wirehub server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::internal(format!("server error: {e}")))?;

    if let Err(e) = engine
        .fire_event(
            "server:stop",
            EventPayload::new().with_string("event", "server:stop"),
        )
        .await
    {
        tracing::warn!(error = %e, "server:stop handler failed");
    }

    let unloaded = engine.unload_all().await?;
    tracing::info!(plugins = unloaded.len(), "Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown signal received");
}
