//! Application state shared across all handlers.

use std::sync::Arc;

use wirehub_auth::AuthGateway;
use wirehub_core::config::AppConfig;
use wirehub_plugin::DispatchEngine;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`. All fields are
/// `Arc`-wrapped for cheap cloning across tasks.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// The dispatch engine.
    pub engine: Arc<DispatchEngine>,
    /// The auth gateway.
    pub gateway: Arc<AuthGateway>,
}

impl AppState {
    /// Creates the state from its parts.
    pub fn new(config: AppConfig, engine: Arc<DispatchEngine>, gateway: AuthGateway) -> Self {
        Self {
            config: Arc::new(config),
            engine,
            gateway: Arc::new(gateway),
        }
    }
}
