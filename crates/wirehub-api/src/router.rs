//! Route definitions for the Wirehub HTTP API.
//!
//! Admin endpoints over the engine's public surface live under `/api`;
//! every other request falls through to dynamic dispatch via the engine's
//! plugin route table.

use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/plugins", get(handlers::list_plugins))
        .route("/plugins/{name}", get(handlers::get_plugin))
        .route("/plugins/{name}", delete(handlers::unload_plugin))
        .route("/events/{name}", post(handlers::fire_event))
        .route("/actions/{name}", post(handlers::do_action));

    Router::new()
        .nest("/api", api_routes)
        .fallback(handlers::dispatch_plugin_route)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
