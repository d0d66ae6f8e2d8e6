//! HTTP handlers over the engine's public surface.

use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, Query, Request, State};
use axum::http::HeaderMap;
use serde::Serialize;
use serde_json::json;

use wirehub_core::AppError;
use wirehub_plugin::routes::{RouteMethod, RouteRequest, TokenRequirement};
use wirehub_plugin::{DocTag, EventPayload, PluginSummary};

use crate::error::ApiError;
use crate::state::AppState;

/// Maximum accepted size of a plugin route body.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Plugin listing: summaries plus documentation tags.
#[derive(Debug, Serialize)]
pub struct PluginListResponse {
    /// Loaded plugin summaries, in load order.
    pub plugins: Vec<PluginSummary>,
    /// Documentation tags of plugins with routes.
    pub tags: Vec<DocTag>,
}

/// Lists loaded plugins.
pub async fn list_plugins(State(state): State<AppState>) -> Json<PluginListResponse> {
    Json(PluginListResponse {
        plugins: state.engine.plugins().await,
        tags: state.engine.doc_tags().await,
    })
}

/// Returns one plugin's summary.
pub async fn get_plugin(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<PluginSummary>, ApiError> {
    let summary = state
        .engine
        .get_plugin(&name)
        .await
        .ok_or_else(|| AppError::not_found(format!("plugin '{name}' not found")))?;
    Ok(Json(summary))
}

/// Unloads a plugin. Requires an `admin` token.
pub async fn unload_plugin(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request = bare_request(query, &headers);
    state
        .gateway
        .verify_request(&request, &TokenRequirement::group("admin"))?;

    state.engine.unload_plugin(&name).await?;
    Ok(Json(json!({ "unloaded": name })))
}

/// Fires an event with the posted payload.
pub async fn fire_event(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(payload): Json<EventPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let handlers = state.engine.fire_event(&name, payload).await?;
    Ok(Json(json!({ "event": name, "handlers": handlers })))
}

/// Runs an action with the posted payload.
pub async fn do_action(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(payload): Json<EventPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let handlers = state.engine.do_action(&name, payload).await?;
    Ok(Json(json!({ "action": name, "handlers": handlers })))
}

/// Fallback: dispatches unmatched requests through the plugin route table.
pub async fn dispatch_plugin_route(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (parts, body) = request.into_parts();

    let method = match parts.method.as_str() {
        "GET" => RouteMethod::Get,
        "POST" => RouteMethod::Post,
        "PUT" => RouteMethod::Put,
        "DELETE" => RouteMethod::Delete,
        other => {
            return Err(AppError::not_found(format!(
                "no route for {} {}",
                other,
                parts.uri.path()
            ))
            .into());
        }
    };

    let query = parts
        .uri
        .query()
        .map(parse_query_string)
        .unwrap_or_default();
    let mut route_request = bare_request(query, &parts.headers);

    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| AppError::validation(format!("failed to read request body: {e}")))?;
    if !bytes.is_empty() {
        route_request.body = Some(
            serde_json::from_slice(&bytes)
                .map_err(|e| AppError::validation(format!("invalid JSON body: {e}")))?,
        );
    }

    let path = parts.uri.path().to_string();
    let value = state.engine.handle_route(method, &path, route_request).await?;
    Ok(Json(value))
}

/// Builds a route request carrying the credential transports only.
fn bare_request(query: HashMap<String, String>, headers: &HeaderMap) -> RouteRequest {
    let mut request = RouteRequest {
        query,
        ..RouteRequest::default()
    };

    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            request
                .headers
                .insert(name.as_str().to_ascii_lowercase(), value.to_string());
        }
    }

    if let Some(cookie_header) = request.headers.get("cookie").cloned() {
        for pair in cookie_header.split(';') {
            if let Some((key, value)) = pair.trim().split_once('=') {
                request.cookies.insert(key.to_string(), value.to_string());
            }
        }
    }

    request
}

/// Splits a raw query string into a key/value map.
fn parse_query_string(raw: &str) -> HashMap<String, String> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}
