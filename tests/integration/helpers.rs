//! Shared test helpers for integration tests.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use plugin_audit::AuditLog;
use wirehub_api::{AppState, build_router};
use wirehub_auth::{AuthGateway, TokenStore};
use wirehub_core::config::AppConfig;
use wirehub_plugin::{DispatchEngine, PluginDescriptor};
use wirehub_plugin_sdk::prelude::*;

/// Test application context.
pub struct TestApp {
    /// The Axum router for making test requests.
    pub router: Router,
    /// The engine behind the router.
    pub engine: Arc<DispatchEngine>,
    /// The audit plugin's trail, shared for assertions.
    pub audit: Arc<AuditLog>,
}

impl TestApp {
    /// Creates a test application with the audit plugin and an ops-gated
    /// test plugin loaded.
    pub async fn new(tokens_enabled: bool) -> Self {
        let engine = Arc::new(DispatchEngine::new());
        let audit = Arc::new(AuditLog::new());

        let shared = audit.clone();
        engine
            .load_plugin(PluginDescriptor::from_factory("audit", move || {
                plugin_audit::manifest_with(shared.clone())
            }))
            .await
            .expect("Failed to load audit plugin");

        engine
            .load_plugin(PluginDescriptor::from_factory("opsbay", ops_manifest))
            .await
            .expect("Failed to load ops plugin");

        let gateway = AuthGateway::new(token_store(), "token", tokens_enabled);
        engine
            .splice_auth(|requirement| gateway.verifier(requirement))
            .await;

        let state = AppState::new(AppConfig::default(), engine.clone(), gateway);

        Self {
            router: build_router(state),
            engine,
            audit,
        }
    }

    /// Sends one request and returns the status plus the JSON body.
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                builder.body(Body::from(value.to_string())).unwrap()
            }
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }
}

/// Token table used across the suite: one admin secret, one general secret.
pub fn token_store() -> TokenStore {
    let mut groups = HashMap::new();
    groups.insert(
        "admin".to_string(),
        HashMap::from([("alice".to_string(), "secretA".to_string())]),
    );
    groups.insert(
        "general".to_string(),
        HashMap::from([("bob".to_string(), "secretB".to_string())]),
    );
    TokenStore::from_groups(groups)
}

/// A plugin whose only route requires the `ops` token group. No secret in
/// the test table belongs to that group.
fn ops_manifest() -> AppResult<PluginManifest> {
    Ok(PluginManifest::builder()
        .description("Ops bay\nLocked behind the ops token group.")
        .router(
            PluginRouter::with_prefix("/ops").route(
                RouteSpec::new(RouteMethod::Get, "/status", |_| async {
                    Ok(json!({ "status": "operational" }))
                })
                .require_token(TokenRequirement::group("ops")),
            ),
        )
        .build())
}
