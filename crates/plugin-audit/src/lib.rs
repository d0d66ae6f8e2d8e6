//! Audit trail plugin for Wirehub.
//!
//! Subscribes to every event on the bus and keeps a bounded in-memory
//! trail. Other plugins can append entries through the `audit:record`
//! action without holding a reference to this plugin. The trail is served
//! over the plugin's router; clearing it requires an `admin` token.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use wirehub_core::{AppError, AppResult};
use wirehub_plugin::manifest::PluginManifest;
use wirehub_plugin::payload::EventPayload;
use wirehub_plugin::routes::{PluginRouter, RouteMethod, RouteSpec, TokenRequirement};

/// Default capacity of the audit trail.
const DEFAULT_CAPACITY: usize = 1024;

/// One recorded dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    /// Event or action name, or the `source` field of an `audit:record`.
    pub subject: String,
    /// Named payload fields at dispatch time.
    pub fields: serde_json::Value,
    /// When the entry was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Bounded in-memory audit trail.
#[derive(Debug)]
pub struct AuditLog {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl AuditLog {
    /// Creates an empty trail with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates an empty trail with an explicit capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Appends an entry, evicting the oldest once full.
    pub fn record(&self, subject: &str, fields: serde_json::Value) {
        let mut entries = self.entries.lock().expect("audit log poisoned");
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(AuditEntry {
            subject: subject.to_string(),
            fields,
            recorded_at: Utc::now(),
        });
    }

    /// Most recent entries, newest last.
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries.lock().expect("audit log poisoned");
        entries
            .iter()
            .rev()
            .take(limit)
            .rev()
            .cloned()
            .collect()
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("audit log poisoned").len()
    }

    /// Returns whether the trail is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.lock().expect("audit log poisoned").clear();
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the plugin manifest around a shared trail.
pub fn manifest_with(log: Arc<AuditLog>) -> AppResult<PluginManifest> {
    let on_any_event = {
        let log = log.clone();
        move |payload: EventPayload| {
            let log = log.clone();
            async move {
                let subject = payload
                    .get_string("event")
                    .unwrap_or("<unnamed>")
                    .to_string();
                log.record(&subject, serde_json::json!(payload.fields));
                Ok(serde_json::json!(null))
            }
        }
    };

    let on_record_action = {
        let log = log.clone();
        move |payload: EventPayload| {
            let log = log.clone();
            async move {
                let source = payload
                    .get_string("source")
                    .ok_or_else(|| AppError::validation("audit:record requires a 'source' field"))?
                    .to_string();
                log.record(&source, serde_json::json!(payload.fields));
                debug!(source = %source, "Audit entry recorded via action");
                Ok(serde_json::json!({ "recorded": source }))
            }
        }
    };

    let recent_route = {
        let log = log.clone();
        RouteSpec::new(RouteMethod::Get, "/recent", move |request| {
            let log = log.clone();
            async move {
                let limit = request
                    .query
                    .get("limit")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(50);
                Ok(serde_json::json!({ "entries": log.recent(limit) }))
            }
        })
    };

    let clear_route = {
        let log = log.clone();
        RouteSpec::new(RouteMethod::Post, "/clear", move |_request| {
            let log = log.clone();
            async move {
                let dropped = log.len();
                log.clear();
                Ok(serde_json::json!({ "dropped": dropped }))
            }
        })
        .require_token(TokenRequirement::group("admin"))
    };

    Ok(PluginManifest::builder()
        .description("Audit trail\nRecords every dispatched event and serves the trail.")
        // Runs late so earlier handlers have already acted on the event.
        .on_event("*", 100, on_any_event)
        .on_action("audit:record", 0, on_record_action)
        .router(
            PluginRouter::with_prefix("/audit")
                .route(recent_route)
                .route(clear_route),
        )
        .on_register(|registrar| {
            debug!(plugin = %registrar.plugin(), "Audit plugin registered");
            Ok(())
        })
        .on_unregister(|registrar| {
            debug!(plugin = %registrar.plugin(), "Audit plugin unregistered");
            Ok(())
        })
        .build())
}

/// Manifest factory with a trail owned by the plugin itself.
pub fn manifest() -> AppResult<PluginManifest> {
    manifest_with(Arc::new(AuditLog::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wirehub_plugin::{DispatchEngine, PluginDescriptor, RouteRequest};

    #[test]
    fn trail_is_bounded() {
        let log = AuditLog::with_capacity(2);
        log.record("a", serde_json::json!({}));
        log.record("b", serde_json::json!({}));
        log.record("c", serde_json::json!({}));

        let subjects: Vec<String> = log.recent(10).into_iter().map(|e| e.subject).collect();
        assert_eq!(subjects, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn records_fired_events() {
        let log = Arc::new(AuditLog::new());
        let engine = DispatchEngine::new();
        let shared = log.clone();
        engine
            .load_plugin(PluginDescriptor::from_factory("audit", move || {
                manifest_with(shared.clone())
            }))
            .await
            .unwrap();

        engine
            .fire_event(
                "git:push",
                EventPayload::new().with_string("event", "git:push"),
            )
            .await
            .unwrap();

        assert_eq!(log.len(), 1);
        assert_eq!(log.recent(1)[0].subject, "git:push");
    }

    #[tokio::test]
    async fn record_action_requires_source() {
        let log = Arc::new(AuditLog::new());
        let engine = DispatchEngine::new();
        let shared = log.clone();
        engine
            .load_plugin(PluginDescriptor::from_factory("audit", move || {
                manifest_with(shared.clone())
            }))
            .await
            .unwrap();

        let err = engine
            .do_action("audit:record", EventPayload::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind, wirehub_core::error::ErrorKind::Validation);

        engine
            .do_action(
                "audit:record",
                EventPayload::new().with_string("source", "mail"),
            )
            .await
            .unwrap();
        assert_eq!(log.recent(1)[0].subject, "mail");
    }

    #[tokio::test]
    async fn recent_route_serves_entries() {
        let log = Arc::new(AuditLog::new());
        log.record("boot", serde_json::json!({}));

        let engine = DispatchEngine::new();
        let shared = log.clone();
        engine
            .load_plugin(PluginDescriptor::from_factory("audit", move || {
                manifest_with(shared.clone())
            }))
            .await
            .unwrap();

        let value = engine
            .handle_route(RouteMethod::Get, "/audit/recent", RouteRequest::default())
            .await
            .unwrap();
        assert_eq!(value["entries"][0]["subject"], "boot");
    }
}
