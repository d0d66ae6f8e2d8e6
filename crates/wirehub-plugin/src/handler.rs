//! Handler records — a name, a priority, and a bound async callable.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use glob::Pattern;
use serde::Serialize;
use tracing::debug;

use wirehub_core::{AppError, AppResult};

use crate::gate::ConditionGate;
use crate::payload::EventPayload;

/// Boxed future returned by a handler invocation.
pub type HandlerFuture = BoxFuture<'static, AppResult<serde_json::Value>>;

/// The bound callable of a handler record.
///
/// Synchronous handlers return a ready future; asynchronous handlers a real
/// one. Both are driven on the host runtime under the dispatch deadline.
pub type HandlerFn = Arc<dyn Fn(EventPayload) -> HandlerFuture + Send + Sync>;

/// Which bus a handler is registered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    /// Publish/subscribe broadcast.
    Event,
    /// Request-for-service.
    Action,
}

/// A handler registered against an event or action name with a priority.
///
/// Immutable once collected at plugin load time. Lower priority values run
/// earlier; ties are broken by insertion order.
#[derive(Clone)]
pub struct HandlerRecord {
    /// Bus this handler is registered on.
    pub kind: HandlerKind,
    /// Registered name; glob-matched case-sensitively against fired names.
    pub name: String,
    /// Execution priority (lower = runs earlier).
    pub priority: i32,
    /// Name of the plugin that contributed this handler. Set at load time.
    pub plugin: String,
    /// Compiled glob pattern; `None` means the name is matched literally.
    pattern: Option<Pattern>,
    /// Optional dispatch constraint.
    gate: Option<ConditionGate>,
    /// The bound callable.
    func: HandlerFn,
}

impl HandlerRecord {
    /// Creates a handler record from an async closure.
    pub fn new<F, Fut>(kind: HandlerKind, name: &str, priority: i32, func: F) -> Self
    where
        F: Fn(EventPayload) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = AppResult<serde_json::Value>> + Send + 'static,
    {
        Self {
            kind,
            name: name.to_string(),
            priority,
            plugin: String::new(),
            pattern: Pattern::new(name).ok(),
            gate: None,
            func: Arc::new(move |payload| Box::pin(func(payload))),
        }
    }

    /// Creates an event handler record.
    pub fn event<F, Fut>(name: &str, priority: i32, func: F) -> Self
    where
        F: Fn(EventPayload) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = AppResult<serde_json::Value>> + Send + 'static,
    {
        Self::new(HandlerKind::Event, name, priority, func)
    }

    /// Creates an action handler record.
    pub fn action<F, Fut>(name: &str, priority: i32, func: F) -> Self
    where
        F: Fn(EventPayload) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = AppResult<serde_json::Value>> + Send + 'static,
    {
        Self::new(HandlerKind::Action, name, priority, func)
    }

    /// Attaches a condition gate to this handler.
    pub fn with_gate(mut self, gate: ConditionGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Stamps the owning plugin's name onto this record.
    pub(crate) fn owned_by(mut self, plugin: &str) -> Self {
        self.plugin = plugin.to_string();
        self
    }

    /// Returns whether this handler's registered name matches a fired name.
    ///
    /// Matching is case-sensitive glob; a registered name that is not a
    /// valid pattern is compared literally.
    pub fn matches(&self, fired: &str) -> bool {
        match &self.pattern {
            Some(pattern) => pattern.matches(fired),
            None => self.name == fired,
        }
    }

    /// Invokes the handler under the given deadline.
    ///
    /// Returns `Ok(None)` when the gate declined, `Ok(Some(value))` when the
    /// handler ran, and an error when the handler failed or timed out.
    pub async fn invoke(
        &self,
        payload: EventPayload,
        deadline: Duration,
    ) -> AppResult<Option<serde_json::Value>> {
        if let Some(gate) = &self.gate
            && !gate.check(&self.name, &payload)
        {
            return Ok(None);
        }

        debug!(
            handler = %self.name,
            plugin = %self.plugin,
            priority = self.priority,
            "Invoking handler"
        );

        match tokio::time::timeout(deadline, (self.func)(payload)).await {
            Ok(result) => result.map(Some),
            Err(_) => Err(AppError::timeout(format!(
                "handler '{}' of plugin '{}' timed out after {}s",
                self.name,
                self.plugin,
                deadline.as_secs()
            ))),
        }
    }
}

impl std::fmt::Debug for HandlerRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRecord")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("plugin", &self.plugin)
            .field("gated", &self.gate.is_some())
            .finish()
    }
}
