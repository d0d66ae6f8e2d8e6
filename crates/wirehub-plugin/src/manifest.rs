//! Explicit plugin manifests.
//!
//! A plugin exposes one well-known factory returning a [`PluginManifest`]:
//! the declarative list of its event and action handlers, an optional
//! router, and optional register/unregister hooks. Loading a plugin means
//! calling the factory and reading the result; nothing is inferred from the
//! module itself.

use std::sync::Arc;

use wirehub_core::AppResult;

use crate::engine::Registrar;
use crate::gate::ConditionGate;
use crate::handler::{HandlerKind, HandlerRecord};
use crate::payload::EventPayload;
use crate::routes::PluginRouter;

/// Factory producing a plugin's manifest. Called once per `load()`.
pub type ManifestFactory = Arc<dyn Fn() -> AppResult<PluginManifest> + Send + Sync>;

/// Lifecycle hook invoked with a registrar scoped to the plugin.
///
/// The register hook may subscribe handlers and add routes imperatively;
/// everything it adds is attributed to the plugin and removed on unload.
pub type LifecycleHook = Arc<dyn Fn(&mut Registrar) -> AppResult<()> + Send + Sync>;

/// Symbol name a dynamic plugin library must export.
///
/// The symbol has the signature of [`PluginEntryFn`] and returns a manifest
/// allocated with `Box::into_raw`, or null on failure.
pub const PLUGIN_ENTRY_SYMBOL: &[u8] = b"wirehub_plugin_entry";

/// Type of the entry function exported by dynamic plugin libraries.
pub type PluginEntryFn = unsafe extern "C" fn() -> *mut PluginManifest;

/// Everything a plugin contributes, assembled by its factory.
#[derive(Default)]
pub struct PluginManifest {
    /// Description text. The block before a form-feed (`\f`) marker is
    /// significant: its first line becomes the short description, the whole
    /// block the long description.
    pub description: Option<String>,
    /// Event handler records, in declaration order.
    pub event_handlers: Vec<HandlerRecord>,
    /// Action handler records, in declaration order.
    pub action_handlers: Vec<HandlerRecord>,
    /// Contributed router, if any.
    pub router: Option<PluginRouter>,
    /// Registration hook, if any.
    pub register: Option<LifecycleHook>,
    /// Teardown hook, if any.
    pub unregister: Option<LifecycleHook>,
}

impl PluginManifest {
    /// Starts building a manifest.
    pub fn builder() -> PluginManifestBuilder {
        PluginManifestBuilder::default()
    }
}

impl std::fmt::Debug for PluginManifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManifest")
            .field("description", &self.description)
            .field("event_handlers", &self.event_handlers.len())
            .field("action_handlers", &self.action_handlers.len())
            .field("has_router", &self.router.is_some())
            .field("has_register", &self.register.is_some())
            .field("has_unregister", &self.unregister.is_some())
            .finish()
    }
}

/// Builder for [`PluginManifest`].
#[derive(Default)]
pub struct PluginManifestBuilder {
    manifest: PluginManifest,
}

impl PluginManifestBuilder {
    /// Sets the description text.
    pub fn description(mut self, text: &str) -> Self {
        self.manifest.description = Some(text.to_string());
        self
    }

    /// Subscribes an event handler.
    pub fn on_event<F, Fut>(mut self, name: &str, priority: i32, func: F) -> Self
    where
        F: Fn(EventPayload) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = AppResult<serde_json::Value>> + Send + 'static,
    {
        self.manifest
            .event_handlers
            .push(HandlerRecord::event(name, priority, func));
        self
    }

    /// Subscribes an event handler behind a condition gate.
    pub fn on_event_gated<F, Fut>(
        mut self,
        name: &str,
        priority: i32,
        gate: ConditionGate,
        func: F,
    ) -> Self
    where
        F: Fn(EventPayload) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = AppResult<serde_json::Value>> + Send + 'static,
    {
        self.manifest
            .event_handlers
            .push(HandlerRecord::event(name, priority, func).with_gate(gate));
        self
    }

    /// Registers an action handler.
    pub fn on_action<F, Fut>(mut self, name: &str, priority: i32, func: F) -> Self
    where
        F: Fn(EventPayload) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = AppResult<serde_json::Value>> + Send + 'static,
    {
        self.manifest
            .action_handlers
            .push(HandlerRecord::action(name, priority, func));
        self
    }

    /// Registers an action handler behind a condition gate.
    pub fn on_action_gated<F, Fut>(
        mut self,
        name: &str,
        priority: i32,
        gate: ConditionGate,
        func: F,
    ) -> Self
    where
        F: Fn(EventPayload) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = AppResult<serde_json::Value>> + Send + 'static,
    {
        self.manifest
            .action_handlers
            .push(HandlerRecord::action(name, priority, func).with_gate(gate));
        self
    }

    /// Adopts a router.
    pub fn router(mut self, router: PluginRouter) -> Self {
        self.manifest.router = Some(router);
        self
    }

    /// Sets the registration hook.
    pub fn on_register<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Registrar) -> AppResult<()> + Send + Sync + 'static,
    {
        self.manifest.register = Some(Arc::new(hook));
        self
    }

    /// Sets the teardown hook.
    pub fn on_unregister<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Registrar) -> AppResult<()> + Send + Sync + 'static,
    {
        self.manifest.unregister = Some(Arc::new(hook));
        self
    }

    /// Builds the final manifest.
    pub fn build(self) -> PluginManifest {
        self.manifest
    }
}
