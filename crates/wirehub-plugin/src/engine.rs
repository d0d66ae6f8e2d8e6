//! Dispatch engine — plugin lifecycle and the event/action buses.
//!
//! The engine owns the set of loaded plugins, the merged route table, and
//! the documentation tags. Loads and unloads funnel through the single
//! write side of one `RwLock`; dispatch takes a read-locked snapshot of the
//! matching handlers before invoking them, so a concurrent unload can never
//! tear an in-flight dispatch.
//!
//! Handlers run sequentially in ascending priority order (lower priority
//! value = earlier), ties broken by insertion order. A handler error or
//! timeout aborts the remaining handlers of that dispatch and propagates to
//! the caller; the engine never isolates handlers from each other.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use wirehub_core::config::plugins::PluginsConfig;
use wirehub_core::{AppError, AppResult};

use crate::descriptor::PluginDescriptor;
use crate::discovery::{PluginLoader, should_ignore};
use crate::gate::ConditionGate;
use crate::handler::{HandlerKind, HandlerRecord};
use crate::payload::EventPayload;
use crate::routes::{RouteGuard, RouteMethod, RouteRequest, RouteSpec, RouteTable, TokenRequirement};

/// Documentation tag mirroring a loaded plugin's description.
#[derive(Debug, Clone, Serialize)]
pub struct DocTag {
    /// Plugin name.
    pub name: String,
    /// Plugin description.
    pub description: String,
}

/// Snapshot of a plugin's state, returned by engine queries.
#[derive(Debug, Clone, Serialize)]
pub struct PluginSummary {
    /// Derived dotted name.
    pub name: String,
    /// Whether the plugin is loaded.
    pub loaded: bool,
    /// Short description.
    pub short_description: Option<String>,
    /// Long description.
    pub long_description: Option<String>,
    /// Number of event handlers.
    pub event_handlers: usize,
    /// Number of action handlers.
    pub action_handlers: usize,
    /// Whether the plugin contributed routes.
    pub has_routes: bool,
}

impl From<&PluginDescriptor> for PluginSummary {
    fn from(descriptor: &PluginDescriptor) -> Self {
        Self {
            name: descriptor.name().to_string(),
            loaded: descriptor.loaded(),
            short_description: descriptor.short_description().map(str::to_string),
            long_description: descriptor.long_description().map(str::to_string),
            event_handlers: descriptor.event_handlers(None).len(),
            action_handlers: descriptor.action_handlers(None).len(),
            has_routes: descriptor.has_routes(),
        }
    }
}

/// Ad-hoc plugin query: attribute equality and/or a predicate, combined
/// with AND (`match_all`) or OR.
#[derive(Clone, Default)]
pub struct PluginQuery {
    attrs: HashMap<String, serde_json::Value>,
    predicate: Option<Arc<dyn Fn(&PluginDescriptor) -> bool + Send + Sync>>,
    match_all: bool,
}

impl PluginQuery {
    /// Creates an empty query matching every plugin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires a descriptor attribute to equal the given value.
    pub fn attr(mut self, name: &str, value: serde_json::Value) -> Self {
        self.attrs.insert(name.to_string(), value);
        self
    }

    /// Adds a boolean predicate over the descriptor.
    pub fn predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&PluginDescriptor) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Requires every criterion to hold instead of any.
    pub fn match_all(mut self, match_all: bool) -> Self {
        self.match_all = match_all;
        self
    }

    fn matches(&self, descriptor: &PluginDescriptor) -> bool {
        let mut results = Vec::new();

        for (name, expected) in &self.attrs {
            results.push(descriptor.attr(name).as_ref() == Some(expected));
        }
        if let Some(predicate) = &self.predicate {
            results.push(predicate(descriptor));
        }

        if results.is_empty() {
            return true;
        }
        if self.match_all {
            results.iter().all(|r| *r)
        } else {
            results.iter().any(|r| *r)
        }
    }
}

impl std::fmt::Debug for PluginQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginQuery")
            .field("attrs", &self.attrs)
            .field("has_predicate", &self.predicate.is_some())
            .field("match_all", &self.match_all)
            .finish()
    }
}

/// Registration surface handed to a plugin's lifecycle hooks.
///
/// Everything subscribed or added through the registrar is attributed to
/// the plugin and removed when the plugin is unloaded.
pub struct Registrar {
    plugin: String,
    handlers: Vec<HandlerRecord>,
    routes: Vec<RouteSpec>,
}

impl Registrar {
    fn new(plugin: &str) -> Self {
        Self {
            plugin: plugin.to_string(),
            handlers: Vec::new(),
            routes: Vec::new(),
        }
    }

    /// Name of the plugin this registrar is scoped to.
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Subscribes an event handler imperatively.
    pub fn subscribe_event<F, Fut>(&mut self, name: &str, priority: i32, func: F)
    where
        F: Fn(EventPayload) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = AppResult<serde_json::Value>> + Send + 'static,
    {
        self.handlers.push(HandlerRecord::event(name, priority, func));
    }

    /// Subscribes a gated event handler imperatively.
    pub fn subscribe_event_gated<F, Fut>(
        &mut self,
        name: &str,
        priority: i32,
        gate: ConditionGate,
        func: F,
    ) where
        F: Fn(EventPayload) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = AppResult<serde_json::Value>> + Send + 'static,
    {
        self.handlers
            .push(HandlerRecord::event(name, priority, func).with_gate(gate));
    }

    /// Registers an action handler imperatively.
    pub fn subscribe_action<F, Fut>(&mut self, name: &str, priority: i32, func: F)
    where
        F: Fn(EventPayload) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = AppResult<serde_json::Value>> + Send + 'static,
    {
        self.handlers.push(HandlerRecord::action(name, priority, func));
    }

    /// Adds a route imperatively, mounted under the plugin's prefix.
    pub fn add_route(&mut self, spec: RouteSpec) {
        self.routes.push(spec);
    }
}

impl std::fmt::Debug for Registrar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registrar")
            .field("plugin", &self.plugin)
            .field("handlers", &self.handlers.len())
            .field("routes", &self.routes.len())
            .finish()
    }
}

/// Registries guarded by the engine's lock.
#[derive(Debug, Default)]
struct EngineState {
    /// Loaded plugins, in load order.
    plugins: Vec<PluginDescriptor>,
    /// Merged plugin routes.
    routes: RouteTable,
    /// Documentation tags, one per plugin with routes.
    doc_tags: Vec<DocTag>,
}

/// The dispatch engine.
#[derive(Debug)]
pub struct DispatchEngine {
    state: RwLock<EngineState>,
    whitelist: Vec<String>,
    blacklist: Vec<String>,
    handler_timeout: Duration,
}

impl DispatchEngine {
    /// Creates an engine with no filters and the default handler timeout.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(EngineState::default()),
            whitelist: Vec::new(),
            blacklist: Vec::new(),
            handler_timeout: Duration::from_secs(30),
        }
    }

    /// Creates an engine from the plugin configuration section.
    pub fn from_config(config: &PluginsConfig) -> Self {
        Self {
            state: RwLock::new(EngineState::default()),
            whitelist: config.whitelist.clone(),
            blacklist: config.blacklist.clone(),
            handler_timeout: Duration::from_secs(config.handler_timeout_seconds),
        }
    }

    /// Sets the whitelist patterns.
    pub fn with_whitelist(mut self, patterns: Vec<String>) -> Self {
        self.whitelist = patterns;
        self
    }

    /// Sets the blacklist patterns.
    pub fn with_blacklist(mut self, patterns: Vec<String>) -> Self {
        self.blacklist = patterns;
        self
    }

    /// Sets the per-handler dispatch deadline.
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// Discovers and loads plugins, returning the loaded names in order.
    ///
    /// Per-plugin failures propagate, or are logged and skipped when
    /// `fail_silently` is set.
    pub async fn load_plugins(
        &self,
        loader: &PluginLoader,
        fail_silently: bool,
    ) -> AppResult<Vec<String>> {
        let mut loaded = Vec::new();

        for descriptor in loader.discover() {
            let name = descriptor.name().to_string();
            match self.load_plugin(descriptor).await {
                Ok(true) => loaded.push(name),
                Ok(false) => {}
                Err(e) => {
                    if fail_silently {
                        error!(plugin = %name, error = %e, "Failed to load plugin");
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Ok(loaded)
    }

    /// Loads a single plugin into the engine.
    ///
    /// Returns `Ok(false)` when the plugin is excluded by the engine's
    /// whitelist/blacklist; `Ok(true)` once the plugin is fully registered.
    pub async fn load_plugin(&self, mut descriptor: PluginDescriptor) -> AppResult<bool> {
        let name = descriptor.name().to_string();

        if should_ignore(&name, &self.whitelist, &self.blacklist) {
            debug!(plugin = %name, "Plugin excluded by whitelist/blacklist");
            return Ok(false);
        }

        let mut state = self.state.write().await;

        if state.plugins.iter().any(|p| p.name() == name) {
            return Err(AppError::conflict(format!(
                "plugin '{name}' is already registered"
            )));
        }

        if !descriptor.loaded() {
            descriptor.load(false)?;
        }

        // Run the register hook; its additions are attributed to the plugin.
        let mut hook_routes = Vec::new();
        if let Some(hook) = descriptor.register_hook() {
            let mut registrar = Registrar::new(&name);
            hook(&mut registrar).map_err(|e| {
                AppError::with_source(
                    wirehub_core::error::ErrorKind::Plugin,
                    format!("register hook of plugin '{name}' failed: {e}"),
                    e,
                )
            })?;
            let Registrar {
                handlers, routes, ..
            } = registrar;
            descriptor.extend_handlers(handlers);
            hook_routes = routes;
        }

        // Merge contributed routes under the resolved prefix and mirror the
        // plugin into the documentation tags.
        let prefix = descriptor
            .router()
            .and_then(|r| r.prefix.clone())
            .unwrap_or_else(|| format!("/{}", name.replace('.', "/")));

        let mut specs: Vec<RouteSpec> = descriptor
            .router()
            .map(|r| r.routes.clone())
            .unwrap_or_default();
        specs.extend(hook_routes);

        if !specs.is_empty() {
            let route_count = specs.len();
            state.routes.register(&name, &prefix, specs);
            state.doc_tags.push(DocTag {
                name: name.clone(),
                description: descriptor
                    .long_description()
                    .or(descriptor.short_description())
                    .unwrap_or_default()
                    .to_string(),
            });
            debug!(plugin = %name, routes = route_count, prefix = %prefix, "Routes mounted");
        }

        info!(
            plugin = %name,
            events = descriptor.event_handlers(None).len(),
            actions = descriptor.action_handlers(None).len(),
            "Plugin registered"
        );

        state.plugins.push(descriptor);
        Ok(true)
    }

    /// Unloads a plugin by name.
    ///
    /// Removes every route and handler the plugin contributed and nothing
    /// belonging to any other plugin. Unloading an unknown name fails with
    /// a not-found error.
    pub async fn unload_plugin(&self, name: &str) -> AppResult<()> {
        let mut state = self.state.write().await;

        let index = state
            .plugins
            .iter()
            .position(|p| p.name() == name)
            .ok_or_else(|| AppError::not_found(format!("plugin '{name}' not found")))?;

        if !state.plugins[index].loaded() {
            return Ok(());
        }

        state.routes.unregister(name);
        state.doc_tags.retain(|tag| tag.name != name);

        if let Some(hook) = state.plugins[index].unregister_hook() {
            let mut registrar = Registrar::new(name);
            if let Err(e) = hook(&mut registrar) {
                warn!(plugin = %name, error = %e, "Unregister hook returned error");
            }
        }

        let mut descriptor = state.plugins.remove(index);
        descriptor.unload();

        info!(plugin = %name, "Plugin unloaded");
        Ok(())
    }

    /// Unloads every plugin matching the query, returning their names.
    pub async fn unload_plugins(&self, query: &PluginQuery) -> AppResult<Vec<String>> {
        let names: Vec<String> = {
            let state = self.state.read().await;
            state
                .plugins
                .iter()
                .filter(|p| query.matches(p))
                .map(|p| p.name().to_string())
                .collect()
        };

        for name in &names {
            self.unload_plugin(name).await?;
        }
        Ok(names)
    }

    /// Unloads every plugin.
    pub async fn unload_all(&self) -> AppResult<Vec<String>> {
        self.unload_plugins(&PluginQuery::new()).await
    }

    /// Returns a plugin's summary by name.
    pub async fn get_plugin(&self, name: &str) -> Option<PluginSummary> {
        let state = self.state.read().await;
        state
            .plugins
            .iter()
            .find(|p| p.name() == name)
            .map(PluginSummary::from)
    }

    /// Summaries of all loaded plugins, in load order.
    pub async fn plugins(&self) -> Vec<PluginSummary> {
        let state = self.state.read().await;
        state.plugins.iter().map(PluginSummary::from).collect()
    }

    /// Summaries of plugins matching the query.
    pub async fn get_plugins(&self, query: &PluginQuery) -> Vec<PluginSummary> {
        let state = self.state.read().await;
        state
            .plugins
            .iter()
            .filter(|p| query.matches(p))
            .map(PluginSummary::from)
            .collect()
    }

    /// Documentation tags of loaded plugins with routes.
    pub async fn doc_tags(&self) -> Vec<DocTag> {
        let state = self.state.read().await;
        state.doc_tags.clone()
    }

    /// Aggregated event handlers, optionally filtered by glob-matched name.
    pub async fn get_event_handlers(&self, name: Option<&str>) -> Vec<HandlerRecord> {
        self.collect_handlers(HandlerKind::Event, name).await
    }

    /// Aggregated action handlers, optionally filtered by glob-matched name.
    pub async fn get_action_handlers(&self, name: Option<&str>) -> Vec<HandlerRecord> {
        self.collect_handlers(HandlerKind::Action, name).await
    }

    async fn collect_handlers(&self, kind: HandlerKind, name: Option<&str>) -> Vec<HandlerRecord> {
        let state = self.state.read().await;
        state
            .plugins
            .iter()
            .filter(|p| p.loaded())
            .flat_map(|p| {
                let records = match kind {
                    HandlerKind::Event => p.event_handlers(name),
                    HandlerKind::Action => p.action_handlers(name),
                };
                records.into_iter().cloned().collect::<Vec<_>>()
            })
            .collect()
    }

    /// Fires an event: every matching handler runs in priority order.
    ///
    /// Returns the number of handlers that ran (gate declines excluded).
    pub async fn fire_event(&self, name: &str, payload: EventPayload) -> AppResult<usize> {
        debug!(event = %name, "Firing event");
        self.dispatch(HandlerKind::Event, name, payload).await
    }

    /// Requests an action: every matching handler runs in priority order.
    ///
    /// Returns the number of handlers that ran (gate declines excluded).
    pub async fn do_action(&self, name: &str, payload: EventPayload) -> AppResult<usize> {
        debug!(action = %name, "Running action");
        self.dispatch(HandlerKind::Action, name, payload).await
    }

    async fn dispatch(
        &self,
        kind: HandlerKind,
        name: &str,
        payload: EventPayload,
    ) -> AppResult<usize> {
        // Snapshot matching handlers under the read lock, then invoke with
        // the lock released so loads/unloads cannot tear this dispatch.
        let mut records = self.collect_handlers(kind, Some(name)).await;
        records.sort_by_key(|r| r.priority);

        if records.is_empty() {
            debug!(name = %name, "No handlers matched");
            return Ok(0);
        }

        let mut invoked = 0;
        for record in &records {
            if record
                .invoke(payload.clone(), self.handler_timeout)
                .await?
                .is_some()
            {
                invoked += 1;
            }
        }

        debug!(name = %name, matched = records.len(), invoked, "Dispatch complete");
        Ok(invoked)
    }

    /// Dispatches a request through the plugin route table.
    pub async fn handle_route(
        &self,
        method: RouteMethod,
        path: &str,
        mut request: RouteRequest,
    ) -> AppResult<serde_json::Value> {
        let (route, params) = {
            let state = self.state.read().await;
            match state.routes.match_route(method, path) {
                Some((route, params)) => (route.clone(), params),
                None => {
                    return Err(AppError::not_found(format!("no route for {method} {path}")));
                }
            }
        };

        request.params = params;
        route.handle(request).await
    }

    /// Splices an auth guard in front of every route declaring a token
    /// requirement. One-time wiring after all plugins load.
    pub async fn splice_auth<F>(&self, factory: F) -> usize
    where
        F: Fn(&TokenRequirement) -> Arc<dyn RouteGuard>,
    {
        let mut state = self.state.write().await;
        let spliced = state.routes.splice_guard(factory);
        info!(routes = spliced, "Auth verifier spliced into token routes");
        spliced
    }

    /// Number of routes currently mounted.
    pub async fn route_count(&self) -> usize {
        let state = self.state.read().await;
        state.routes.len()
    }
}

impl Default for DispatchEngine {
    fn default() -> Self {
        Self::new()
    }
}
