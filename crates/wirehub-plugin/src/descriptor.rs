//! Plugin descriptors — one discoverable unit and its loaded state.

use std::path::PathBuf;

use tracing::{debug, warn};

use wirehub_core::{AppError, AppResult};

use crate::handler::{HandlerKind, HandlerRecord};
use crate::manifest::{LifecycleHook, ManifestFactory, PluginManifest};
use crate::routes::PluginRouter;

/// Where a plugin's manifest comes from.
#[derive(Clone)]
pub enum PluginSource {
    /// A compiled-in factory, linked into the host binary.
    Static(ManifestFactory),
    /// A shared library on disk, loaded via `libloading` (feature `dynamic`).
    Dynamic(PathBuf),
}

impl std::fmt::Debug for PluginSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(_) => f.write_str("Static(<factory>)"),
            Self::Dynamic(path) => f.debug_tuple("Dynamic").field(path).finish(),
        }
    }
}

/// One discoverable plugin: derived name, source, and, once loaded, the
/// handlers, router, and lifecycle hooks its manifest declared.
///
/// A descriptor is observably either fully loaded or fully unloaded.
/// Re-calling [`load`](Self::load) re-invokes the factory and replaces every
/// collected record; loading is not idempotent.
pub struct PluginDescriptor {
    name: String,
    source: PluginSource,
    search_paths: Vec<PathBuf>,
    short_description: Option<String>,
    long_description: Option<String>,
    loaded: bool,
    event_handlers: Vec<HandlerRecord>,
    action_handlers: Vec<HandlerRecord>,
    router: Option<PluginRouter>,
    register: Option<LifecycleHook>,
    unregister: Option<LifecycleHook>,
    /// Owned library handle; held exclusively while loaded.
    #[cfg(feature = "dynamic")]
    library: Option<libloading::Library>,
}

impl PluginDescriptor {
    /// Creates an unloaded descriptor over a compiled-in factory.
    pub fn from_factory<F>(name: &str, factory: F) -> Self
    where
        F: Fn() -> AppResult<PluginManifest> + Send + Sync + 'static,
    {
        Self::new(name, PluginSource::Static(std::sync::Arc::new(factory)))
    }

    /// Creates an unloaded descriptor over a discovered library path.
    pub fn discovered(name: &str, path: PathBuf, search_paths: Vec<PathBuf>) -> Self {
        let mut descriptor = Self::new(name, PluginSource::Dynamic(path));
        descriptor.search_paths = search_paths;
        descriptor
    }

    fn new(name: &str, source: PluginSource) -> Self {
        Self {
            name: name.to_string(),
            source,
            search_paths: Vec::new(),
            short_description: None,
            long_description: None,
            loaded: false,
            event_handlers: Vec::new(),
            action_handlers: Vec::new(),
            router: None,
            register: None,
            unregister: None,
            #[cfg(feature = "dynamic")]
            library: None,
        }
    }

    /// Supplies explicit descriptions, overriding manifest-derived ones.
    pub fn with_descriptions(mut self, short: Option<&str>, long: Option<&str>) -> Self {
        self.short_description = short.map(str::to_string);
        self.long_description = long.map(str::to_string);
        self
    }

    /// Loads the plugin: invokes the factory and collects the manifest.
    ///
    /// On failure the error is wrapped with the plugin's name and surfaced,
    /// unless `fail_silently` is set, in which case `Ok(false)` is returned
    /// and the descriptor stays unloaded.
    pub fn load(&mut self, fail_silently: bool) -> AppResult<bool> {
        let manifest = match self.produce_manifest() {
            Ok(m) => m,
            Err(e) => {
                if fail_silently {
                    warn!(plugin = %self.name, error = %e, "Plugin failed to load, skipping");
                    return Ok(false);
                }
                return Err(AppError::with_source(
                    wirehub_core::error::ErrorKind::Plugin,
                    format!("error loading plugin '{}': {}", self.name, e),
                    e,
                ));
            }
        };

        self.adopt(manifest);
        self.loaded = true;

        debug!(
            plugin = %self.name,
            events = self.event_handlers.len(),
            actions = self.action_handlers.len(),
            has_router = self.router.is_some(),
            "Plugin loaded"
        );

        Ok(true)
    }

    fn produce_manifest(&mut self) -> AppResult<PluginManifest> {
        match &self.source {
            PluginSource::Static(factory) => factory(),
            PluginSource::Dynamic(path) => self.load_dynamic(path.clone()),
        }
    }

    /// Collects the manifest's records, replacing any previous load.
    fn adopt(&mut self, manifest: PluginManifest) {
        self.event_handlers = manifest
            .event_handlers
            .into_iter()
            .map(|h| h.owned_by(&self.name))
            .collect();
        self.action_handlers = manifest
            .action_handlers
            .into_iter()
            .map(|h| h.owned_by(&self.name))
            .collect();

        self.router = manifest.router.map(|mut router| {
            if router.prefix.as_deref().is_none_or(str::is_empty) {
                router.prefix = Some(format!("/{}", self.name.replace('.', "/")));
            }
            router
        });

        self.register = manifest.register;
        self.unregister = manifest.unregister;

        // Derive descriptions from the manifest text unless they were
        // supplied at construction. Only the block before a form-feed
        // marker is considered.
        if let Some(text) = manifest.description {
            let block = text.split('\u{000C}').next().unwrap_or("").trim();
            if !block.is_empty() {
                if self.short_description.is_none() {
                    self.short_description =
                        block.lines().next().map(|line| line.trim().to_string());
                }
                if self.long_description.is_none() {
                    self.long_description = Some(block.to_string());
                }
            }
        }
    }

    #[cfg(feature = "dynamic")]
    fn load_dynamic(&mut self, path: PathBuf) -> AppResult<PluginManifest> {
        use crate::manifest::{PLUGIN_ENTRY_SYMBOL, PluginEntryFn};

        let resolved = self.resolve_library_path(path)?;

        // SAFETY: loading a plugin library executes arbitrary code. Only
        // trusted plugin directories should be configured.
        let library = unsafe {
            libloading::Library::new(&resolved).map_err(|e| {
                AppError::plugin(format!(
                    "failed to load plugin library '{}': {}",
                    resolved.display(),
                    e
                ))
            })?
        };

        let manifest = unsafe {
            let entry: libloading::Symbol<PluginEntryFn> =
                library.get(PLUGIN_ENTRY_SYMBOL).map_err(|e| {
                    AppError::plugin(format!(
                        "plugin library '{}' missing entry symbol: {}",
                        resolved.display(),
                        e
                    ))
                })?;

            let raw = entry();
            if raw.is_null() {
                return Err(AppError::plugin(format!(
                    "plugin library '{}' entry returned null",
                    resolved.display()
                )));
            }
            *Box::from_raw(raw)
        };

        self.library = Some(library);
        Ok(manifest)
    }

    #[cfg(feature = "dynamic")]
    fn resolve_library_path(&self, path: PathBuf) -> AppResult<PathBuf> {
        if path.exists() {
            return Ok(path);
        }
        if let Some(file_name) = path.file_name() {
            for search in &self.search_paths {
                let candidate = search.join(file_name);
                if candidate.exists() {
                    return Ok(candidate);
                }
            }
        }
        Err(AppError::plugin(format!(
            "plugin library '{}' not found in any search path",
            path.display()
        )))
    }

    #[cfg(not(feature = "dynamic"))]
    fn load_dynamic(&mut self, path: PathBuf) -> AppResult<PluginManifest> {
        Err(AppError::plugin(format!(
            "cannot load '{}': dynamic plugin support not compiled in (enable the `dynamic` feature)",
            path.display()
        )))
    }

    /// Marks the descriptor unloaded and drops everything it collected.
    pub(crate) fn unload(&mut self) {
        self.event_handlers.clear();
        self.action_handlers.clear();
        self.router = None;
        self.register = None;
        self.unregister = None;
        self.loaded = false;
        #[cfg(feature = "dynamic")]
        {
            self.library = None;
        }
    }

    /// The plugin's derived dotted name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the plugin has been loaded.
    pub fn loaded(&self) -> bool {
        self.loaded
    }

    /// Short description, supplied or derived.
    pub fn short_description(&self) -> Option<&str> {
        self.short_description.as_deref()
    }

    /// Long description, supplied or derived.
    pub fn long_description(&self) -> Option<&str> {
        self.long_description.as_deref()
    }

    /// Additional library search paths.
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Returns whether the plugin contributed a router.
    pub fn has_routes(&self) -> bool {
        self.router.is_some()
    }

    /// The plugin's router, if any.
    pub fn router(&self) -> Option<&PluginRouter> {
        self.router.as_ref()
    }

    /// Returns whether the plugin declared a register hook.
    pub fn has_register_hook(&self) -> bool {
        self.register.is_some()
    }

    /// Returns whether the plugin declared an unregister hook.
    pub fn has_unregister_hook(&self) -> bool {
        self.unregister.is_some()
    }

    /// The register hook, if any.
    pub(crate) fn register_hook(&self) -> Option<LifecycleHook> {
        self.register.clone()
    }

    /// The unregister hook, if any.
    pub(crate) fn unregister_hook(&self) -> Option<LifecycleHook> {
        self.unregister.clone()
    }

    /// Appends imperatively subscribed handlers (from the register hook).
    pub(crate) fn extend_handlers(&mut self, records: Vec<HandlerRecord>) {
        for record in records {
            let record = record.owned_by(&self.name);
            match record.kind {
                HandlerKind::Event => self.event_handlers.push(record),
                HandlerKind::Action => self.action_handlers.push(record),
            }
        }
    }

    /// Event handlers, optionally filtered by a glob-matched name.
    pub fn event_handlers(&self, name: Option<&str>) -> Vec<&HandlerRecord> {
        match name {
            None => self.event_handlers.iter().collect(),
            Some(n) => self.event_handlers.iter().filter(|h| h.matches(n)).collect(),
        }
    }

    /// Action handlers, optionally filtered by a glob-matched name.
    pub fn action_handlers(&self, name: Option<&str>) -> Vec<&HandlerRecord> {
        match name {
            None => self.action_handlers.iter().collect(),
            Some(n) => self
                .action_handlers
                .iter()
                .filter(|h| h.matches(n))
                .collect(),
        }
    }

    /// Attribute lookup for engine queries.
    pub fn attr(&self, name: &str) -> Option<serde_json::Value> {
        match name {
            "name" => Some(serde_json::json!(self.name)),
            "loaded" => Some(serde_json::json!(self.loaded)),
            "short_description" => Some(serde_json::json!(self.short_description)),
            "long_description" => Some(serde_json::json!(self.long_description)),
            "has_routes" => Some(serde_json::json!(self.has_routes())),
            _ => None,
        }
    }
}

impl std::fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("loaded", &self.loaded)
            .field("event_handlers", &self.event_handlers.len())
            .field("action_handlers", &self.action_handlers.len())
            .field("has_router", &self.router.is_some())
            .finish()
    }
}
