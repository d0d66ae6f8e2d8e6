//! # wirehub-plugin
//!
//! Plugin framework for Wirehub. Provides:
//!
//! - Filesystem plugin discovery with derived dotted names and glob
//!   whitelist/blacklist filtering
//! - Explicit plugin manifests (handler records, router, lifecycle hooks)
//! - The dispatch engine with priority-ordered event and action buses
//! - Condition gates for per-handler dispatch constraints
//! - The router contract plugins use to contribute HTTP routes
//! - Optional dynamic loading via `libloading` (feature `dynamic`)

pub mod descriptor;
pub mod discovery;
pub mod engine;
pub mod gate;
pub mod handler;
pub mod manifest;
pub mod payload;
pub mod routes;

pub use descriptor::{PluginDescriptor, PluginSource};
pub use discovery::{PluginLoader, should_ignore};
pub use engine::{DispatchEngine, DocTag, PluginQuery, PluginSummary, Registrar};
pub use gate::ConditionGate;
pub use handler::{HandlerKind, HandlerRecord};
pub use manifest::{ManifestFactory, PluginManifest, PluginManifestBuilder};
pub use payload::EventPayload;
pub use routes::{
    PluginRouter, RouteGuard, RouteMethod, RouteRequest, RouteSpec, RouteTable, TokenRequirement,
};
