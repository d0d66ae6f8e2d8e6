//! # wirehub-plugin-sdk
//!
//! SDK for developing plugins for Wirehub.
//!
//! A plugin exposes one factory returning a [`PluginManifest`]. Compiled-in
//! plugins hand the factory to [`PluginDescriptor::from_factory`]; dynamic
//! plugins export it with [`wirehub_plugin_entry!`].
//!
//! ## Quick Start
//!
//! ```rust
//! use wirehub_plugin_sdk::prelude::*;
//!
//! fn manifest() -> AppResult<PluginManifest> {
//!     Ok(PluginManifest::builder()
//!         .description("Mail relay\nSends mail on behalf of other plugins.")
//!         .on_action("mail:send", 0, |payload| async move {
//!             let to = payload.get_string("to").unwrap_or("nobody").to_string();
//!             Ok(json!({ "sent": to }))
//!         })
//!         .on_event_gated(
//!             "git:push",
//!             10,
//!             ConditionGate::new().with_field("branch", json!("master")),
//!             |_payload| async move { Ok(json!(null)) },
//!         )
//!         .build())
//! }
//!
//! let descriptor = PluginDescriptor::from_factory("mail", manifest);
//! # let _ = descriptor;
//! ```
//!
//! [`PluginManifest`]: wirehub_plugin::PluginManifest
//! [`PluginDescriptor::from_factory`]: wirehub_plugin::PluginDescriptor::from_factory

pub mod macros;

/// Prelude for convenient imports.
pub mod prelude {
    pub use wirehub_core::{AppError, AppResult};
    pub use wirehub_plugin::engine::Registrar;
    pub use wirehub_plugin::gate::ConditionGate;
    pub use wirehub_plugin::handler::{HandlerKind, HandlerRecord};
    pub use wirehub_plugin::manifest::{PluginManifest, PluginManifestBuilder};
    pub use wirehub_plugin::payload::EventPayload;
    pub use wirehub_plugin::routes::{
        PluginRouter, RouteMethod, RouteRequest, RouteSpec, TokenRequirement,
    };
    pub use wirehub_plugin::PluginDescriptor;

    pub use serde_json::json;
}
