//! Plugin system configuration.

use serde::{Deserialize, Serialize};

/// Plugin discovery and dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Source locations (files or directories) scanned for plugins.
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,
    /// Whether subdirectories of a source are searched for plugins.
    #[serde(default = "default_true")]
    pub recursive: bool,
    /// Glob patterns a derived plugin name must match to be loaded.
    /// An empty whitelist admits every name not blacklisted.
    #[serde(default)]
    pub whitelist: Vec<String>,
    /// Glob patterns excluding plugins by derived name. Blacklist wins
    /// over whitelist.
    #[serde(default)]
    pub blacklist: Vec<String>,
    /// Additional directories used to resolve a plugin library when its
    /// primary path is missing.
    #[serde(default)]
    pub search_paths: Vec<String>,
    /// Whether a plugin that fails to load is skipped instead of aborting
    /// startup.
    #[serde(default)]
    pub fail_silently: bool,
    /// Source file extension of loadable plugins.
    #[serde(default = "default_extension")]
    pub extension: String,
    /// File name marking a directory as a plugin of its own.
    #[serde(default = "default_entry_point")]
    pub entry_point: String,
    /// Per-handler dispatch deadline in seconds.
    #[serde(default = "default_handler_timeout")]
    pub handler_timeout_seconds: u64,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            recursive: true,
            whitelist: Vec::new(),
            blacklist: Vec::new(),
            search_paths: Vec::new(),
            fail_silently: false,
            extension: default_extension(),
            entry_point: default_entry_point(),
            handler_timeout_seconds: default_handler_timeout(),
        }
    }
}

fn default_sources() -> Vec<String> {
    vec!["./plugins".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_extension() -> String {
    std::env::consts::DLL_EXTENSION.to_string()
}

fn default_entry_point() -> String {
    format!("plugin.{}", std::env::consts::DLL_EXTENSION)
}

fn default_handler_timeout() -> u64 {
    30
}
