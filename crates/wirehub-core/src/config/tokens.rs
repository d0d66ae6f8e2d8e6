//! Token authentication configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Token-based authentication configuration.
///
/// Tokens are organized as `{group: {label: secret}}`. The table is either
/// declared inline under `groups` or loaded once from the JSON file named
/// by `file`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokensConfig {
    /// Whether token checking is enforced at all. When disabled, every
    /// route accepts every request.
    #[serde(default)]
    pub enabled: bool,
    /// Name of the credential as a query parameter, header, or cookie.
    #[serde(default = "default_name")]
    pub name: String,
    /// Path to a JSON file holding the token table. Takes precedence over
    /// the inline `groups` table when set.
    #[serde(default)]
    pub file: Option<String>,
    /// Inline token table.
    #[serde(default)]
    pub groups: HashMap<String, HashMap<String, String>>,
}

impl Default for TokensConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: default_name(),
            file: None,
            groups: HashMap::new(),
        }
    }
}

fn default_name() -> String {
    "token".to_string()
}
