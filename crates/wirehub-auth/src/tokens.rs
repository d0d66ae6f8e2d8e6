//! Static token table.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use wirehub_core::{AppError, AppResult};
use wirehub_core::config::tokens::TokensConfig;

/// Static token table: `{group: {label: secret}}`.
///
/// Read-only after construction; there is no refresh path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenStore {
    groups: HashMap<String, HashMap<String, String>>,
}

impl TokenStore {
    /// Builds a store from an in-memory table.
    pub fn from_groups(groups: HashMap<String, HashMap<String, String>>) -> Self {
        Self { groups }
    }

    /// Loads the table once from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            AppError::configuration(format!(
                "failed to read token file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let groups = serde_json::from_str(&text).map_err(|e| {
            AppError::configuration(format!(
                "invalid token file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self { groups })
    }

    /// Builds a store from the tokens configuration section.
    ///
    /// A configured file takes precedence over the inline table.
    pub fn from_config(config: &TokensConfig) -> AppResult<Self> {
        match &config.file {
            Some(file) => Self::from_json_file(file),
            None => Ok(Self::from_groups(config.groups.clone())),
        }
    }

    /// Returns whether a secret is registered under one of the allowed
    /// groups. `None` accepts a secret from any group.
    pub fn is_valid(&self, secret: &str, groups: Option<&[String]>) -> bool {
        match groups {
            None => self
                .groups
                .values()
                .any(|tokens| tokens.values().any(|value| value == secret)),
            Some(allowed) => allowed.iter().any(|group| {
                self.groups
                    .get(group)
                    .is_some_and(|tokens| tokens.values().any(|value| value == secret))
            }),
        }
    }

    /// Names of all registered groups.
    pub fn group_names(&self) -> Vec<&str> {
        self.groups.keys().map(String::as_str).collect()
    }

    /// Total number of registered secrets.
    pub fn len(&self) -> usize {
        self.groups.values().map(HashMap::len).sum()
    }

    /// Returns whether the table holds no secrets.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> TokenStore {
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

    #[test]
    fn valid_in_named_group_only() {
        let store = store();
        let admin = ["admin".to_string()];
        let ops = ["ops".to_string()];

        assert!(store.is_valid("secretA", Some(&admin)));
        assert!(!store.is_valid("secretA", Some(&ops)));
        assert!(!store.is_valid("wrong", Some(&admin)));
    }

    #[test]
    fn none_group_accepts_any_group() {
        let store = store();
        assert!(store.is_valid("secretA", None));
        assert!(store.is_valid("secretB", None));
        assert!(!store.is_valid("wrong", None));
    }

    #[test]
    fn loads_from_json_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, r#"{"admin": {"alice": "secretA"}}"#).unwrap();

        let store = TokenStore::from_json_file(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.is_valid("secretA", Some(&["admin".to_string()])));
    }

    #[test]
    fn invalid_json_is_a_configuration_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, "not json").unwrap();

        let err = TokenStore::from_json_file(&path).unwrap_err();
        assert_eq!(err.kind, wirehub_core::error::ErrorKind::Configuration);
    }
}
