//! Payload passed to event and action handlers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload carried by a fired event or requested action.
///
/// A payload holds positional arguments plus named fields, both as JSON
/// values. Named fields are what condition gates inspect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPayload {
    /// Positional arguments, in the order they were supplied.
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    /// Named arguments keyed by string.
    #[serde(default)]
    pub fields: HashMap<String, serde_json::Value>,
    /// Timestamp of the dispatch.
    #[serde(default = "Utc::now")]
    pub fired_at: DateTime<Utc>,
}

impl EventPayload {
    /// Creates an empty payload.
    pub fn new() -> Self {
        Self {
            args: Vec::new(),
            fields: HashMap::new(),
            fired_at: Utc::now(),
        }
    }

    /// Appends a positional argument.
    pub fn with_arg(mut self, value: serde_json::Value) -> Self {
        self.args.push(value);
        self
    }

    /// Inserts a named field.
    pub fn with_field(mut self, key: &str, value: serde_json::Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    /// Inserts a string field.
    pub fn with_string(self, key: &str, value: &str) -> Self {
        self.with_field(key, serde_json::json!(value))
    }

    /// Inserts an integer field.
    pub fn with_int(self, key: &str, value: i64) -> Self {
        self.with_field(key, serde_json::json!(value))
    }

    /// Inserts a boolean field.
    pub fn with_bool(self, key: &str, value: bool) -> Self {
        self.with_field(key, serde_json::json!(value))
    }

    /// Gets a positional argument by index.
    pub fn arg(&self, index: usize) -> Option<&serde_json::Value> {
        self.args.get(index)
    }

    /// Gets a named field by key.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }

    /// Gets a string field.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_str())
    }

    /// Gets an i64 field.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.fields.get(key).and_then(|v| v.as_i64())
    }

    /// Gets a bool field.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.fields.get(key).and_then(|v| v.as_bool())
    }
}

impl Default for EventPayload {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_and_accessors() {
        let payload = EventPayload::new()
            .with_arg(json!({"ref": "refs/heads/master"}))
            .with_string("repo", "wirehub")
            .with_int("attempt", 2)
            .with_bool("forced", false);

        assert_eq!(payload.arg(0).unwrap()["ref"], "refs/heads/master");
        assert_eq!(payload.get_string("repo"), Some("wirehub"));
        assert_eq!(payload.get_i64("attempt"), Some(2));
        assert_eq!(payload.get_bool("forced"), Some(false));
        assert!(payload.get("missing").is_none());
    }

    #[test]
    fn deserializes_without_timestamp() {
        let payload: EventPayload =
            serde_json::from_str(r#"{"args": [1], "fields": {"k": "v"}}"#).unwrap();
        assert_eq!(payload.arg(0), Some(&json!(1)));
        assert_eq!(payload.get_string("k"), Some("v"));
    }
}
