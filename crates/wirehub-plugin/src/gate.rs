//! Condition gates — per-handler dispatch constraints.
//!
//! A gate wraps exactly one handler and decides, per dispatch, whether the
//! handler runs. Two independently optional checks must both hold:
//!
//! 1. A predicate over a named subset of the payload fields. If a parameter
//!    the predicate needs is absent from the payload, the gate silently
//!    declines.
//! 2. An exact-equality map: every named field must be present in the
//!    payload and equal the expected value.
//!
//! A predicate error also declines the handler (logged at `warn`); gates
//! never abort a dispatch.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use wirehub_core::AppResult;

use crate::payload::EventPayload;

/// Fallible predicate over the payload fields named by the gate.
pub type PredicateFn = Arc<dyn Fn(&[serde_json::Value]) -> AppResult<bool> + Send + Sync>;

/// Constraints deciding whether a gated handler runs for a given payload.
#[derive(Clone, Default)]
pub struct ConditionGate {
    /// Parameter names the predicate consumes, plus the predicate itself.
    predicate: Option<(Vec<String>, PredicateFn)>,
    /// Exact-equality constraints on named payload fields.
    expect: BTreeMap<String, serde_json::Value>,
}

impl ConditionGate {
    /// Creates a gate with no constraints (always passes).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the predicate and the payload field names it consumes.
    ///
    /// The predicate receives the field values in the order of `params`.
    pub fn with_predicate<F>(mut self, params: &[&str], predicate: F) -> Self
    where
        F: Fn(&[serde_json::Value]) -> AppResult<bool> + Send + Sync + 'static,
    {
        self.predicate = Some((
            params.iter().map(|p| p.to_string()).collect(),
            Arc::new(predicate),
        ));
        self
    }

    /// Requires a named payload field to equal the given value exactly.
    pub fn with_field(mut self, key: &str, value: serde_json::Value) -> Self {
        self.expect.insert(key.to_string(), value);
        self
    }

    /// Returns whether the gate lets the handler run for this payload.
    pub fn check(&self, handler: &str, payload: &EventPayload) -> bool {
        if let Some((params, predicate)) = &self.predicate {
            let mut values = Vec::with_capacity(params.len());
            for param in params {
                match payload.get(param) {
                    Some(value) => values.push(value.clone()),
                    None => {
                        debug!(
                            handler = %handler,
                            param = %param,
                            "Gate declined: predicate parameter absent from payload"
                        );
                        return false;
                    }
                }
            }
            match predicate(&values) {
                Ok(true) => {}
                Ok(false) => {
                    debug!(handler = %handler, "Gate declined: predicate returned false");
                    return false;
                }
                Err(e) => {
                    warn!(
                        handler = %handler,
                        error = %e,
                        "Gate declined: predicate returned an error"
                    );
                    return false;
                }
            }
        }

        for (key, expected) in &self.expect {
            match payload.get(key) {
                Some(actual) if actual == expected => {}
                _ => {
                    debug!(
                        handler = %handler,
                        field = %key,
                        "Gate declined: field absent or not equal to expected value"
                    );
                    return false;
                }
            }
        }

        true
    }
}

impl std::fmt::Debug for ConditionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionGate")
            .field(
                "predicate",
                &self.predicate.as_ref().map(|(params, _)| params.clone()),
            )
            .field("expect", &self.expect)
            .finish()
    }
}
