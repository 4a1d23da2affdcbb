//! Cog input assembly (v0.1)
//!
//! A [`CogInput`] is the mutable object handed to a step procedure.
//! The invocation protocol is fixed: build an empty input, run the
//! procedure with the input as a mutable parameter while capturing its
//! return value, [`coerce`](CogInput::coerce) that return value into
//! the input, then let the cog validate. A failed validation is a
//! workflow-authoring error, never retried.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};

/// Mutable input under construction. Cheap to clone; clones share the
/// same underlying fields so the scheduler and the procedure observe
/// one object.
#[derive(Debug, Clone, Default)]
pub struct CogInput {
    fields: Arc<Mutex<Map<String, Value>>>,
}

impl CogInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.lock().insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.fields.lock().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.lock().contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.lock().is_empty()
    }

    /// Best-effort population from the procedure's return value.
    ///
    /// Objects fill keys the procedure did not already set; any other
    /// non-null value lands in `primary_field` if that is still unset.
    /// Explicit `set` calls always win over the return value.
    pub fn coerce(&self, returned: Option<Value>, primary_field: &str) {
        let Some(value) = returned else { return };
        if value.is_null() {
            return;
        }

        let mut fields = self.fields.lock();
        match value {
            Value::Object(map) => {
                for (key, val) in map {
                    fields.entry(key).or_insert(val);
                }
            }
            other => {
                fields
                    .entry(primary_field.to_string())
                    .or_insert(other);
            }
        }
    }

    /// Snapshot as a JSON object, for typed deserialization by cogs.
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.lock().clone())
    }
}
