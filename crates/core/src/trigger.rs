//! A rule's decision to act.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::Timestamp;
use crate::signal::{Metadata, Signal};

/// Ephemeral value produced by a rule and consumed by the action executor.
///
/// Higher `priority` executes first. Metadata is an open map at this boundary;
/// built-in rules write it from their own typed detail structs through
/// [`Trigger::with_details`] and actions read it back with [`Trigger::details`].
#[derive(Clone, Debug, PartialEq)]
pub struct Trigger {
    pub rule_id: String,
    pub user_id: String,
    pub timestamp: Timestamp,
    pub reason: String,
    pub metadata: Metadata,
    pub priority: i32,
}

impl Trigger {
    /// Create a trigger for `signal`, stamped with the signal's timestamp.
    pub fn new(rule_id: impl Into<String>, signal: &Signal, reason: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            user_id: signal.user_id().to_string(),
            timestamp: signal.timestamp(),
            reason: reason.into(),
            metadata: Metadata::new(),
            priority: 0,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Merge the fields of a typed detail struct into the metadata map.
    ///
    /// Values that do not serialize to a JSON object are ignored.
    pub fn with_details<T: Serialize>(mut self, details: &T) -> Self {
        if let Ok(Value::Object(fields)) = serde_json::to_value(details) {
            self.metadata.extend(fields);
        }
        self
    }

    /// Read the metadata map back into a typed detail struct.
    pub fn details<T: DeserializeOwned>(&self) -> Option<T> {
        let object = self
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::from_value(Value::Object(object)).ok()
    }

    pub fn metadata_i64(&self, key: &str) -> Option<i64> {
        self.metadata.get(key).and_then(Value::as_i64)
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}
