//! Event-type dispatch and player-context loading.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use churn_core::{PlayerContext, Signal, Timestamp};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::SignalError;
use crate::repository::StateStore;

/// A typed event as delivered by the event source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    pub event_type: String,
    #[serde(default)]
    pub payload: Value,
}

impl RawEvent {
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }
}

/// Dependencies handed to an [`EventHandler`] for one event.
pub struct HandlerEnv<'a> {
    pub store: &'a dyn StateStore,
    /// Namespace used when the event does not carry one.
    pub namespace: &'a str,
    pub cancel: &'a CancellationToken,
}

impl HandlerEnv<'_> {
    /// Load the player's state and derive the shared context.
    ///
    /// A store failure is fatal for the event and is not retried here.
    pub async fn load_context(
        &self,
        user_id: &str,
        namespace: Option<&str>,
        clan_id: Option<String>,
        now: Timestamp,
    ) -> Result<Arc<PlayerContext>, SignalError> {
        let state = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(SignalError::Cancelled),
            loaded = self.store.load(user_id) => loaded.map_err(|source| SignalError::StateLoad {
                user_id: user_id.to_string(),
                source,
            })?,
        };

        let namespace = namespace.filter(|ns| !ns.is_empty()).unwrap_or(self.namespace);
        Ok(Arc::new(PlayerContext::new(
            user_id, namespace, clan_id, state, now,
        )))
    }
}

/// Converts the payload of one event type into a [`Signal`].
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Event type this handler is registered under.
    fn event_type(&self) -> &str;

    async fn handle(&self, payload: &Value, env: &HandlerEnv<'_>) -> Result<Signal, SignalError>;
}

/// Deserialize a handler payload, mapping shape errors to [`SignalError::InvalidPayload`].
pub(crate) fn parse_payload<T: DeserializeOwned>(
    event_type: &str,
    payload: &Value,
) -> Result<T, SignalError> {
    serde_json::from_value(payload.clone()).map_err(|e| SignalError::InvalidPayload {
        event_type: event_type.to_string(),
        message: e.to_string(),
    })
}

/// Reject absent or blank player ids.
pub(crate) fn require_user_id(user_id: Option<String>) -> Result<String, SignalError> {
    match user_id.map(|id| id.trim().to_string()) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(SignalError::MissingUserId),
    }
}

/// Dispatches raw events to their registered handlers.
pub struct SignalProcessor {
    handlers: HashMap<String, Arc<dyn EventHandler>>,
    store: Arc<dyn StateStore>,
    namespace: String,
}

impl SignalProcessor {
    pub fn new(store: Arc<dyn StateStore>, namespace: impl Into<String>) -> Self {
        Self {
            handlers: HashMap::new(),
            store,
            namespace: namespace.into(),
        }
    }

    /// Register a handler under its event type, replacing any previous one.
    pub fn register(&mut self, handler: Arc<dyn EventHandler>) -> Option<Arc<dyn EventHandler>> {
        self.handlers
            .insert(handler.event_type().to_string(), handler)
    }

    pub fn has_handler(&self, event_type: &str) -> bool {
        self.handlers.contains_key(event_type)
    }

    pub fn event_types(&self) -> impl Iterator<Item = &str> + '_ {
        self.handlers.keys().map(String::as_str)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Build a signal for `event`.
    ///
    /// # Errors
    ///
    /// - [`SignalError::UnknownEventType`] if no handler is registered
    /// - [`SignalError::MissingUserId`] / [`SignalError::InvalidPayload`] for bad input
    /// - [`SignalError::StateLoad`] if the player's state cannot be loaded
    pub async fn process(
        &self,
        event: &RawEvent,
        cancel: &CancellationToken,
    ) -> Result<Signal, SignalError> {
        let handler = self
            .handlers
            .get(&event.event_type)
            .ok_or_else(|| SignalError::UnknownEventType(event.event_type.clone()))?;

        let env = HandlerEnv {
            store: self.store.as_ref(),
            namespace: &self.namespace,
            cancel,
        };
        let signal = handler.handle(&event.payload, &env).await?;

        debug!(
            target: "pipeline::signals",
            event_type = %event.event_type,
            user_id = signal.user_id(),
            kind = %signal.kind(),
            "signal built"
        );
        Ok(signal)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::repository::InMemoryStateStore;

    #[tokio::test]
    async fn unknown_event_type_is_rejected() {
        let processor = SignalProcessor::new(Arc::new(InMemoryStateStore::new()), "ns");
        let err = processor
            .process(
                &RawEvent::new("teleport", json!({"userId": "u1"})),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SignalError::UnknownEventType(t) if t == "teleport"));
    }

    #[test]
    fn blank_user_ids_are_missing() {
        assert!(matches!(
            require_user_id(Some("  ".into())),
            Err(SignalError::MissingUserId)
        ));
        assert!(matches!(require_user_id(None), Err(SignalError::MissingUserId)));
        assert_eq!(require_user_id(Some(" u1 ".into())).unwrap(), "u1");
    }

    #[test]
    fn raw_event_parses_camel_case() {
        let event: RawEvent =
            serde_json::from_str(r#"{"eventType":"login","payload":{"userId":"u1"}}"#).unwrap();
        assert_eq!(event.event_type, "login");
        assert_eq!(event.payload["userId"], "u1");
    }
}
