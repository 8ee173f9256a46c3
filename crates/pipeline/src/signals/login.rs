//! Handler for session/login events.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use churn_core::{Signal, SignalPayload, Timestamp};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::processor::{parse_payload, require_user_id};
use super::{EventHandler, HandlerEnv, SignalError};
use crate::api::SessionTracker;

pub const LOGIN_EVENT: &str = "login";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginEvent {
    #[serde(default, alias = "user_id")]
    user_id: Option<String>,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default, alias = "clan_id")]
    clan_id: Option<String>,
    #[serde(default)]
    timestamp: Option<Timestamp>,
}

/// Builds [`SignalPayload::Login`] signals.
///
/// When a [`SessionTracker`] is configured the weekly login counter is bumped
/// as a side effect. That update is best-effort: a failure is logged and the
/// signal is still produced without the count.
#[derive(Default)]
pub struct LoginHandler {
    tracker: Option<Arc<dyn SessionTracker>>,
}

impl LoginHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tracker(tracker: Arc<dyn SessionTracker>) -> Self {
        Self {
            tracker: Some(tracker),
        }
    }
}

#[async_trait]
impl EventHandler for LoginHandler {
    fn event_type(&self) -> &str {
        LOGIN_EVENT
    }

    async fn handle(&self, payload: &Value, env: &HandlerEnv<'_>) -> Result<Signal, SignalError> {
        let event: LoginEvent = parse_payload(LOGIN_EVENT, payload)?;
        let user_id = require_user_id(event.user_id)?;
        let now = event.timestamp.unwrap_or_else(Utc::now);

        let context = env
            .load_context(&user_id, event.namespace.as_deref(), event.clan_id, now)
            .await?;

        let weekly_logins = match &self.tracker {
            Some(tracker) => match tracker.record_login(&user_id, now).await {
                Ok(count) => Some(count),
                Err(error) => {
                    warn!(
                        target: "pipeline::signals",
                        user_id = %user_id,
                        error = %error,
                        "session tracker update failed, continuing without count"
                    );
                    None
                }
            },
            None => None,
        };

        Ok(Signal::new(
            user_id,
            now,
            SignalPayload::Login { weekly_logins },
            context,
        ))
    }
}
