//! Handler for statistic-update events.

use async_trait::async_trait;
use chrono::Utc;
use churn_core::{Signal, SignalPayload, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::processor::{parse_payload, require_user_id};
use super::{EventHandler, HandlerEnv, SignalError};

pub const STATISTIC_EVENT: &str = "statistic_updated";

/// Platform stat codes that map onto signal kinds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatCodes {
    pub rage_quit: String,
    pub losing_streak: String,
    pub total_wins: String,
}

impl Default for StatCodes {
    fn default() -> Self {
        Self {
            rage_quit: "rage-quit-count".into(),
            losing_streak: "losing-streak".into(),
            total_wins: "total-wins".into(),
        }
    }
}

impl StatCodes {
    fn payload_for(&self, stat_code: &str, value: i64) -> Option<SignalPayload> {
        if stat_code == self.rage_quit {
            Some(SignalPayload::RageQuit { quit_count: value })
        } else if stat_code == self.losing_streak {
            Some(SignalPayload::LosingStreak {
                current_streak: value,
            })
        } else if stat_code == self.total_wins {
            Some(SignalPayload::MatchWin { total_wins: value })
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatisticEvent {
    #[serde(default, alias = "user_id")]
    user_id: Option<String>,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(alias = "stat_code")]
    stat_code: String,
    #[serde(alias = "latest_value")]
    latest_value: f64,
    #[serde(default)]
    timestamp: Option<Timestamp>,
}

/// Builds counter signals (rage quits, losing streak, total wins) from stat updates.
#[derive(Default)]
pub struct StatisticHandler {
    codes: StatCodes,
}

impl StatisticHandler {
    pub fn new(codes: StatCodes) -> Self {
        Self { codes }
    }
}

#[async_trait]
impl EventHandler for StatisticHandler {
    fn event_type(&self) -> &str {
        STATISTIC_EVENT
    }

    async fn handle(&self, payload: &Value, env: &HandlerEnv<'_>) -> Result<Signal, SignalError> {
        let event: StatisticEvent = parse_payload(STATISTIC_EVENT, payload)?;
        let user_id = require_user_id(event.user_id)?;

        if !event.latest_value.is_finite() {
            return Err(SignalError::InvalidPayload {
                event_type: STATISTIC_EVENT.into(),
                message: format!("latestValue {} is not a finite number", event.latest_value),
            });
        }
        // Platform statistics are floats; counters are whole numbers.
        let value = event.latest_value.round() as i64;

        let payload = self
            .codes
            .payload_for(&event.stat_code, value)
            .ok_or_else(|| SignalError::UnmappedStatCode(event.stat_code.clone()))?;

        let now = event.timestamp.unwrap_or_else(Utc::now);
        let context = env
            .load_context(&user_id, event.namespace.as_deref(), None, now)
            .await?;

        Ok(Signal::new(user_id, now, payload, context))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::repository::InMemoryStateStore;

    async fn handle(payload: Value) -> Result<Signal, SignalError> {
        let store = InMemoryStateStore::new();
        let cancel = CancellationToken::new();
        let env = HandlerEnv {
            store: &store,
            namespace: "ns",
            cancel: &cancel,
        };
        StatisticHandler::default().handle(&payload, &env).await
    }

    #[tokio::test]
    async fn maps_stat_codes_to_payloads() {
        let signal = handle(json!({
            "userId": "u1",
            "statCode": "losing-streak",
            "latestValue": 5.0
        }))
        .await
        .unwrap();
        assert_eq!(
            signal.payload(),
            &SignalPayload::LosingStreak { current_streak: 5 }
        );

        let signal = handle(json!({"userId": "u1", "statCode": "total-wins", "latestValue": 8}))
            .await
            .unwrap();
        assert_eq!(signal.payload(), &SignalPayload::MatchWin { total_wins: 8 });
    }

    #[tokio::test]
    async fn unmapped_code_is_an_input_error() {
        let err = handle(json!({"userId": "u1", "statCode": "kills", "latestValue": 1}))
            .await
            .unwrap_err();
        assert!(matches!(&err, SignalError::UnmappedStatCode(code) if code == "kills"));
        assert!(err.is_input_error());
    }

    #[tokio::test]
    async fn missing_stat_fields_are_invalid_payload() {
        let err = handle(json!({"userId": "u1"})).await.unwrap_err();
        assert!(matches!(err, SignalError::InvalidPayload { .. }));
    }
}
