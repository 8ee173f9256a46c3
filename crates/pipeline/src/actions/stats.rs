//! Statistic maintenance actions backed by the fulfillment service.

use std::sync::Arc;

use async_trait::async_trait;
use churn_core::{ChurnState, Trigger};
use tokio_util::sync::CancellationToken;

use super::{Action, ActionError, ActionOutcome};
use crate::api::FulfillmentService;

/// Resets a player statistic, e.g. the rage-quit counter once it has been acted on.
pub struct ResetStatAction {
    fulfillment: Arc<dyn FulfillmentService>,
    stat_code: String,
}

impl ResetStatAction {
    pub const ID: &'static str = "reset_stat";

    pub fn new(fulfillment: Arc<dyn FulfillmentService>, stat_code: impl Into<String>) -> Self {
        Self {
            fulfillment,
            stat_code: stat_code.into(),
        }
    }
}

#[async_trait]
impl Action for ResetStatAction {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn execute(
        &self,
        trigger: &Trigger,
        _state: &mut ChurnState,
        cancel: &CancellationToken,
    ) -> Result<ActionOutcome, ActionError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ActionError::Cancelled(Self::ID.to_string())),
            reset = self.fulfillment.reset_stat(&trigger.user_id, &self.stat_code) => {
                reset.map_err(|e| ActionError::fulfillment(Self::ID, e))?;
                Ok(ActionOutcome::applied())
            }
        }
    }
}

/// Adds a fixed delta to a player statistic. Rolled back by applying the
/// negated delta.
pub struct IncrementStatAction {
    id: String,
    fulfillment: Arc<dyn FulfillmentService>,
    stat_code: String,
    delta: i64,
}

impl IncrementStatAction {
    pub const ID: &'static str = "increment_stat";

    pub fn new(
        fulfillment: Arc<dyn FulfillmentService>,
        stat_code: impl Into<String>,
        delta: i64,
    ) -> Self {
        Self {
            id: Self::ID.to_string(),
            fulfillment,
            stat_code: stat_code.into(),
            delta,
        }
    }

    /// Register under a custom id, for binding several increments at once.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

#[async_trait]
impl Action for IncrementStatAction {
    fn id(&self) -> &str {
        &self.id
    }

    fn supports_rollback(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        trigger: &Trigger,
        _state: &mut ChurnState,
        cancel: &CancellationToken,
    ) -> Result<ActionOutcome, ActionError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ActionError::Cancelled(self.id.clone())),
            updated = self
                .fulfillment
                .increment_stat(&trigger.user_id, &self.stat_code, self.delta) => {
                updated.map_err(|e| ActionError::fulfillment(&self.id, e))?;
                Ok(ActionOutcome::applied())
            }
        }
    }

    async fn rollback(
        &self,
        trigger: &Trigger,
        _record_id: Option<&str>,
        _state: &mut ChurnState,
    ) -> Result<(), ActionError> {
        self.fulfillment
            .increment_stat(&trigger.user_id, &self.stat_code, -self.delta)
            .await
            .map_err(|e| ActionError::fulfillment(&self.id, e))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use chrono::Utc;
    use churn_core::{PlayerContext, Signal, SignalPayload};

    use super::*;
    use crate::api::ServiceError;

    #[derive(Default)]
    struct Stats(Mutex<HashMap<String, i64>>);

    #[async_trait]
    impl FulfillmentService for Stats {
        async fn grant(&self, _: &str, _: &str, _: u32) -> Result<(), ServiceError> {
            Ok(())
        }

        async fn reset_stat(&self, _user_id: &str, stat_code: &str) -> Result<(), ServiceError> {
            self.0.lock().unwrap().insert(stat_code.into(), 0);
            Ok(())
        }

        async fn increment_stat(
            &self,
            _user_id: &str,
            stat_code: &str,
            delta: i64,
        ) -> Result<(), ServiceError> {
            *self.0.lock().unwrap().entry(stat_code.into()).or_default() += delta;
            Ok(())
        }
    }

    fn trigger() -> Trigger {
        let now = Utc::now();
        let ctx = PlayerContext::new("u1", "ns", None, ChurnState::default(), now);
        let signal = Signal::new(
            "u1",
            now,
            SignalPayload::RageQuit { quit_count: 4 },
            Arc::new(ctx),
        );
        Trigger::new("rage_quit", &signal, "test")
    }

    #[tokio::test]
    async fn reset_zeroes_the_stat_and_cannot_roll_back() {
        let stats = Arc::new(Stats::default());
        stats.0.lock().unwrap().insert("rage-quit-count".into(), 4);
        let action = ResetStatAction::new(stats.clone(), "rage-quit-count");
        let mut state = ChurnState::default();

        action
            .execute(&trigger(), &mut state, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats.0.lock().unwrap()["rage-quit-count"], 0);

        let err = action.rollback(&trigger(), None, &mut state).await.unwrap_err();
        assert!(matches!(err, ActionError::RollbackNotSupported(_)));
    }

    #[tokio::test]
    async fn increment_rolls_back_with_negated_delta() {
        let stats = Arc::new(Stats::default());
        let action =
            IncrementStatAction::new(stats.clone(), "comebacks", 2).with_id("count_comeback");
        let trigger = trigger();
        let mut state = ChurnState::default();

        action
            .execute(&trigger, &mut state, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats.0.lock().unwrap()["comebacks"], 2);

        action.rollback(&trigger, None, &mut state).await.unwrap();
        assert_eq!(stats.0.lock().unwrap()["comebacks"], 0);
        assert_eq!(action.id(), "count_comeback");
    }
}
