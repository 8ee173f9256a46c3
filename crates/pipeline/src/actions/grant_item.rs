//! Grants a configured item through the fulfillment service.

use std::sync::Arc;

use async_trait::async_trait;
use churn_core::{ChurnState, InterventionRecord, Outcome, Trigger};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{Action, ActionError, ActionOutcome};
use crate::api::FulfillmentService;

/// Trigger metadata key naming the intervention a grant completes.
pub(crate) const INTERVENTION_ID_KEY: &str = "intervention_id";

/// Grants `quantity` of `item_id` to the triggering player.
///
/// If the trigger names an intervention (a completed challenge), that record
/// is closed as completed and the challenge deactivated. Otherwise, or if
/// the named record is missing, the grant itself is recorded as a completed
/// intervention.
///
/// A granted item cannot be taken back, so this action has no rollback.
pub struct GrantItemAction {
    fulfillment: Arc<dyn FulfillmentService>,
    item_id: String,
    quantity: u32,
}

impl GrantItemAction {
    pub const ID: &'static str = "grant_item";

    pub fn new(
        fulfillment: Arc<dyn FulfillmentService>,
        item_id: impl Into<String>,
        quantity: u32,
    ) -> Self {
        Self {
            fulfillment,
            item_id: item_id.into(),
            quantity,
        }
    }

    /// Returns false if no record has this id.
    fn close_intervention(
        &self,
        id: &str,
        trigger: &Trigger,
        state: &mut ChurnState,
    ) -> Result<bool, ActionError> {
        let now = trigger.timestamp;
        match state.intervention(id).map(|r| r.outcome) {
            Some(Outcome::Active) => state.transition_intervention(id, Outcome::Completed, now)?,
            Some(outcome) => {
                debug!(
                    target: "pipeline::actions",
                    intervention_id = id,
                    %outcome,
                    "intervention already closed"
                );
            }
            None => return Ok(false),
        }
        if let Some(challenge) = state.challenge.as_mut().filter(|c| c.id == id) {
            challenge.active = false;
        }
        Ok(true)
    }
}

#[async_trait]
impl Action for GrantItemAction {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn execute(
        &self,
        trigger: &Trigger,
        state: &mut ChurnState,
        cancel: &CancellationToken,
    ) -> Result<ActionOutcome, ActionError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ActionError::Cancelled(Self::ID.to_string())),
            granted = self.fulfillment.grant(&trigger.user_id, &self.item_id, self.quantity) => {
                granted.map_err(|e| ActionError::fulfillment(Self::ID, e))?;
            }
        }

        // The item is already granted; from here on the grant must be recorded.
        if let Some(id) = trigger.metadata_str(INTERVENTION_ID_KEY) {
            if self.close_intervention(id, trigger, state)? {
                return Ok(ActionOutcome::applied());
            }
            warn!(
                target: "pipeline::actions",
                user_id = %trigger.user_id,
                intervention_id = id,
                "granted for unknown intervention, recording the grant instead"
            );
        }

        let id = Uuid::new_v4().to_string();
        let mut record = InterventionRecord::new(&id, Self::ID, &trigger.rule_id, trigger.timestamp)
            .with_metadata(trigger.metadata.clone());
        record.metadata.insert("item_id".into(), Value::from(self.item_id.as_str()));
        record.metadata.insert("quantity".into(), Value::from(self.quantity));
        record.transition(Outcome::Completed, trigger.timestamp)?;
        state.push_intervention(record)?;
        state.cooldown.record_intervention(Self::ID);

        Ok(ActionOutcome::applied_record(id))
    }
}
