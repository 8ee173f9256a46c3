//! Creates a time-boxed "win N matches" challenge for a declining player.

use async_trait::async_trait;
use chrono::Duration;
use churn_core::{ChallengeState, ChurnState, InterventionRecord, Trigger};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{Action, ActionError, ActionOutcome};

/// Parameters of the comeback challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComebackChallengeConfig {
    pub wins_needed: i64,
    pub duration_days: i64,
    pub cooldown_hours: i64,
}

impl Default for ComebackChallengeConfig {
    fn default() -> Self {
        Self {
            wins_needed: 3,
            duration_days: 7,
            cooldown_hours: 48,
        }
    }
}

/// Starts a comeback challenge and puts the player on cooldown.
///
/// Idempotent: if a live challenge already exists the action reports
/// [`ActionOutcome::Unchanged`]. The challenge and its intervention record
/// share one id. Win progress is measured against the last total-wins value
/// seen for the player.
pub struct ComebackChallengeAction {
    config: ComebackChallengeConfig,
}

impl ComebackChallengeAction {
    pub const ID: &'static str = "comeback_challenge";

    pub fn new(config: ComebackChallengeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ComebackChallengeConfig {
        &self.config
    }
}

impl Default for ComebackChallengeAction {
    fn default() -> Self {
        Self::new(ComebackChallengeConfig::default())
    }
}

#[async_trait]
impl Action for ComebackChallengeAction {
    fn id(&self) -> &str {
        Self::ID
    }

    fn supports_rollback(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        trigger: &Trigger,
        state: &mut ChurnState,
        _cancel: &CancellationToken,
    ) -> Result<ActionOutcome, ActionError> {
        let now = trigger.timestamp;
        if state.active_challenge(now).is_some() {
            return Ok(ActionOutcome::Unchanged);
        }

        let id = Uuid::new_v4().to_string();
        let expires_at = now + Duration::days(self.config.duration_days);

        let record = InterventionRecord::new(&id, Self::ID, &trigger.rule_id, now)
            .with_expiry(expires_at)
            .with_metadata(trigger.metadata.clone());
        state.push_intervention(record)?;

        state.challenge = Some(ChallengeState {
            id: id.clone(),
            active: true,
            wins_needed: self.config.wins_needed,
            wins_at_start: state.last_known_wins,
            created_at: now,
            expires_at,
            trigger_reason: trigger.reason.clone(),
        });
        state
            .cooldown
            .extend(now, now + Duration::hours(self.config.cooldown_hours));
        state.cooldown.record_intervention(Self::ID);

        Ok(ActionOutcome::applied_record(id))
    }

    /// Deactivates the challenge and drops its record. The cooldown deadline
    /// is left in place since it never moves backwards.
    async fn rollback(
        &self,
        _trigger: &Trigger,
        record_id: Option<&str>,
        state: &mut ChurnState,
    ) -> Result<(), ActionError> {
        let Some(id) = record_id else {
            return Ok(());
        };
        if let Some(challenge) = state.challenge.as_mut().filter(|c| c.id == id) {
            challenge.active = false;
        }
        if state.remove_intervention(id).is_some()
            && let Some(count) = state.cooldown.intervention_counts.get_mut(Self::ID)
        {
            *count = count.saturating_sub(1);
        }
        Ok(())
    }
}
