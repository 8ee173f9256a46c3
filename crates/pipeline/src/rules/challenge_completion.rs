//! Detects a completed comeback challenge on a win.

use async_trait::async_trait;
use churn_core::{Signal, SignalKind, SignalPayload, Trigger};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{Rule, RuleError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeCompletionDetails {
    pub challenge_id: String,
    /// Intervention record to close; identical to the challenge id.
    pub intervention_id: String,
    pub wins_achieved: i64,
    pub wins_needed: i64,
}

/// Fires when the wins gained since a challenge started reach its target.
///
/// Challenges past their deadline are ignored even if the manager has not
/// yet marked them expired.
#[derive(Debug, Clone)]
pub struct ChallengeCompletionRule {
    priority: i32,
}

impl ChallengeCompletionRule {
    pub const ID: &'static str = "challenge_completion";
    pub const DEFAULT_PRIORITY: i32 = 100;

    pub fn new() -> Self {
        Self {
            priority: Self::DEFAULT_PRIORITY,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl Default for ChallengeCompletionRule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Rule for ChallengeCompletionRule {
    fn id(&self) -> &str {
        Self::ID
    }

    fn signal_kinds(&self) -> &[SignalKind] {
        &[SignalKind::MatchWin]
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn evaluate(
        &self,
        signal: &Signal,
        _cancel: &CancellationToken,
    ) -> Result<Option<Trigger>, RuleError> {
        let SignalPayload::MatchWin { total_wins } = *signal.payload() else {
            return Ok(None);
        };
        let Some(challenge) = signal.context().state.active_challenge(signal.timestamp()) else {
            return Ok(None);
        };
        // An unknown baseline is seeded from this signal by the lifecycle step.
        let Some(wins_achieved) = challenge.wins_achieved(total_wins) else {
            return Ok(None);
        };
        if wins_achieved < challenge.wins_needed {
            return Ok(None);
        }

        let details = ChallengeCompletionDetails {
            challenge_id: challenge.id.clone(),
            intervention_id: challenge.id.clone(),
            wins_achieved,
            wins_needed: challenge.wins_needed,
        };
        Ok(Some(
            Trigger::new(
                Self::ID,
                signal,
                format!(
                    "challenge {} completed with {} of {} wins",
                    details.challenge_id, details.wins_achieved, details.wins_needed
                ),
            )
            .with_priority(self.priority)
            .with_details(&details),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use churn_core::{ChallengeState, ChurnState, PlayerContext, Timestamp};

    use super::*;

    fn state_with_challenge(now: Timestamp, expires_at: Timestamp) -> ChurnState {
        ChurnState {
            challenge: Some(ChallengeState {
                id: "c-1".into(),
                active: true,
                wins_needed: 3,
                wins_at_start: Some(5),
                created_at: now - Duration::days(1),
                expires_at,
                trigger_reason: "decline".into(),
            }),
            ..ChurnState::default()
        }
    }

    async fn evaluate(state: ChurnState, now: Timestamp, total_wins: i64) -> Option<Trigger> {
        let ctx = PlayerContext::new("u1", "ns", None, state, now);
        let signal = Signal::new("u1", now, SignalPayload::MatchWin { total_wins }, Arc::new(ctx));
        ChallengeCompletionRule::default()
            .evaluate(&signal, &CancellationToken::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn fires_when_target_reached() {
        let now = Utc::now();
        let trigger = evaluate(state_with_challenge(now, now + Duration::days(6)), now, 8)
            .await
            .expect("challenge met");

        let details: ChallengeCompletionDetails = trigger.details().unwrap();
        assert_eq!(details.wins_achieved, 3);
        assert_eq!(details.wins_needed, 3);
        assert_eq!(details.intervention_id, "c-1");
        assert_eq!(trigger.priority, ChallengeCompletionRule::DEFAULT_PRIORITY);
    }

    #[tokio::test]
    async fn short_of_target_does_not_fire() {
        let now = Utc::now();
        let state = state_with_challenge(now, now + Duration::days(6));
        assert!(evaluate(state, now, 7).await.is_none());
    }

    #[tokio::test]
    async fn expired_challenge_does_not_fire() {
        let now = Utc::now();
        let state = state_with_challenge(now, now - Duration::minutes(1));
        assert!(evaluate(state, now, 20).await.is_none());
    }

    #[tokio::test]
    async fn unknown_baseline_does_not_fire() {
        let now = Utc::now();
        let mut state = state_with_challenge(now, now + Duration::days(6));
        if let Some(challenge) = state.challenge.as_mut() {
            challenge.wins_at_start = None;
        }
        assert!(evaluate(state, now, 101).await.is_none());
    }

    #[tokio::test]
    async fn no_challenge_does_not_fire() {
        assert!(evaluate(ChurnState::default(), Utc::now(), 20).await.is_none());
    }
}
