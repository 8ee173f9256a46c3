//! The durable per-player record and its lifecycle transitions.
//!
//! [`ChurnState`] is the only state the pipeline owns. It is loaded once per
//! event, read by rules through [`PlayerContext`](crate::PlayerContext), and
//! mutated only by actions and by [`ChurnState::apply_lifecycle`], which the
//! pipeline manager runs after rule evaluation.

mod challenge;
mod cooldown;
mod history;
mod intervention;
mod sessions;

pub use challenge::ChallengeState;
pub use cooldown::Cooldown;
pub use history::{Severity, SignalRecord};
pub use intervention::{InterventionRecord, Outcome};
pub use sessions::{RESET_INTERVAL_DAYS, Sessions};

use serde::{Deserialize, Serialize};

use crate::Timestamp;
use crate::error::StateError;
use crate::signal::{Signal, SignalPayload};

/// Per-player churn record.
///
/// Invariants:
/// - `intervention_history` holds at most one record per intervention id
/// - intervention outcomes only move forward (see [`Outcome`])
/// - `cooldown.cooldown_until` never decreases
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChurnState {
    pub sessions: Sessions,
    pub signal_history: Vec<SignalRecord>,
    pub intervention_history: Vec<InterventionRecord>,
    pub cooldown: Cooldown,
    pub challenge: Option<ChallengeState>,
    /// Last total-wins value seen on a win signal, if any.
    pub last_known_wins: Option<i64>,
}

/// What [`ChurnState::apply_lifecycle`] changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LifecycleReport {
    pub sessions_reset: bool,
    pub session_recorded: bool,
    /// Challenge whose unknown win baseline was taken from this signal.
    pub seeded_challenge: Option<String>,
    pub expired_challenge: Option<String>,
}

impl ChurnState {
    /// The current challenge if it is active and not past its deadline.
    pub fn active_challenge(&self, now: Timestamp) -> Option<&ChallengeState> {
        self.challenge.as_ref().filter(|c| c.is_live(now))
    }

    /// True if an intervention of `kind` is still running.
    pub fn has_active_intervention(&self, kind: &str, now: Timestamp) -> bool {
        self.intervention_history
            .iter()
            .any(|r| r.kind == kind && r.is_active(now))
    }

    pub fn intervention(&self, id: &str) -> Option<&InterventionRecord> {
        self.intervention_history.iter().find(|r| r.id == id)
    }

    /// Append a record, rejecting a second record with the same id.
    pub fn push_intervention(&mut self, record: InterventionRecord) -> Result<(), StateError> {
        if self.intervention(&record.id).is_some() {
            return Err(StateError::DuplicateIntervention(record.id));
        }
        self.intervention_history.push(record);
        Ok(())
    }

    /// Remove a record. Only used to undo an append made in the same batch.
    pub fn remove_intervention(&mut self, id: &str) -> Option<InterventionRecord> {
        let index = self.intervention_history.iter().position(|r| r.id == id)?;
        Some(self.intervention_history.remove(index))
    }

    pub fn transition_intervention(
        &mut self,
        id: &str,
        outcome: Outcome,
        at: Timestamp,
    ) -> Result<(), StateError> {
        self.intervention_history
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StateError::UnknownIntervention(id.to_string()))?
            .transition(outcome, at)
    }

    /// Deactivate a challenge whose deadline has passed and mark its record expired.
    ///
    /// Returns the id of the expired challenge.
    pub fn expire_challenge(&mut self, now: Timestamp) -> Option<String> {
        let challenge = self.challenge.as_mut()?;
        if !challenge.active || challenge.expires_at > now {
            return None;
        }
        challenge.active = false;
        let id = challenge.id.clone();

        if let Some(record) = self
            .intervention_history
            .iter_mut()
            .find(|r| r.id == id && r.outcome == Outcome::Active)
        {
            // Forward move from Active cannot fail.
            let _ = record.transition(Outcome::Expired, now);
        }
        Some(id)
    }

    /// Bookkeeping applied once per processed signal, after rules have read
    /// the pre-update snapshot:
    /// - lazy weekly session reset and session count, for logins only
    /// - last-seen timestamp per signal kind
    /// - cached win total, which also seeds an unknown challenge baseline
    /// - expiry of overdue challenges
    ///
    /// The weekly reset waits for a login so that the session-decline rule,
    /// which only sees logins, reads the week before it is rolled.
    pub fn apply_lifecycle(&mut self, signal: &Signal) -> LifecycleReport {
        let now = signal.timestamp();
        let mut report = LifecycleReport::default();

        match signal.payload() {
            SignalPayload::Login { .. } => {
                report.sessions_reset = self.sessions.roll_over(now);
                self.sessions.record_session();
                report.session_recorded = true;
            }
            SignalPayload::MatchWin { total_wins } => {
                self.last_known_wins = Some(*total_wins);
                if let Some(challenge) = self
                    .challenge
                    .as_mut()
                    .filter(|c| c.is_live(now) && c.wins_at_start.is_none())
                {
                    challenge.wins_at_start = Some(*total_wins);
                    report.seeded_challenge = Some(challenge.id.clone());
                }
            }
            SignalPayload::RageQuit { .. } | SignalPayload::LosingStreak { .. } => {}
        }

        self.cooldown.note_signal(signal.kind().as_ref(), now);
        report.expired_challenge = self.expire_challenge(now);
        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use super::*;
    use crate::context::PlayerContext;

    fn signal(payload: SignalPayload, state: &ChurnState, at: Timestamp) -> Signal {
        let ctx = PlayerContext::new("u1", "ns", None, state.clone(), at);
        Signal::new("u1", at, payload, Arc::new(ctx))
    }

    fn challenge(now: Timestamp, expires_in: Duration) -> ChallengeState {
        ChallengeState {
            id: "c-1".into(),
            active: true,
            wins_needed: 3,
            wins_at_start: Some(5),
            created_at: now - Duration::days(1),
            expires_at: now + expires_in,
            trigger_reason: "decline".into(),
        }
    }

    #[test]
    fn push_rejects_duplicate_ids() {
        let now = Utc::now();
        let mut state = ChurnState::default();
        state
            .push_intervention(InterventionRecord::new("a", "k", "r", now))
            .unwrap();
        let err = state
            .push_intervention(InterventionRecord::new("a", "k", "r", now))
            .unwrap_err();
        assert_eq!(err, StateError::DuplicateIntervention("a".into()));
        assert_eq!(state.intervention_history.len(), 1);
    }

    #[test]
    fn lifecycle_counts_login_and_rolls_week() {
        let now = Utc::now();
        let mut state = ChurnState::default();
        state.sessions = Sessions {
            this_week: 0,
            last_week: 5,
            last_reset: Some(now - Duration::days(8)),
        };

        let report = state.apply_lifecycle(&signal(
            SignalPayload::Login {
                weekly_logins: None,
            },
            &state,
            now,
        ));

        assert!(report.sessions_reset);
        assert!(report.session_recorded);
        assert_eq!(state.sessions.last_week, 0);
        assert_eq!(state.sessions.this_week, 1);
        assert!(state.cooldown.last_signal_at.contains_key("login"));
    }

    #[test]
    fn counter_signals_leave_the_week_unrolled() {
        let now = Utc::now();
        let sessions = Sessions {
            this_week: 0,
            last_week: 5,
            last_reset: Some(now - Duration::days(8)),
        };
        let mut state = ChurnState {
            sessions: sessions.clone(),
            ..ChurnState::default()
        };

        let report = state.apply_lifecycle(&signal(
            SignalPayload::LosingStreak { current_streak: 1 },
            &state,
            now,
        ));

        assert!(!report.sessions_reset);
        assert!(!report.session_recorded);
        assert_eq!(state.sessions, sessions);
    }

    #[test]
    fn first_win_seeds_unknown_challenge_baseline() {
        let now = Utc::now();
        let mut state = ChurnState::default();
        let mut pending = challenge(now, Duration::days(6));
        pending.wins_at_start = None;
        state.challenge = Some(pending);

        let report = state.apply_lifecycle(&signal(
            SignalPayload::MatchWin { total_wins: 101 },
            &state,
            now,
        ));
        assert_eq!(report.seeded_challenge.as_deref(), Some("c-1"));
        assert_eq!(state.challenge.as_ref().unwrap().wins_at_start, Some(101));

        let report = state.apply_lifecycle(&signal(
            SignalPayload::MatchWin { total_wins: 102 },
            &state,
            now,
        ));
        assert!(report.seeded_challenge.is_none());
        assert_eq!(state.challenge.as_ref().unwrap().wins_at_start, Some(101));
    }

    #[test]
    fn lifecycle_expires_overdue_challenge() {
        let now = Utc::now();
        let mut state = ChurnState::default();
        state.challenge = Some(challenge(now, Duration::hours(-1)));
        state
            .push_intervention(
                InterventionRecord::new("c-1", "comeback_challenge", "session_decline", now)
                    .with_expiry(now - Duration::hours(1)),
            )
            .unwrap();

        let report =
            state.apply_lifecycle(&signal(SignalPayload::MatchWin { total_wins: 9 }, &state, now));

        assert_eq!(report.expired_challenge.as_deref(), Some("c-1"));
        assert_eq!(state.last_known_wins, Some(9));
        assert!(!state.challenge.as_ref().unwrap().active);
        assert_eq!(state.intervention("c-1").unwrap().outcome, Outcome::Expired);
    }

    #[test]
    fn live_challenge_is_left_alone() {
        let now = Utc::now();
        let mut state = ChurnState::default();
        state.challenge = Some(challenge(now, Duration::days(6)));
        assert!(state.expire_challenge(now).is_none());
        assert!(state.active_challenge(now).is_some());
    }

    #[test]
    fn state_round_trips_with_missing_fields() {
        let state: ChurnState = serde_json::from_str(r#"{"sessions":{"thisWeek":3}}"#).unwrap();
        assert_eq!(state.sessions.this_week, 3);
        assert!(state.intervention_history.is_empty());
        assert!(state.challenge.is_none());
    }
}
