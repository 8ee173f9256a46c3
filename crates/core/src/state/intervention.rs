//! Intervention audit records and their forward-only outcome machine.

use serde::{Deserialize, Serialize};

use crate::Timestamp;
use crate::error::StateError;
use crate::signal::Metadata;

/// Outcome of a dispatched intervention.
///
/// ```text
/// Active ──► Completed
///    ├─────► Expired
///    └─────► Failed
/// ```
/// Terminal outcomes never change again.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Outcome {
    #[default]
    Active,
    Completed,
    Expired,
    Failed,
}

impl Outcome {
    pub fn can_transition_to(self, next: Outcome) -> bool {
        matches!(
            (self, next),
            (Outcome::Active, Outcome::Completed | Outcome::Expired | Outcome::Failed)
        )
    }
}

/// One dispatched intervention.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub triggered_by: String,
    pub triggered_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
    #[serde(default)]
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome_at: Option<Timestamp>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl InterventionRecord {
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<String>,
        triggered_by: impl Into<String>,
        triggered_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            triggered_by: triggered_by.into(),
            triggered_at,
            expires_at: None,
            outcome: Outcome::Active,
            outcome_at: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_expiry(mut self, expires_at: Timestamp) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_active(&self, now: Timestamp) -> bool {
        self.outcome == Outcome::Active && self.expires_at.is_none_or(|at| at > now)
    }

    /// Move the record forward. Backward or terminal-to-terminal moves are rejected.
    pub fn transition(&mut self, next: Outcome, at: Timestamp) -> Result<(), StateError> {
        if !self.outcome.can_transition_to(next) {
            return Err(StateError::InvalidTransition {
                id: self.id.clone(),
                from: self.outcome,
                to: next,
            });
        }
        self.outcome = next;
        self.outcome_at = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn outcomes_only_move_forward() {
        let now = Utc::now();
        let mut record =
            InterventionRecord::new("i-1", "comeback_challenge", "session_decline", now);

        record.transition(Outcome::Completed, now).unwrap();
        assert_eq!(record.outcome, Outcome::Completed);
        assert_eq!(record.outcome_at, Some(now));

        let err = record.transition(Outcome::Active, now).unwrap_err();
        assert!(matches!(err, StateError::InvalidTransition { .. }));
        let err = record.transition(Outcome::Expired, now).unwrap_err();
        assert!(matches!(err, StateError::InvalidTransition { .. }));
        assert_eq!(record.outcome, Outcome::Completed);
    }

    #[test]
    fn serializes_kind_as_type() {
        let record = InterventionRecord::new("i-1", "grant_item", "rage_quit", Utc::now());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "grant_item");
        assert_eq!(json["outcome"], "active");
    }
}
