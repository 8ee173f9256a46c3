//! Time-boxed comeback challenge stored on the player record.

use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// "Win N matches in D days", created by the comeback-challenge action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeState {
    /// Shares its id with the intervention record that created it.
    pub id: String,
    pub active: bool,
    pub wins_needed: i64,
    /// Total wins when the challenge started. Unknown until the first win
    /// signal after creation if no win total was cached on the record.
    #[serde(default)]
    pub wins_at_start: Option<i64>,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    #[serde(default)]
    pub trigger_reason: String,
}

impl ChallengeState {
    pub fn is_live(&self, now: Timestamp) -> bool {
        self.active && self.expires_at > now
    }

    /// Wins since the baseline, or `None` while the baseline is unknown.
    pub fn wins_achieved(&self, total_wins: i64) -> Option<i64> {
        self.wins_at_start.map(|start| total_wins - start)
    }
}
