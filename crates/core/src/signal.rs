//! Normalized behavioral signals.
//!
//! A [`Signal`] is built once per inbound event by the signal processor and is
//! never mutated afterwards. Rules match on [`SignalPayload`] instead of
//! probing an untyped bag, so a rule that expects a losing streak cannot be
//! handed a login by mistake.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Timestamp;
use crate::context::PlayerContext;

/// Open key/value bag used at the boundary (trigger reasons, audit records).
pub type Metadata = BTreeMap<String, Value>;

/// Discriminant of a signal, used for registry lookups and audit records.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SignalKind {
    /// Player opened a session.
    Login,
    /// Rage-quit counter changed.
    RageQuit,
    /// Consecutive-loss counter changed.
    LosingStreak,
    /// Total-wins counter changed.
    MatchWin,
}

/// Event-specific data carried by a signal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalPayload {
    Login {
        /// Weekly login count reported by the session tracker, when it answered.
        weekly_logins: Option<u32>,
    },
    RageQuit {
        quit_count: i64,
    },
    LosingStreak {
        current_streak: i64,
    },
    MatchWin {
        total_wins: i64,
    },
}

impl SignalPayload {
    pub fn kind(&self) -> SignalKind {
        match self {
            SignalPayload::Login { .. } => SignalKind::Login,
            SignalPayload::RageQuit { .. } => SignalKind::RageQuit,
            SignalPayload::LosingStreak { .. } => SignalKind::LosingStreak,
            SignalPayload::MatchWin { .. } => SignalKind::MatchWin,
        }
    }

    /// Flattens the payload into metadata entries.
    pub fn metadata(&self) -> Metadata {
        let mut map = Metadata::new();
        match self {
            SignalPayload::Login { weekly_logins } => {
                if let Some(count) = weekly_logins {
                    map.insert("weekly_logins".into(), Value::from(*count));
                }
            }
            SignalPayload::RageQuit { quit_count } => {
                map.insert("quit_count".into(), Value::from(*quit_count));
            }
            SignalPayload::LosingStreak { current_streak } => {
                map.insert("losing_streak".into(), Value::from(*current_streak));
            }
            SignalPayload::MatchWin { total_wins } => {
                map.insert("total_wins".into(), Value::from(*total_wins));
            }
        }
        map
    }
}

/// Immutable, enriched representation of "something happened to this player".
///
/// The [`PlayerContext`] is shared by reference: every rule evaluating this
/// signal sees the same snapshot, loaded once by the processor.
#[derive(Clone, Debug)]
pub struct Signal {
    user_id: String,
    timestamp: Timestamp,
    payload: SignalPayload,
    context: Arc<PlayerContext>,
}

impl Signal {
    pub fn new(
        user_id: impl Into<String>,
        timestamp: Timestamp,
        payload: SignalPayload,
        context: Arc<PlayerContext>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            timestamp,
            payload,
            context,
        }
    }

    pub fn kind(&self) -> SignalKind {
        self.payload.kind()
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn payload(&self) -> &SignalPayload {
        &self.payload
    }

    pub fn context(&self) -> &PlayerContext {
        &self.context
    }

    /// Metadata view of the payload for logging and audit records.
    pub fn metadata(&self) -> Metadata {
        self.payload.metadata()
    }

    /// True when the signal carries no player, which the engine treats as empty input.
    pub fn is_empty(&self) -> bool {
        self.user_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn kind_round_trips_through_snake_case() {
        assert_eq!(SignalKind::LosingStreak.to_string(), "losing_streak");
        assert_eq!(
            SignalKind::from_str("rage_quit").unwrap(),
            SignalKind::RageQuit
        );
        assert_eq!(SignalKind::from_str("MATCH_WIN").unwrap(), SignalKind::MatchWin);
    }

    #[test]
    fn payload_metadata_uses_stable_keys() {
        let meta = SignalPayload::LosingStreak { current_streak: 5 }.metadata();
        assert_eq!(meta.get("losing_streak"), Some(&Value::from(5)));

        let meta = SignalPayload::Login {
            weekly_logins: None,
        }
        .metadata();
        assert!(meta.is_empty());
    }
}
