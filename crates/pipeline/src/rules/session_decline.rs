//! Detects week-over-week session decline on login.

use async_trait::async_trait;
use churn_core::{Signal, SignalKind, Trigger};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{Rule, RuleError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDeclineDetails {
    pub last_week: u32,
    pub this_week: u32,
    pub days_since_reset: i64,
}

/// Fires when a player who was active last window has gone quiet.
///
/// Conditions, all as of the signal's timestamp:
/// - a full reset window has elapsed since the last reset
/// - the previous window had sessions and the current one has none
/// - the player is not on cooldown
/// - no comeback intervention is already running
///
/// The rule reads the pre-reset counters. The weekly reset it depends on is
/// applied by the pipeline manager after evaluation, so the evidence is still
/// present when this rule looks at it.
#[derive(Debug, Clone)]
pub struct SessionDeclineRule {
    intervention_kind: String,
    priority: i32,
}

impl SessionDeclineRule {
    pub const ID: &'static str = "session_decline";
    pub const DEFAULT_PRIORITY: i32 = 50;

    /// `intervention_kind` is the intervention type whose active presence suppresses the rule.
    pub fn new(intervention_kind: impl Into<String>) -> Self {
        Self {
            intervention_kind: intervention_kind.into(),
            priority: Self::DEFAULT_PRIORITY,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl Default for SessionDeclineRule {
    fn default() -> Self {
        Self::new("comeback_challenge")
    }
}

#[async_trait]
impl Rule for SessionDeclineRule {
    fn id(&self) -> &str {
        Self::ID
    }

    fn signal_kinds(&self) -> &[SignalKind] {
        &[SignalKind::Login]
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn evaluate(
        &self,
        signal: &Signal,
        _cancel: &CancellationToken,
    ) -> Result<Option<Trigger>, RuleError> {
        let ctx = signal.context();
        let now = signal.timestamp();
        let sessions = &ctx.state.sessions;

        if !sessions.is_declining(now)
            || ctx.session_info.on_cooldown
            || ctx.session_info.has_active_challenge
            || ctx.state.has_active_intervention(&self.intervention_kind, now)
        {
            return Ok(None);
        }

        let days_since_reset = sessions
            .last_reset
            .map(|at| (now - at).num_days())
            .unwrap_or_default();
        let details = SessionDeclineDetails {
            last_week: sessions.last_week,
            this_week: sessions.this_week,
            days_since_reset,
        };

        Ok(Some(
            Trigger::new(
                Self::ID,
                signal,
                format!(
                    "{} sessions last week, none in the {} days since",
                    details.last_week, details.days_since_reset
                ),
            )
            .with_priority(self.priority)
            .with_details(&details),
        ))
    }
}
