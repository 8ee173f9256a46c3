//! Fires when a player's consecutive-loss counter reaches a threshold.

use async_trait::async_trait;
use churn_core::{Signal, SignalKind, SignalPayload, Trigger};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{Rule, RuleError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LosingStreakDetails {
    pub losing_streak: i64,
    pub threshold: i64,
}

#[derive(Debug, Clone)]
pub struct LosingStreakRule {
    threshold: i64,
    priority: i32,
}

impl LosingStreakRule {
    pub const ID: &'static str = "losing_streak";
    pub const DEFAULT_THRESHOLD: i64 = 5;
    pub const DEFAULT_PRIORITY: i32 = 20;

    pub fn new(threshold: i64) -> Self {
        Self {
            threshold,
            priority: Self::DEFAULT_PRIORITY,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl Default for LosingStreakRule {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

#[async_trait]
impl Rule for LosingStreakRule {
    fn id(&self) -> &str {
        Self::ID
    }

    fn signal_kinds(&self) -> &[SignalKind] {
        &[SignalKind::LosingStreak]
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn evaluate(
        &self,
        signal: &Signal,
        _cancel: &CancellationToken,
    ) -> Result<Option<Trigger>, RuleError> {
        let SignalPayload::LosingStreak { current_streak } = *signal.payload() else {
            return Ok(None);
        };
        if current_streak < self.threshold {
            return Ok(None);
        }

        Ok(Some(
            Trigger::new(
                Self::ID,
                signal,
                format!("lost {current_streak} matches in a row"),
            )
            .with_priority(self.priority)
            .with_details(&LosingStreakDetails {
                losing_streak: current_streak,
                threshold: self.threshold,
            }),
        ))
    }
}
