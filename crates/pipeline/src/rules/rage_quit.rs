//! Fires when a player's rage-quit counter reaches a threshold.

use async_trait::async_trait;
use churn_core::{Signal, SignalKind, SignalPayload, Trigger};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{Rule, RuleError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RageQuitDetails {
    pub quit_count: i64,
    pub threshold: i64,
}

#[derive(Debug, Clone)]
pub struct RageQuitRule {
    threshold: i64,
    priority: i32,
}

impl RageQuitRule {
    pub const ID: &'static str = "rage_quit";
    pub const DEFAULT_THRESHOLD: i64 = 3;
    pub const DEFAULT_PRIORITY: i32 = 30;

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

impl Default for RageQuitRule {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

#[async_trait]
impl Rule for RageQuitRule {
    fn id(&self) -> &str {
        Self::ID
    }

    fn signal_kinds(&self) -> &[SignalKind] {
        &[SignalKind::RageQuit]
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn evaluate(
        &self,
        signal: &Signal,
        _cancel: &CancellationToken,
    ) -> Result<Option<Trigger>, RuleError> {
        let SignalPayload::RageQuit { quit_count } = *signal.payload() else {
            return Ok(None);
        };
        if quit_count < self.threshold {
            return Ok(None);
        }

        let details = RageQuitDetails {
            quit_count,
            threshold: self.threshold,
        };
        Ok(Some(
            Trigger::new(
                Self::ID,
                signal,
                format!("rage quit count {quit_count} reached threshold {}", self.threshold),
            )
            .with_priority(self.priority)
            .with_details(&details),
        ))
    }
}
