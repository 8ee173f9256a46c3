//! Flags players whose clan has gone quiet.

use std::sync::Arc;

use async_trait::async_trait;
use churn_core::{Signal, SignalKind, Trigger};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{Rule, RuleError};
use crate::api::ClanDirectory;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClanActivityDetails {
    pub clan_id: String,
    pub active_members: u32,
    pub total_members: u32,
    pub min_active_members: u32,
}

/// Fires on login when the player's clan has fewer active members than
/// `min_active_members`.
///
/// Clan activity is not part of the player context. The rule skips players
/// without a clan before it ever touches the directory, and reports
/// [`RuleError::MissingDependency`] if a lookup is needed but no directory
/// was configured.
pub struct ClanActivityRule {
    directory: Option<Arc<dyn ClanDirectory>>,
    min_active_members: u32,
    priority: i32,
}

impl ClanActivityRule {
    pub const ID: &'static str = "clan_activity";
    pub const DEFAULT_MIN_ACTIVE_MEMBERS: u32 = 3;
    pub const DEFAULT_PRIORITY: i32 = 10;

    pub fn new(directory: Option<Arc<dyn ClanDirectory>>) -> Self {
        Self {
            directory,
            min_active_members: Self::DEFAULT_MIN_ACTIVE_MEMBERS,
            priority: Self::DEFAULT_PRIORITY,
        }
    }

    pub fn with_min_active_members(mut self, min_active_members: u32) -> Self {
        self.min_active_members = min_active_members;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

#[async_trait]
impl Rule for ClanActivityRule {
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
        cancel: &CancellationToken,
    ) -> Result<Option<Trigger>, RuleError> {
        let Some(clan_id) = signal.context().clan_id.as_deref() else {
            return Ok(None);
        };
        let directory = self
            .directory
            .as_ref()
            .ok_or_else(|| RuleError::MissingDependency {
                rule_id: Self::ID.to_string(),
                dependency: "clan directory",
            })?;

        let activity = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RuleError::Cancelled(Self::ID.to_string())),
            looked_up = directory.activity(clan_id) => {
                looked_up.map_err(|source| RuleError::Lookup {
                    rule_id: Self::ID.to_string(),
                    source,
                })?
            }
        };

        if activity.active_members >= self.min_active_members {
            return Ok(None);
        }

        let details = ClanActivityDetails {
            clan_id: activity.clan_id,
            active_members: activity.active_members,
            total_members: activity.total_members,
            min_active_members: self.min_active_members,
        };
        Ok(Some(
            Trigger::new(
                Self::ID,
                signal,
                format!(
                    "clan {} has {} of {} members active",
                    details.clan_id, details.active_members, details.total_members
                ),
            )
            .with_priority(self.priority)
            .with_details(&details),
        ))
    }
}
