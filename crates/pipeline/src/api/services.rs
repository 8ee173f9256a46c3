//! Contracts for the external collaborators the pipeline calls into.
//!
//! The game-platform client, clan lookups, and the auxiliary login counter
//! live outside this crate. Implementations are injected at build time so the
//! pipeline can run against real services, scripted fakes, or nothing at all.
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Datelike;
use churn_core::Timestamp;
use thiserror::Error;

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("{service} request failed: {message}")]
    Request {
        service: &'static str,
        message: String,
    },

    #[error("{service} is unavailable")]
    Unavailable { service: &'static str },
}

impl ServiceError {
    pub fn request(service: &'static str, message: impl Into<String>) -> Self {
        Self::Request {
            service,
            message: message.into(),
        }
    }
}

/// Reward fulfillment and statistic maintenance on the game platform.
#[async_trait]
pub trait FulfillmentService: Send + Sync {
    /// Grant `quantity` of `item_id` to the player.
    async fn grant(&self, user_id: &str, item_id: &str, quantity: u32)
    -> Result<(), ServiceError>;

    /// Reset a player statistic to its default value.
    async fn reset_stat(&self, user_id: &str, stat_code: &str) -> Result<(), ServiceError>;

    /// Add `delta` to a player statistic.
    async fn increment_stat(
        &self,
        user_id: &str,
        stat_code: &str,
        delta: i64,
    ) -> Result<(), ServiceError>;
}

/// Recent activity of a clan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClanActivity {
    pub clan_id: String,
    pub active_members: u32,
    pub total_members: u32,
}

/// Lookup of clan activity, used lazily by the clan-activity rule.
#[async_trait]
pub trait ClanDirectory: Send + Sync {
    async fn activity(&self, clan_id: &str) -> Result<ClanActivity, ServiceError>;
}

/// Auxiliary login counter updated on a best-effort basis.
#[async_trait]
pub trait SessionTracker: Send + Sync {
    /// Record a login and return the player's login count for that ISO week.
    async fn record_login(&self, user_id: &str, at: Timestamp) -> Result<u32, ServiceError>;
}

/// Process-local [`SessionTracker`] keyed by player and ISO week.
#[derive(Default)]
pub struct InMemorySessionTracker {
    counts: Mutex<HashMap<(String, i32, u32), u32>>,
}

impl InMemorySessionTracker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionTracker for InMemorySessionTracker {
    async fn record_login(&self, user_id: &str, at: Timestamp) -> Result<u32, ServiceError> {
        let week = at.iso_week();
        let mut counts = self
            .counts
            .lock()
            .map_err(|_| ServiceError::Unavailable {
                service: "session_tracker",
            })?;
        let count = counts
            .entry((user_id.to_string(), week.year(), week.week()))
            .or_insert(0);
        *count += 1;
        Ok(*count)
    }
}
