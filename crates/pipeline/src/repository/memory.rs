//! In-memory StateStore implementation for tests and local runs.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use churn_core::{ChurnState, Timestamp};

use super::{DEFAULT_TTL_DAYS, Result, StateStore, StoreError};

struct Entry {
    state: ChurnState,
    expires_at: Timestamp,
}

/// In-memory implementation of [`StateStore`] with sliding expiry.
pub struct InMemoryStateStore {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Duration,
}

impl InMemoryStateStore {
    /// Create a new empty store with the default 30 day expiry.
    pub fn new() -> Self {
        Self::with_ttl(Duration::days(DEFAULT_TTL_DAYS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Number of records currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired record. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::LockPoisoned)?;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        Ok(before - entries.len())
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self, user_id: &str) -> Result<ChurnState> {
        let entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
        let now = Utc::now();
        Ok(entries
            .get(user_id)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.state.clone())
            .unwrap_or_default())
    }

    async fn save(&self, user_id: &str, state: &ChurnState) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::LockPoisoned)?;
        entries.insert(
            user_id.to_string(),
            Entry {
                state: state.clone(),
                expires_at: Utc::now() + self.ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::LockPoisoned)?;
        entries.remove(user_id);
        Ok(())
    }
}
