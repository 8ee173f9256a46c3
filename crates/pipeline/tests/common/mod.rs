//! Shared fakes for pipeline integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pipeline::{ClanActivity, ClanDirectory, FulfillmentService, ServiceError};

/// Fulfillment fake that records every call.
#[derive(Default)]
pub struct RecordingFulfillment {
    pub grants: Mutex<Vec<(String, String, u32)>>,
    pub resets: Mutex<Vec<(String, String)>>,
    pub increments: Mutex<Vec<(String, String, i64)>>,
    pub fail_grants: AtomicBool,
    pub grant_delay: Option<Duration>,
}

impl RecordingFulfillment {
    pub fn slow(delay: Duration) -> Self {
        Self {
            grant_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_grants.store(failing, Ordering::SeqCst);
    }

    pub fn grant_count(&self) -> usize {
        self.grants.lock().unwrap().len()
    }
}

#[async_trait]
impl FulfillmentService for RecordingFulfillment {
    async fn grant(&self, user_id: &str, item_id: &str, quantity: u32) -> Result<(), ServiceError> {
        if let Some(delay) = self.grant_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_grants.load(Ordering::SeqCst) {
            return Err(ServiceError::request("fulfillment", "upstream returned 503"));
        }
        self.grants
            .lock()
            .unwrap()
            .push((user_id.to_string(), item_id.to_string(), quantity));
        Ok(())
    }

    async fn reset_stat(&self, user_id: &str, stat_code: &str) -> Result<(), ServiceError> {
        self.resets
            .lock()
            .unwrap()
            .push((user_id.to_string(), stat_code.to_string()));
        Ok(())
    }

    async fn increment_stat(
        &self,
        user_id: &str,
        stat_code: &str,
        delta: i64,
    ) -> Result<(), ServiceError> {
        self.increments
            .lock()
            .unwrap()
            .push((user_id.to_string(), stat_code.to_string(), delta));
        Ok(())
    }
}

/// Clan directory fake backed by a fixed table.
#[derive(Default)]
pub struct StaticClans {
    pub clans: HashMap<String, (u32, u32)>,
}

impl StaticClans {
    pub fn with(mut self, clan_id: &str, active: u32, total: u32) -> Self {
        self.clans.insert(clan_id.to_string(), (active, total));
        self
    }
}

#[async_trait]
impl ClanDirectory for StaticClans {
    async fn activity(&self, clan_id: &str) -> Result<ClanActivity, ServiceError> {
        let (active_members, total_members) = self
            .clans
            .get(clan_id)
            .copied()
            .ok_or_else(|| ServiceError::request("clans", format!("unknown clan {clan_id}")))?;
        Ok(ClanActivity {
            clan_id: clan_id.to_string(),
            active_members,
            total_members,
        })
    }
}
