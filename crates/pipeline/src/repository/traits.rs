//! Store contract for loading and saving player churn records.

use async_trait::async_trait;
use churn_core::ChurnState;

use super::Result;

/// Inactivity window after which a record is dropped.
pub const DEFAULT_TTL_DAYS: i64 = 30;

/// Durable per-player record keyed by player identifier.
///
/// Implementations provide atomic get/set per key; nothing spanning two
/// players is assumed. Records carry a sliding expiry: every save pushes the
/// deadline out again, and an expired record loads as a fresh one.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the record for `user_id`, or a fresh empty state if there is none.
    async fn load(&self, user_id: &str) -> Result<ChurnState>;

    /// Replace the record for `user_id` and refresh its expiry.
    async fn save(&self, user_id: &str, state: &ChurnState) -> Result<()>;

    /// Drop the record for `user_id`, if any.
    async fn delete(&self, user_id: &str) -> Result<()>;
}
