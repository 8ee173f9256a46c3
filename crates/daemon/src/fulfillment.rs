use async_trait::async_trait;
use pipeline::{FulfillmentService, ServiceError};

/// Fulfillment that only logs what would be sent to the game platform.
///
/// Stands in until a platform client is wired up.
pub struct LoggingFulfillment;

#[async_trait]
impl FulfillmentService for LoggingFulfillment {
    async fn grant(&self, user_id: &str, item_id: &str, quantity: u32) -> Result<(), ServiceError> {
        tracing::info!(target: "churn::fulfillment", user_id, item_id, quantity, "grant item");
        Ok(())
    }

    async fn reset_stat(&self, user_id: &str, stat_code: &str) -> Result<(), ServiceError> {
        tracing::info!(target: "churn::fulfillment", user_id, stat_code, "reset stat");
        Ok(())
    }

    async fn increment_stat(
        &self,
        user_id: &str,
        stat_code: &str,
        delta: i64,
    ) -> Result<(), ServiceError> {
        tracing::info!(target: "churn::fulfillment", user_id, stat_code, delta, "increment stat");
        Ok(())
    }
}
