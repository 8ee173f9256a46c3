//! Per-action execution errors.

use churn_core::StateError;
use thiserror::Error;

use crate::api::{RegistryError, ServiceError};

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("action {0} is not registered")]
    ActionNotFound(String),

    #[error("action {action_id} lookup failed")]
    Registry {
        action_id: String,
        #[source]
        source: RegistryError,
    },

    #[error("action {0} cannot be rolled back")]
    RollbackNotSupported(String),

    #[error("action {action_id} fulfillment call failed")]
    Fulfillment {
        action_id: String,
        #[source]
        source: ServiceError,
    },

    #[error("action {action_id} needs trigger metadata {key:?}")]
    MissingMetadata {
        action_id: String,
        key: &'static str,
    },

    #[error(transparent)]
    InvalidTransition(#[from] StateError),

    #[error("action {0} was cancelled")]
    Cancelled(String),
}

impl ActionError {
    pub fn fulfillment(action_id: &str, source: ServiceError) -> Self {
        Self::Fulfillment {
            action_id: action_id.to_string(),
            source,
        }
    }
}
