//! Per-rule evaluation errors.

use thiserror::Error;

use crate::api::ServiceError;

#[derive(Debug, Error)]
pub enum RuleError {
    /// The rule needs a collaborator that was never configured.
    #[error("rule {rule_id} requires {dependency}, which is not configured")]
    MissingDependency {
        rule_id: String,
        dependency: &'static str,
    },

    #[error("rule {rule_id} lookup failed")]
    Lookup {
        rule_id: String,
        #[source]
        source: ServiceError,
    },

    #[error("rule {0} was cancelled")]
    Cancelled(String),
}
