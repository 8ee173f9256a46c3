//! Unified error types surfaced by the pipeline API.
//!
//! Each stage keeps its own error enum; [`PipelineError`] wraps them so the
//! manager and the dispatcher can bubble failures up with consistent context.
use thiserror::Error;
use tokio::sync::oneshot;

use crate::manager::PipelineReport;

pub use crate::actions::ActionError;
pub use crate::repository::StoreError;
pub use crate::rules::RuleError;
pub use crate::signals::SignalError;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Signal(#[from] SignalError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error("rule {rule_id} is bound to unknown action {action_id}")]
    UnknownActionBinding { rule_id: String, action_id: String },

    #[error("pipeline requires a state store before building")]
    MissingStore,

    #[error("event processing cancelled before actions ran")]
    Cancelled,

    /// Cancelled while an action batch was running; the report describes
    /// what did run and the state that was persisted for it.
    #[error("event processing interrupted after partial execution")]
    Interrupted(Box<PipelineReport>),

    #[error("dispatcher command channel closed")]
    CommandChannelClosed,

    #[error("dispatcher reply channel closed")]
    ReplyChannelClosed(#[source] oneshot::error::RecvError),

    #[error("dispatcher worker join failed")]
    WorkerJoin(#[source] tokio::task::JoinError),
}

/// Errors raised by the rule and action catalogs.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("rule {0} is already registered")]
    DuplicateRuleId(String),

    #[error("rule {0} is not registered")]
    RuleNotFound(String),

    #[error("action {0} is already registered")]
    DuplicateActionId(String),

    #[error("registry lock was poisoned")]
    LockPoisoned,
}
