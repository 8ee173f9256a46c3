//! Side-effecting interventions and the executor that runs them.
//!
//! An [`Action`] is the only component allowed to change a player's
//! [`ChurnState`]. Actions receive the working copy of the state owned by the
//! pipeline manager, mutate it in place, and may call external services.
//!
//! # Architecture
//!
//! - Actions are registered once in an [`ActionRegistry`] and looked up by id
//! - Each rule is statically bound to an ordered list of action ids
//! - The [`ActionExecutor`] runs a bound list strictly in order for a trigger
//! - A failed action leaves no trace in the state; the executor restores the
//!   copy taken before it ran
//! - With rollback enabled, earlier actions of the same batch are undone in
//!   reverse order
//!
//! # Rollback
//!
//! Rollback is opt-in per action via [`Action::supports_rollback`]. Actions
//! that reach outside the process without a compensating call (granting an
//! item, resetting a statistic) keep the default and report
//! [`ActionError::RollbackNotSupported`], which the executor surfaces as a
//! partial rollback.

mod comeback_challenge;
mod error;
mod executor;
mod grant_item;
mod record_signal;
mod registry;
mod stats;

pub use comeback_challenge::{ComebackChallengeAction, ComebackChallengeConfig};
pub use error::ActionError;
pub use executor::{ActionExecutor, ActionFailure, ExecutionReport, RollbackReport};
pub use grant_item::GrantItemAction;
pub use record_signal::RecordSignalAction;
pub use registry::ActionRegistry;
pub use stats::{IncrementStatAction, ResetStatAction};

use async_trait::async_trait;
use churn_core::{ChurnState, Trigger};
use tokio_util::sync::CancellationToken;

/// What a successful [`Action::execute`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The action changed state or an external system.
    ///
    /// `record_id` names the history entry the action created, if any, and is
    /// handed back to [`Action::rollback`].
    Applied { record_id: Option<String> },
    /// Nothing to do, e.g. an idempotent create that found its target.
    Unchanged,
}

impl ActionOutcome {
    pub fn applied() -> Self {
        Self::Applied { record_id: None }
    }

    pub fn applied_record(record_id: impl Into<String>) -> Self {
        Self::Applied {
            record_id: Some(record_id.into()),
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// A side-effecting operation invoked by a trigger.
#[async_trait]
pub trait Action: Send + Sync {
    /// Unique identifier used in rule bindings.
    fn id(&self) -> &str;

    fn supports_rollback(&self) -> bool {
        false
    }

    /// Run the action against the working state.
    ///
    /// On `Err` the executor discards whatever the action wrote to `state`.
    async fn execute(
        &self,
        trigger: &Trigger,
        state: &mut ChurnState,
        cancel: &CancellationToken,
    ) -> Result<ActionOutcome, ActionError>;

    /// Undo a previous successful [`execute`](Action::execute) of this batch.
    ///
    /// `record_id` is the value returned in [`ActionOutcome::Applied`].
    async fn rollback(
        &self,
        _trigger: &Trigger,
        _record_id: Option<&str>,
        _state: &mut ChurnState,
    ) -> Result<(), ActionError> {
        Err(ActionError::RollbackNotSupported(self.id().to_string()))
    }
}
