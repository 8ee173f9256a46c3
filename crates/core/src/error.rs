//! Errors raised by lifecycle transitions on [`ChurnState`](crate::ChurnState).

use crate::state::Outcome;

/// Violations of the ChurnState invariants.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("intervention {id} cannot move from {from} to {to}")]
    InvalidTransition { id: String, from: Outcome, to: Outcome },

    #[error("intervention {0} not found")]
    UnknownIntervention(String),

    #[error("intervention {0} already recorded")]
    DuplicateIntervention(String),
}
