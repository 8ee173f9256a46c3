//! Input and dependency errors raised while building a signal.

use thiserror::Error;

use crate::repository::StoreError;

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("no handler registered for event type {0:?}")]
    UnknownEventType(String),

    #[error("event is missing a user id")]
    MissingUserId,

    #[error("malformed {event_type} payload: {message}")]
    InvalidPayload { event_type: String, message: String },

    #[error("stat code {0:?} is not mapped to a signal")]
    UnmappedStatCode(String),

    #[error("failed to load state for {user_id}")]
    StateLoad {
        user_id: String,
        #[source]
        source: StoreError,
    },

    #[error("signal processing cancelled")]
    Cancelled,
}

impl SignalError {
    /// Input errors reject the single event; everything else is a dependency failure.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            SignalError::UnknownEventType(_)
                | SignalError::MissingUserId
                | SignalError::InvalidPayload { .. }
                | SignalError::UnmappedStatCode(_)
        )
    }
}
