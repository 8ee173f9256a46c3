//! Error types raised by state store implementations.

use thiserror::Error;

/// Errors surfaced by state store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state store lock was poisoned")]
    LockPoisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
