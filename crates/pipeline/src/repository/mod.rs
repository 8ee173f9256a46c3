//! Repository layer for the per-player churn record.
//!
//! The pipeline owns the read-modify-write cycle of [`ChurnState`] but not
//! its persistence engine: stores implement [`StateStore`] and are injected at
//! build time.
//!
//! [`ChurnState`]: churn_core::ChurnState

mod error;
mod file;
mod memory;
mod traits;

pub use error::{Result, StoreError};
pub use file::FileStateStore;
pub use memory::InMemoryStateStore;
pub use traits::{DEFAULT_TTL_DAYS, StateStore};
