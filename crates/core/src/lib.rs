//! Data model and lifecycle rules for churn detection.
//!
//! `churn-core` defines the values that flow through the evaluation pipeline
//! (signals, player context, triggers) and the durable per-player
//! [`ChurnState`]. All lifecycle transitions on the state (weekly session
//! resets, cooldown extension, intervention outcomes, challenge expiry) live
//! here as pure functions so the pipeline crate only orchestrates I/O.
pub mod context;
pub mod error;
pub mod signal;
pub mod state;
pub mod trigger;

pub use context::{PlayerContext, SessionInfo};
pub use error::StateError;
pub use signal::{Metadata, Signal, SignalKind, SignalPayload};
pub use state::{
    ChallengeState, ChurnState, Cooldown, InterventionRecord, LifecycleReport, Outcome, Sessions,
    Severity, SignalRecord,
};
pub use trigger::Trigger;

/// Wall-clock instant used throughout the model.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
