//! Rule evaluation for churn detection.
//!
//! Rules are stateless predicates over a [`Signal`]. Each rule declares the
//! signal kinds it cares about and may emit at most one [`Trigger`] per
//! evaluation. The [`RuleEngine`] collects triggers from every matching rule
//! and orders them by priority before they reach the action executor.
//!
//! # Architecture
//!
//! - Rules are registered in a shared [`RuleRegistry`] indexed by signal kind
//! - Disabled rules stay registered and are skipped at lookup time
//! - A rule that errors is logged and contributes no trigger; its siblings
//!   still run
//! - Rules read the player context and never mutate state
//!
//! # Enrichment policy
//!
//! Cheap facts are attached once by the signal processor. A rule that needs an
//! expensive lookup (see [`ClanActivityRule`]) first runs a pre-filter against
//! the context and only then calls out, failing loudly if its dependency was
//! never configured.

mod challenge_completion;
mod clan_activity;
mod engine;
mod error;
mod losing_streak;
mod rage_quit;
mod registry;
mod session_decline;

pub use challenge_completion::{ChallengeCompletionDetails, ChallengeCompletionRule};
pub use clan_activity::{ClanActivityDetails, ClanActivityRule};
pub use engine::{Evaluation, RuleEngine, RuleFailure};
pub use error::RuleError;
pub use losing_streak::{LosingStreakDetails, LosingStreakRule};
pub use rage_quit::{RageQuitDetails, RageQuitRule};
pub use registry::RuleRegistry;
pub use session_decline::{SessionDeclineDetails, SessionDeclineRule};

use async_trait::async_trait;
use churn_core::{Signal, SignalKind, Trigger};
use tokio_util::sync::CancellationToken;

/// Stateless predicate over a signal that may emit a trigger.
#[async_trait]
pub trait Rule: Send + Sync {
    /// Unique identifier, also used as the key of the rule's action binding.
    fn id(&self) -> &str;

    /// Signal kinds this rule wants to see. An empty slice matches every kind.
    fn signal_kinds(&self) -> &[SignalKind];

    /// Ordering weight of the emitted trigger. Higher executes first.
    fn priority(&self) -> i32 {
        0
    }

    /// Evaluate the rule.
    ///
    /// Returns `Ok(Some(trigger))` when the rule fires, `Ok(None)` when it does
    /// not, and `Err` when it could not decide. Errors are isolated to this
    /// rule by the engine.
    async fn evaluate(
        &self,
        signal: &Signal,
        cancel: &CancellationToken,
    ) -> Result<Option<Trigger>, RuleError>;
}
