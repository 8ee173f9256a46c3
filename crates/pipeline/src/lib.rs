//! Signal → rule → action evaluation pipeline for churn detection.
//!
//! This crate turns raw player events into interventions. Consumers build a
//! [`PipelineManager`] and either call it directly per event or run it behind
//! a [`PipelineService`] and feed it through a [`PipelineHandle`].
//!
//! Modules are organized by responsibility:
//! - [`signals`] converts raw events into enriched signals
//! - [`rules`] hosts the rule trait, registry, engine, and built-in rules
//! - [`actions`] hosts the action trait, registry, executor, and built-in actions
//! - [`repository`] provides the state store contract and its implementations
//! - [`manager`] orchestrates one event end to end
//! - [`api`] exposes errors, external service contracts, and the handle
//! - [`workers`] keeps the dispatcher internal to the crate
pub mod actions;
pub mod api;
pub mod manager;
pub mod repository;
pub mod rules;
pub mod service;
pub mod signals;

mod workers;

pub use actions::{
    Action, ActionError, ActionExecutor, ActionFailure, ActionOutcome, ActionRegistry,
    ComebackChallengeAction, ComebackChallengeConfig, ExecutionReport, GrantItemAction,
    IncrementStatAction, RecordSignalAction, ResetStatAction, RollbackReport,
};
pub use api::{
    ClanActivity, ClanDirectory, FulfillmentService, InMemorySessionTracker, PipelineError,
    PipelineHandle, RegistryError, Result, ServiceError, SessionTracker,
};
pub use manager::{ActionBinding, PipelineBuilder, PipelineManager, PipelineReport};
pub use repository::{FileStateStore, InMemoryStateStore, StateStore, StoreError};
pub use rules::{
    ChallengeCompletionRule, ClanActivityRule, Evaluation, LosingStreakRule, RageQuitRule, Rule,
    RuleEngine, RuleError, RuleFailure, RuleRegistry, SessionDeclineRule,
};
pub use service::PipelineService;
pub use signals::{
    EventHandler, LoginHandler, RawEvent, SignalError, SignalProcessor, StatCodes,
    StatisticHandler,
};
pub use workers::DispatchConfig;
