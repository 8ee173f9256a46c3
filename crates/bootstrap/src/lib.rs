//! Shared bootstrap utilities for churn pipeline hosts.
//!
//! Provides configuration loading and pipeline assembly that can be reused by
//! the daemon or any other host that embeds the pipeline.
pub mod builder;
pub mod config;

pub use builder::{ChurnBuilder, ChurnSetup};
pub use config::{
    ActionsConfig, DispatchSettings, GrantItemConfig, IncrementStatConfig, PipelineConfig,
    RecordSignalConfig, ResetStatConfig, RuleConfig, RuleOverride, StatsConfig, StoreConfig,
    StoreKind,
};
