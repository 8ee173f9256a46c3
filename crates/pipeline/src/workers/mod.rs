//! Worker tasks that back the pipeline service.
//!
//! The dispatcher accepts events over a bounded channel and runs each one on
//! its own task, capped by a semaphore and bounded by a per-event deadline.

mod dispatcher;

pub use dispatcher::{Command, DispatchConfig, Dispatcher};
