//! Public pipeline API surface.
//!
//! This module gathers the types exposed to consumers of the pipeline crate:
//! errors, the external collaborator contracts, and the dispatcher handle.

pub mod errors;
pub mod handle;
pub mod services;

pub use errors::{PipelineError, RegistryError, Result};
pub use handle::PipelineHandle;
pub use services::{
    ClanActivity, ClanDirectory, FulfillmentService, InMemorySessionTracker, ServiceError,
    SessionTracker,
};
