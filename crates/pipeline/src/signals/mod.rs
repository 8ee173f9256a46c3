//! Conversion of raw inbound events into enriched [`Signal`]s.
//!
//! The processor dispatches on the event type to a registered
//! [`EventHandler`]. Handlers parse the payload, load the player's state once,
//! and attach it to the signal as a shared [`PlayerContext`]. Cheap
//! enrichment belongs here; expensive or conditional lookups belong in the
//! rule that needs them.
//!
//! [`Signal`]: churn_core::Signal
//! [`PlayerContext`]: churn_core::PlayerContext

mod error;
mod login;
mod processor;
mod statistic;

pub use error::SignalError;
pub use login::{LOGIN_EVENT, LoginHandler};
pub use processor::{EventHandler, HandlerEnv, RawEvent, SignalProcessor};
pub use statistic::{STATISTIC_EVENT, StatCodes, StatisticHandler};
