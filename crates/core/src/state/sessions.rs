//! Week-over-week session counters.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// Length of one session window.
pub const RESET_INTERVAL_DAYS: i64 = 7;

/// Cached, non-authoritative view of login frequency.
///
/// Only used to detect week-over-week decline. A reset moves `this_week` into
/// `last_week`, zeroes `this_week`, and stamps `last_reset`; it happens at most
/// once per window no matter how often it is requested.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Sessions {
    pub this_week: u32,
    pub last_week: u32,
    /// `None` until the first window is opened.
    pub last_reset: Option<Timestamp>,
}

impl Sessions {
    pub fn reset_interval() -> Duration {
        Duration::days(RESET_INTERVAL_DAYS)
    }

    /// True when a full window has elapsed since `last_reset`.
    pub fn reset_due(&self, now: Timestamp) -> bool {
        match self.last_reset {
            Some(last) => now - last >= Self::reset_interval(),
            None => false,
        }
    }

    /// Decline as of `now`: a window has closed, the prior window had activity,
    /// and the current one has none. Must be read before [`Sessions::roll_over`],
    /// which erases the evidence.
    pub fn is_declining(&self, now: Timestamp) -> bool {
        self.reset_due(now) && self.last_week > 0 && self.this_week == 0
    }

    /// Apply the lazy weekly reset. Returns `true` if a reset happened.
    ///
    /// The first call on a fresh record only opens the window.
    pub fn roll_over(&mut self, now: Timestamp) -> bool {
        match self.last_reset {
            None => {
                self.last_reset = Some(now);
                false
            }
            Some(_) if self.reset_due(now) => {
                self.last_week = self.this_week;
                self.this_week = 0;
                self.last_reset = Some(now);
                true
            }
            Some(_) => false,
        }
    }

    pub fn record_session(&mut self) {
        self.this_week = self.this_week.saturating_add(1);
    }
}
