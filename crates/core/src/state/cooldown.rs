//! Intervention cooldown bookkeeping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// Suppression window and per-type counters for interventions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Cooldown {
    pub last_intervention_at: Option<Timestamp>,
    /// Never moves backwards; see [`Cooldown::extend`].
    pub cooldown_until: Option<Timestamp>,
    pub intervention_counts: BTreeMap<String, u32>,
    pub last_signal_at: BTreeMap<String, Timestamp>,
}

impl Cooldown {
    pub fn is_active(&self, now: Timestamp) -> bool {
        self.cooldown_until.is_some_and(|until| until > now)
    }

    /// Push the cooldown out to `until`, keeping the later of the two deadlines.
    pub fn extend(&mut self, now: Timestamp, until: Timestamp) {
        self.last_intervention_at = Some(now);
        self.cooldown_until = Some(match self.cooldown_until {
            Some(current) if current > until => current,
            _ => until,
        });
    }

    pub fn record_intervention(&mut self, kind: &str) -> u32 {
        let count = self.intervention_counts.entry(kind.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn note_signal(&mut self, kind: &str, at: Timestamp) {
        self.last_signal_at.insert(kind.to_string(), at);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    #[test]
    fn extend_is_monotonic() {
        let now = Utc::now();
        let mut cooldown = Cooldown::default();
        let mut previous = None;

        let deadlines = [48, 12, 72, 1, 72];
        for (step, hours) in deadlines.into_iter().enumerate() {
            let at = now + Duration::hours(step as i64);
            cooldown.extend(at, at + Duration::hours(hours));
            assert!(cooldown.cooldown_until >= previous);
            previous = cooldown.cooldown_until;
        }
        assert_eq!(cooldown.cooldown_until, Some(now + Duration::hours(76)));
    }

    #[test]
    fn counters_accumulate_per_kind() {
        let mut cooldown = Cooldown::default();
        assert_eq!(cooldown.record_intervention("comeback_challenge"), 1);
        assert_eq!(cooldown.record_intervention("comeback_challenge"), 2);
        assert_eq!(cooldown.record_intervention("grant_item"), 1);
    }
}
