//! Appends the trigger to the player's risk history.

use std::collections::BTreeMap;

use async_trait::async_trait;
use churn_core::{ChurnState, Severity, SignalRecord, Trigger};
use tokio_util::sync::CancellationToken;

use super::{Action, ActionError, ActionOutcome};

/// Writes a [`SignalRecord`] for the trigger's rule.
///
/// Severity is looked up by rule id, falling back to the default severity.
#[derive(Debug, Clone, Default)]
pub struct RecordSignalAction {
    severities: BTreeMap<String, Severity>,
}

impl RecordSignalAction {
    pub const ID: &'static str = "record_signal";

    pub fn new(severities: BTreeMap<String, Severity>) -> Self {
        Self { severities }
    }

    pub fn severity_for(&self, rule_id: &str) -> Severity {
        self.severities.get(rule_id).copied().unwrap_or_default()
    }
}

#[async_trait]
impl Action for RecordSignalAction {
    fn id(&self) -> &str {
        Self::ID
    }

    fn supports_rollback(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        trigger: &Trigger,
        state: &mut ChurnState,
        _cancel: &CancellationToken,
    ) -> Result<ActionOutcome, ActionError> {
        let mut metadata = trigger.metadata.clone();
        metadata.insert("reason".into(), trigger.reason.clone().into());

        state.signal_history.push(SignalRecord {
            kind: trigger.rule_id.clone(),
            detected_at: trigger.timestamp,
            severity: self.severity_for(&trigger.rule_id),
            metadata,
        });
        Ok(ActionOutcome::applied())
    }

    /// Removes the most recent record this trigger appended.
    async fn rollback(
        &self,
        trigger: &Trigger,
        _record_id: Option<&str>,
        state: &mut ChurnState,
    ) -> Result<(), ActionError> {
        if let Some(index) = state
            .signal_history
            .iter()
            .rposition(|r| r.kind == trigger.rule_id && r.detected_at == trigger.timestamp)
        {
            state.signal_history.remove(index);
        }
        Ok(())
    }
}
