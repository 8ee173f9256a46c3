//! Sequential action runner with optional reverse-order rollback.

use std::sync::Arc;

use churn_core::{ChurnState, Trigger};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::{Action, ActionError, ActionOutcome, ActionRegistry};

#[derive(Debug)]
pub struct ActionFailure {
    pub action_id: String,
    pub error: ActionError,
}

/// Result of a rollback pass.
#[derive(Debug, Default)]
pub struct RollbackReport {
    /// Actions undone, in the order their rollback ran.
    pub rolled_back: Vec<String>,
    /// Actions that could not be undone, including those without rollback support.
    pub failures: Vec<ActionFailure>,
}

impl RollbackReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// What happened to one trigger's action batch.
#[derive(Debug, Default)]
pub struct ExecutionReport {
    pub rule_id: String,
    /// Actions that ran to completion, in execution order.
    pub executed: Vec<String>,
    /// Subset of `executed` that reported nothing to do.
    pub unchanged: Vec<String>,
    pub failures: Vec<ActionFailure>,
    /// Actions never started because the batch stopped early.
    pub skipped: Vec<String>,
    /// Present when a failure triggered rollback.
    pub rollback: Option<RollbackReport>,
    /// Cancellation stopped the batch before it finished.
    pub cancelled: bool,
}

impl ExecutionReport {
    fn new(rule_id: &str) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    pub fn is_partial_rollback(&self) -> bool {
        self.rollback.as_ref().is_some_and(|r| !r.is_complete())
    }
}

struct Applied {
    action: Arc<dyn Action>,
    record_id: Option<String>,
}

/// Runs action batches for triggers.
///
/// Actions run one at a time in the order given. Before each action the
/// executor copies the state; if the action fails the copy is restored, so a
/// failed action never leaves half-written changes behind.
///
/// With `rollback_on_error`, the first failure stops the batch and every
/// action already applied is rolled back in reverse order. Without it, the
/// remaining actions still run and every failure is collected.
#[derive(Clone)]
pub struct ActionExecutor {
    registry: Arc<ActionRegistry>,
}

impl ActionExecutor {
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    pub async fn execute(
        &self,
        trigger: &Trigger,
        action_ids: &[String],
        state: &mut ChurnState,
        rollback_on_error: bool,
        cancel: &CancellationToken,
    ) -> ExecutionReport {
        let mut report = ExecutionReport::new(&trigger.rule_id);
        let mut applied: Vec<Applied> = Vec::new();

        for (index, action_id) in action_ids.iter().enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                report.skipped = action_ids[index..].to_vec();
                break;
            }

            let outcome = match self.lookup(action_id) {
                Ok(action) => {
                    let snapshot = state.clone();
                    match action.execute(trigger, state, cancel).await {
                        Ok(outcome) => Ok((action, outcome)),
                        Err(err) => {
                            *state = snapshot;
                            Err(err)
                        }
                    }
                }
                Err(err) => Err(err),
            };

            match outcome {
                Ok((action, ActionOutcome::Applied { record_id })) => {
                    debug!(
                        target: "pipeline::actions",
                        action_id = %action_id,
                        rule_id = %trigger.rule_id,
                        user_id = %trigger.user_id,
                        "action applied"
                    );
                    report.executed.push(action_id.clone());
                    applied.push(Applied { action, record_id });
                }
                Ok((_, ActionOutcome::Unchanged)) => {
                    debug!(
                        target: "pipeline::actions",
                        action_id = %action_id,
                        user_id = %trigger.user_id,
                        "action had nothing to do"
                    );
                    report.executed.push(action_id.clone());
                    report.unchanged.push(action_id.clone());
                }
                Err(ActionError::Cancelled(_)) => {
                    warn!(
                        target: "pipeline::actions",
                        action_id = %action_id,
                        user_id = %trigger.user_id,
                        "action cancelled"
                    );
                    report.cancelled = true;
                    report.skipped = action_ids[index..].to_vec();
                    break;
                }
                Err(err) => {
                    error!(
                        target: "pipeline::actions",
                        action_id = %action_id,
                        rule_id = %trigger.rule_id,
                        user_id = %trigger.user_id,
                        error = %err,
                        "action failed"
                    );
                    report.failures.push(ActionFailure {
                        action_id: action_id.clone(),
                        error: err,
                    });
                    if rollback_on_error {
                        report.skipped = action_ids[index + 1..].to_vec();
                        break;
                    }
                }
            }
        }

        let stopped = report.cancelled || !report.failures.is_empty();
        if rollback_on_error && stopped {
            report.rollback = Some(self.rollback(trigger, applied, state).await);
        }
        report
    }

    fn lookup(&self, action_id: &str) -> Result<Arc<dyn Action>, ActionError> {
        match self.registry.get(action_id) {
            Ok(Some(action)) => Ok(action),
            Ok(None) => Err(ActionError::ActionNotFound(action_id.to_string())),
            Err(source) => Err(ActionError::Registry {
                action_id: action_id.to_string(),
                source,
            }),
        }
    }

    async fn rollback(
        &self,
        trigger: &Trigger,
        applied: Vec<Applied>,
        state: &mut ChurnState,
    ) -> RollbackReport {
        let mut report = RollbackReport::default();

        for Applied { action, record_id } in applied.into_iter().rev() {
            let action_id = action.id().to_string();
            let snapshot = state.clone();
            match action.rollback(trigger, record_id.as_deref(), state).await {
                Ok(()) => {
                    debug!(
                        target: "pipeline::actions",
                        action_id = %action_id,
                        "action rolled back"
                    );
                    report.rolled_back.push(action_id);
                }
                Err(err) => {
                    *state = snapshot;
                    warn!(
                        target: "pipeline::actions",
                        action_id = %action_id,
                        user_id = %trigger.user_id,
                        error = %err,
                        "rollback incomplete"
                    );
                    report.failures.push(ActionFailure {
                        action_id,
                        error: err,
                    });
                }
            }
        }
        report
    }
}
