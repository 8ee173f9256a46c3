//! Top-level orchestration of one event through the pipeline.
//!
//! ```text
//! RawEvent ─► SignalProcessor ─► Signal ─► RuleEngine ─► [Trigger]
//!                   │                                        │
//!              StateStore::load                      ActionExecutor (per binding)
//!                                                            │
//!                                                   StateStore::save (once)
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use churn_core::{LifecycleReport, SignalKind, Trigger};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::actions::{Action, ActionExecutor, ActionRegistry, ExecutionReport};
use crate::api::{PipelineError, Result};
use crate::repository::StateStore;
use crate::rules::{Rule, RuleEngine, RuleFailure, RuleRegistry};
use crate::signals::{
    EventHandler, LoginHandler, RawEvent, SignalProcessor, StatCodes, StatisticHandler,
};

/// Ordered action ids a rule's triggers run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionBinding {
    pub actions: Vec<String>,
    pub rollback_on_error: bool,
}

/// Everything that happened while processing one event.
#[derive(Debug)]
pub struct PipelineReport {
    pub user_id: String,
    pub signal_kind: SignalKind,
    /// Triggers in execution order.
    pub triggers: Vec<Trigger>,
    pub rule_failures: Vec<RuleFailure>,
    /// One report per trigger that had a binding.
    pub executions: Vec<ExecutionReport>,
    pub lifecycle: LifecycleReport,
    /// The working state was written back to the store.
    pub saved: bool,
    /// Cancellation stopped the action stage early.
    pub cancelled: bool,
}

impl PipelineReport {
    pub fn fired(&self, rule_id: &str) -> bool {
        self.triggers.iter().any(|t| t.rule_id == rule_id)
    }

    pub fn execution(&self, rule_id: &str) -> Option<&ExecutionReport> {
        self.executions.iter().find(|e| e.rule_id == rule_id)
    }

    pub fn is_clean(&self) -> bool {
        self.rule_failures.is_empty() && self.executions.iter().all(ExecutionReport::is_success)
    }
}

/// Wires signal processing, rule evaluation, and action execution for a
/// single event, and owns the read-modify-write cycle of the player's state.
///
/// Every stage runs sequentially on the caller's task. The state is loaded
/// once by the signal processor, copied after rule evaluation, mutated by the
/// lifecycle step and the actions, and saved exactly once. An event that
/// fails before the action stage writes nothing.
pub struct PipelineManager {
    processor: SignalProcessor,
    engine: RuleEngine,
    executor: ActionExecutor,
    store: Arc<dyn StateStore>,
    bindings: HashMap<String, ActionBinding>,
}

impl PipelineManager {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn processor(&self) -> &SignalProcessor {
        &self.processor
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    pub fn executor(&self) -> &ActionExecutor {
        &self.executor
    }

    pub fn rules(&self) -> &Arc<RuleRegistry> {
        self.engine.registry()
    }

    pub fn actions(&self) -> &Arc<ActionRegistry> {
        self.executor.registry()
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub fn binding(&self, rule_id: &str) -> Option<&ActionBinding> {
        self.bindings.get(rule_id)
    }

    /// Run one event through the pipeline.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Signal`] for rejected input or a failed state load
    /// - [`PipelineError::Cancelled`] if cancelled before the action stage
    /// - [`PipelineError::Store`] if the final save fails
    /// - [`PipelineError::Interrupted`] if cancelled during the action stage;
    ///   the state produced so far has been saved and the report says what ran
    pub async fn process_event(
        &self,
        event: &RawEvent,
        cancel: &CancellationToken,
    ) -> Result<PipelineReport> {
        let signal = self.processor.process(event, cancel).await.map_err(|err| {
            if err.is_input_error() {
                warn!(
                    target: "pipeline::manager",
                    event_type = %event.event_type,
                    error = %err,
                    "event rejected"
                );
            } else {
                error!(
                    target: "pipeline::manager",
                    event_type = %event.event_type,
                    error = %err,
                    payload = %event.payload,
                    "signal processing failed"
                );
            }
            PipelineError::from(err)
        })?;

        let evaluation = self.engine.evaluate(&signal, cancel).await?;
        let user_id = signal.user_id().to_string();

        // Rules saw the loaded snapshot; everything below works on a copy.
        let mut state = (*signal.context().state).clone();
        let lifecycle = state.apply_lifecycle(&signal);

        let mut report = PipelineReport {
            user_id: user_id.clone(),
            signal_kind: signal.kind(),
            triggers: Vec::with_capacity(evaluation.triggers.len()),
            rule_failures: evaluation.failures,
            executions: Vec::new(),
            lifecycle,
            saved: false,
            cancelled: false,
        };

        for trigger in evaluation.triggers {
            if report.cancelled {
                report.triggers.push(trigger);
                continue;
            }
            match self.bindings.get(&trigger.rule_id) {
                Some(binding) if !binding.actions.is_empty() => {
                    let execution = self
                        .executor
                        .execute(
                            &trigger,
                            &binding.actions,
                            &mut state,
                            binding.rollback_on_error,
                            cancel,
                        )
                        .await;
                    report.cancelled = execution.cancelled;
                    report.executions.push(execution);
                }
                _ => {
                    debug!(
                        target: "pipeline::manager",
                        rule_id = %trigger.rule_id,
                        user_id = %user_id,
                        "trigger has no bound actions"
                    );
                }
            }
            report.triggers.push(trigger);
        }

        self.store.save(&user_id, &state).await.map_err(|err| {
            error!(
                target: "pipeline::manager",
                user_id = %user_id,
                error = %err,
                "state save failed"
            );
            PipelineError::from(err)
        })?;
        report.saved = true;

        if report.cancelled {
            warn!(
                target: "pipeline::manager",
                user_id = %user_id,
                executed = report.executions.len(),
                "event interrupted during actions"
            );
            return Err(PipelineError::Interrupted(Box::new(report)));
        }

        info!(
            target: "pipeline::manager",
            user_id = %user_id,
            kind = %report.signal_kind,
            triggers = report.triggers.len(),
            clean = report.is_clean(),
            "event processed"
        );
        Ok(report)
    }
}

/// Builder for [`PipelineManager`].
///
/// Rule → action bindings are validated at [`build`](PipelineBuilder::build):
/// a binding naming an unregistered action is rejected.
pub struct PipelineBuilder {
    namespace: String,
    store: Option<Arc<dyn StateStore>>,
    handlers: Vec<Arc<dyn EventHandler>>,
    rules: Vec<(Arc<dyn Rule>, bool)>,
    actions: Vec<Arc<dyn Action>>,
    bindings: HashMap<String, ActionBinding>,
}

impl PipelineBuilder {
    fn new() -> Self {
        Self {
            namespace: "default".to_string(),
            store: None,
            handlers: Vec::new(),
            rules: Vec::new(),
            actions: Vec::new(),
            bindings: HashMap::new(),
        }
    }

    /// Namespace recorded for events that do not carry one.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the required state store.
    pub fn store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Add an event handler. Without any, the login and statistic handlers
    /// with default stat codes are installed.
    pub fn handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn rule(self, rule: Arc<dyn Rule>) -> Self {
        self.rule_with_state(rule, true)
    }

    pub fn rule_with_state(mut self, rule: Arc<dyn Rule>, enabled: bool) -> Self {
        self.rules.push((rule, enabled));
        self
    }

    pub fn action(mut self, action: Arc<dyn Action>) -> Self {
        self.actions.push(action);
        self
    }

    /// Bind `rule_id` to an ordered list of action ids, replacing any earlier binding.
    pub fn bind<I, S>(
        mut self,
        rule_id: impl Into<String>,
        actions: I,
        rollback_on_error: bool,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bindings.insert(
            rule_id.into(),
            ActionBinding {
                actions: actions.into_iter().map(Into::into).collect(),
                rollback_on_error,
            },
        );
        self
    }

    pub fn build(self) -> Result<PipelineManager> {
        let store = self.store.ok_or(PipelineError::MissingStore)?;

        let mut processor = SignalProcessor::new(Arc::clone(&store), self.namespace);
        if self.handlers.is_empty() {
            processor.register(Arc::new(LoginHandler::new()));
            processor.register(Arc::new(StatisticHandler::new(StatCodes::default())));
        }
        for handler in self.handlers {
            processor.register(handler);
        }

        let rules = Arc::new(RuleRegistry::new());
        for (rule, enabled) in self.rules {
            rules.register_with_state(rule, enabled)?;
        }

        let actions = Arc::new(ActionRegistry::new());
        for action in self.actions {
            actions.register(action)?;
        }

        for (rule_id, binding) in &self.bindings {
            if let Some(action_id) = binding.actions.iter().find(|id| !actions.contains(id)) {
                return Err(PipelineError::UnknownActionBinding {
                    rule_id: rule_id.clone(),
                    action_id: action_id.clone(),
                });
            }
            if !rules.contains(rule_id) {
                warn!(
                    target: "pipeline::manager",
                    rule_id = %rule_id,
                    "binding for unregistered rule"
                );
            }
        }

        Ok(PipelineManager {
            processor,
            engine: RuleEngine::new(rules),
            executor: ActionExecutor::new(actions),
            store,
            bindings: self.bindings,
        })
    }
}
