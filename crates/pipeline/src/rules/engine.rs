//! Evaluates registry-matched rules against a signal.

use std::sync::Arc;

use churn_core::{Signal, Trigger};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::{RuleError, RuleRegistry};
use crate::api::{PipelineError, Result};

/// A rule that could not decide.
#[derive(Debug)]
pub struct RuleFailure {
    pub rule_id: String,
    pub error: RuleError,
}

/// Outcome of evaluating one signal.
#[derive(Debug, Default)]
pub struct Evaluation {
    /// Triggers sorted by priority, highest first. Equal priorities carry no
    /// ordering guarantee.
    pub triggers: Vec<Trigger>,
    /// Rules that errored. They contributed no trigger.
    pub failures: Vec<RuleFailure>,
}

impl Evaluation {
    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }
}

/// Runs every enabled rule that matches a signal's kind.
///
/// Rules run one after another on the caller's task. A failing rule is logged
/// and skipped; only a registry failure or cancellation aborts evaluation.
#[derive(Clone)]
pub struct RuleEngine {
    registry: Arc<RuleRegistry>,
}

impl RuleEngine {
    pub fn new(registry: Arc<RuleRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    /// Evaluate all matching rules and return their triggers by priority.
    ///
    /// An empty signal yields an empty evaluation.
    pub async fn evaluate(
        &self,
        signal: &Signal,
        cancel: &CancellationToken,
    ) -> Result<Evaluation> {
        if signal.is_empty() {
            return Ok(Evaluation::default());
        }

        let rules = self.registry.get_by_signal_kind(signal.kind())?;
        let mut evaluation = Evaluation::default();

        for rule in rules {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            match rule.evaluate(signal, cancel).await {
                Ok(Some(trigger)) => {
                    debug!(
                        target: "pipeline::rules",
                        rule_id = rule.id(),
                        user_id = signal.user_id(),
                        priority = trigger.priority,
                        reason = %trigger.reason,
                        "rule fired"
                    );
                    evaluation.triggers.push(trigger);
                }
                Ok(None) => {}
                Err(RuleError::Cancelled(_)) if cancel.is_cancelled() => {
                    return Err(PipelineError::Cancelled);
                }
                Err(err) => {
                    error!(
                        target: "pipeline::rules",
                        rule_id = rule.id(),
                        user_id = signal.user_id(),
                        error = %err,
                        "rule failed, continuing"
                    );
                    evaluation.failures.push(RuleFailure {
                        rule_id: rule.id().to_string(),
                        error: err,
                    });
                }
            }
        }

        evaluation
            .triggers
            .sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(evaluation)
    }

    /// Evaluate a batch in input order and concatenate the triggers.
    ///
    /// Rule errors stay isolated; only a registry failure or cancellation
    /// stops the batch.
    pub async fn evaluate_multiple(
        &self,
        signals: &[Signal],
        cancel: &CancellationToken,
    ) -> Result<Vec<Trigger>> {
        let mut triggers = Vec::new();
        for signal in signals {
            triggers.extend(self.evaluate(signal, cancel).await?.triggers);
        }
        Ok(triggers)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;
    use churn_core::{ChurnState, PlayerContext, SignalKind, SignalPayload};

    use super::*;
    use crate::rules::Rule;

    struct Fixed {
        id: &'static str,
        priority: i32,
        fails: bool,
    }

    #[async_trait]
    impl Rule for Fixed {
        fn id(&self) -> &str {
            self.id
        }

        fn signal_kinds(&self) -> &[SignalKind] {
            &[]
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        async fn evaluate(
            &self,
            signal: &Signal,
            _cancel: &CancellationToken,
        ) -> std::result::Result<Option<Trigger>, RuleError> {
            if self.fails {
                return Err(RuleError::MissingDependency {
                    rule_id: self.id.into(),
                    dependency: "nothing",
                });
            }
            Ok(Some(
                Trigger::new(self.id, signal, "fixed").with_priority(self.priority),
            ))
        }
    }

    fn fixed(id: &'static str, priority: i32) -> Fixed {
        Fixed {
            id,
            priority,
            fails: false,
        }
    }

    fn failing(id: &'static str, priority: i32) -> Fixed {
        Fixed {
            id,
            priority,
            fails: true,
        }
    }

    fn engine(rules: Vec<Fixed>) -> RuleEngine {
        let registry = Arc::new(RuleRegistry::new());
        for rule in rules {
            registry.register(Arc::new(rule)).unwrap();
        }
        RuleEngine::new(registry)
    }

    fn signal(user_id: &str) -> Signal {
        let now = Utc::now();
        let ctx = PlayerContext::new(user_id, "ns", None, ChurnState::default(), now);
        Signal::new(
            user_id,
            now,
            SignalPayload::RageQuit { quit_count: 1 },
            Arc::new(ctx),
        )
    }

    #[tokio::test]
    async fn triggers_come_back_highest_priority_first() {
        let engine = engine(vec![fixed("low", 1), fixed("high", 9), fixed("mid", 5)]);

        let eval = engine
            .evaluate(&signal("u1"), &CancellationToken::new())
            .await
            .unwrap();
        let order: Vec<_> = eval.triggers.iter().map(|t| t.rule_id.as_str()).collect();
        assert_eq!(order, vec!["high", "mid", "low"]);
    }

    #[tokio::test]
    async fn failing_rule_does_not_abort_siblings() {
        let engine = engine(vec![fixed("a", 1), failing("broken", 10), fixed("b", 2)]);

        let eval = engine
            .evaluate(&signal("u1"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(eval.triggers.len(), 2);
        assert_eq!(eval.failures.len(), 1);
        assert_eq!(eval.failures[0].rule_id, "broken");
    }

    #[tokio::test]
    async fn empty_signal_yields_nothing() {
        let engine = engine(vec![fixed("a", 1)]);
        let eval = engine
            .evaluate(&signal(""), &CancellationToken::new())
            .await
            .unwrap();
        assert!(eval.is_empty());
        assert!(eval.failures.is_empty());
    }

    #[tokio::test]
    async fn batch_keeps_input_order() {
        let engine = engine(vec![fixed("a", 1)]);
        let triggers = engine
            .evaluate_multiple(&[signal("u1"), signal("u2")], &CancellationToken::new())
            .await
            .unwrap();
        let users: Vec<_> = triggers.iter().map(|t| t.user_id.as_str()).collect();
        assert_eq!(users, vec!["u1", "u2"]);
    }

    #[tokio::test]
    async fn cancellation_stops_evaluation() {
        let engine = engine(vec![fixed("a", 1)]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = engine.evaluate(&signal("u1"), &cancel).await.unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
    }
}
