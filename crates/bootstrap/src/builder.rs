//! Assembles a [`PipelineManager`] from [`PipelineConfig`] and injected services.
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use pipeline::{
    Action, ChallengeCompletionRule, ClanActivityRule, ClanDirectory, ComebackChallengeAction,
    FileStateStore, FulfillmentService, GrantItemAction, InMemoryStateStore, IncrementStatAction,
    LoginHandler, LosingStreakRule, PipelineManager, RageQuitRule, RecordSignalAction,
    ResetStatAction, Rule, SessionDeclineRule, SessionTracker, StateStore, StatisticHandler,
};
use tracing::{info, warn};

use crate::config::{PipelineConfig, RuleConfig, StoreKind};

/// Builder that wires configured rules, actions, and bindings around the
/// services supplied by the host.
///
/// Actions that call the game platform are only registered when a
/// [`FulfillmentService`] is provided; bindings naming them are dropped
/// with a warning otherwise.
pub struct ChurnBuilder {
    config: PipelineConfig,
    fulfillment: Option<Arc<dyn FulfillmentService>>,
    clan_directory: Option<Arc<dyn ClanDirectory>>,
    session_tracker: Option<Arc<dyn SessionTracker>>,
    store: Option<Arc<dyn StateStore>>,
}

impl ChurnBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            fulfillment: None,
            clan_directory: None,
            session_tracker: None,
            store: None,
        }
    }

    pub fn fulfillment(mut self, fulfillment: Arc<dyn FulfillmentService>) -> Self {
        self.fulfillment = Some(fulfillment);
        self
    }

    pub fn clan_directory(mut self, directory: Arc<dyn ClanDirectory>) -> Self {
        self.clan_directory = Some(directory);
        self
    }

    pub fn session_tracker(mut self, tracker: Arc<dyn SessionTracker>) -> Self {
        self.session_tracker = Some(tracker);
        self
    }

    /// Use this store instead of the one described by the configuration.
    pub fn store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<ChurnSetup> {
        self.config.validate()?;

        let store = match self.store.clone() {
            Some(store) => store,
            None => self.open_store()?,
        };

        let login = match &self.session_tracker {
            Some(tracker) => LoginHandler::with_tracker(Arc::clone(tracker)),
            None => LoginHandler::new(),
        };

        let mut builder = PipelineManager::builder()
            .namespace(self.config.namespace.clone())
            .store(store)
            .handler(Arc::new(login))
            .handler(Arc::new(StatisticHandler::new(self.config.stat_codes())));

        let actions = self.actions();
        let action_ids: Vec<String> = actions.iter().map(|a| a.id().to_string()).collect();
        for action in actions {
            builder = builder.action(action);
        }

        for rule_id in PipelineConfig::KNOWN_RULES {
            let settings = self.config.rule(rule_id);
            let rule = self.rule(rule_id, &settings)?;
            builder = builder.rule_with_state(rule, settings.enabled);

            let bound: Vec<String> = settings
                .actions
                .iter()
                .filter(|id| {
                    let available = action_ids.contains(*id) || !needs_fulfillment(id);
                    if !available {
                        warn!(
                            target: "churn::bootstrap",
                            rule_id,
                            action_id = %id,
                            "no fulfillment service, dropping action from binding"
                        );
                    }
                    available
                })
                .cloned()
                .collect();
            if !bound.is_empty() {
                builder = builder.bind(rule_id, bound, settings.rollback_on_error);
            }
        }

        let manager = builder
            .build()
            .context("Failed to assemble churn pipeline")?;
        info!(
            target: "churn::bootstrap",
            namespace = %self.config.namespace,
            store = %self.config.store.kind,
            rules = ?manager.rules().ids(),
            actions = ?manager.actions().ids(),
            "pipeline assembled"
        );

        Ok(ChurnSetup {
            config: self.config,
            manager: Arc::new(manager),
        })
    }

    fn open_store(&self) -> Result<Arc<dyn StateStore>> {
        let ttl = chrono::Duration::days(self.config.store.ttl_days);
        Ok(match self.config.store.kind {
            StoreKind::Memory => Arc::new(InMemoryStateStore::with_ttl(ttl)),
            StoreKind::File => {
                let dir = self.config.store.state_dir();
                let store = FileStateStore::with_ttl(&dir, ttl).with_context(|| {
                    format!("Failed to open state directory {}", dir.display())
                })?;
                Arc::new(store)
            }
        })
    }

    fn rule(&self, rule_id: &str, settings: &RuleConfig) -> Result<Arc<dyn Rule>> {
        let rule: Arc<dyn Rule> = match rule_id {
            SessionDeclineRule::ID => {
                let rule = SessionDeclineRule::new(ComebackChallengeAction::ID);
                Arc::new(with_priority(rule, settings, SessionDeclineRule::with_priority))
            }
            ChallengeCompletionRule::ID => Arc::new(with_priority(
                ChallengeCompletionRule::new(),
                settings,
                ChallengeCompletionRule::with_priority,
            )),
            RageQuitRule::ID => {
                let threshold = settings.threshold.unwrap_or(RageQuitRule::DEFAULT_THRESHOLD);
                Arc::new(with_priority(
                    RageQuitRule::new(threshold),
                    settings,
                    RageQuitRule::with_priority,
                ))
            }
            LosingStreakRule::ID => {
                let threshold = settings
                    .threshold
                    .unwrap_or(LosingStreakRule::DEFAULT_THRESHOLD);
                Arc::new(with_priority(
                    LosingStreakRule::new(threshold),
                    settings,
                    LosingStreakRule::with_priority,
                ))
            }
            ClanActivityRule::ID => {
                let mut rule = ClanActivityRule::new(self.clan_directory.clone());
                if let Some(min) = settings.min_active_members {
                    rule = rule.with_min_active_members(min);
                }
                if settings.enabled && self.clan_directory.is_none() {
                    warn!(
                        target: "churn::bootstrap",
                        rule_id,
                        "clan activity enabled without a clan directory"
                    );
                }
                Arc::new(with_priority(rule, settings, ClanActivityRule::with_priority))
            }
            other => bail!("unknown rule {other:?}"),
        };
        Ok(rule)
    }

    fn actions(&self) -> Vec<Arc<dyn Action>> {
        let config = &self.config.actions;
        let mut actions: Vec<Arc<dyn Action>> = vec![
            Arc::new(RecordSignalAction::new(config.record_signal.severity.clone())),
            Arc::new(ComebackChallengeAction::new(config.comeback_challenge)),
        ];

        let Some(fulfillment) = &self.fulfillment else {
            return actions;
        };

        actions.push(Arc::new(GrantItemAction::new(
            Arc::clone(fulfillment),
            config.grant_item.item_id.clone(),
            config.grant_item.quantity,
        )));
        let reset_code = config
            .reset_stat
            .stat_code
            .clone()
            .unwrap_or_else(|| self.config.stats.rage_quit_code.clone());
        actions.push(Arc::new(ResetStatAction::new(Arc::clone(fulfillment), reset_code)));
        if let Some(increment) = &config.increment_stat {
            actions.push(Arc::new(
                IncrementStatAction::new(
                    Arc::clone(fulfillment),
                    increment.stat_code.clone(),
                    increment.delta,
                )
                .with_id(increment.id.clone()),
            ));
        }
        actions
    }
}

fn with_priority<R>(rule: R, settings: &RuleConfig, apply: fn(R, i32) -> R) -> R {
    match settings.priority {
        Some(priority) => apply(rule, priority),
        None => rule,
    }
}

fn needs_fulfillment(action_id: &str) -> bool {
    matches!(
        action_id,
        GrantItemAction::ID | ResetStatAction::ID | IncrementStatAction::ID
    )
}

/// A configured pipeline ready to be served.
pub struct ChurnSetup {
    pub config: PipelineConfig,
    pub manager: Arc<PipelineManager>,
}
