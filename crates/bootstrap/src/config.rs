//! Pipeline configuration structures and loaders.
//!
//! Configuration comes from an optional TOML file and is then adjusted by
//! environment variables. Every field has a default, so an empty file (or no
//! file at all) yields a working in-memory pipeline.
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use churn_core::Severity;
use pipeline::{
    ChallengeCompletionRule, ClanActivityRule, ComebackChallengeAction, ComebackChallengeConfig,
    DispatchConfig, GrantItemAction, IncrementStatAction, LosingStreakRule, RageQuitRule,
    RecordSignalAction, ResetStatAction, SessionDeclineRule, StatCodes,
};
use serde::{Deserialize, Serialize};

/// Top-level configuration for one pipeline instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Namespace recorded for events that do not name one.
    pub namespace: String,
    pub store: StoreConfig,
    pub stats: StatsConfig,
    /// Per-rule overrides keyed by rule id, applied field by field on top of
    /// the rule's built-in settings.
    pub rules: BTreeMap<String, RuleOverride>,
    pub actions: ActionsConfig,
    pub dispatch: DispatchSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            store: StoreConfig::default(),
            stats: StatsConfig::default(),
            rules: BTreeMap::new(),
            actions: ActionsConfig::default(),
            dispatch: DispatchSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Rule ids understood by the builder.
    pub const KNOWN_RULES: [&'static str; 5] = [
        SessionDeclineRule::ID,
        ChallengeCompletionRule::ID,
        RageQuitRule::ID,
        LosingStreakRule::ID,
        ClanActivityRule::ID,
    ];

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| anyhow::anyhow!("Failed to parse config TOML: {}", e))
    }

    /// Construct configuration from the process environment.
    ///
    /// Environment variables:
    /// - `CHURN_CONFIG` - TOML file to start from (default: built-in defaults)
    /// - `CHURN_NAMESPACE` - default namespace
    /// - `CHURN_STORE_KIND` - `memory` or `file`
    /// - `CHURN_STATE_DIR` - state directory; implies the file store
    /// - `CHURN_MAX_IN_FLIGHT` - concurrent events (minimum 1)
    /// - `CHURN_EVENT_TIMEOUT_SECS` - per-event deadline, `0` disables it
    pub fn from_env() -> Result<Self> {
        let mut config = match env::var_os("CHURN_CONFIG") {
            Some(path) => Self::load(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides read through `lookup`, using the same keys as [`from_env`](Self::from_env).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(namespace) = read("CHURN_NAMESPACE") {
            self.namespace = namespace;
        }
        if let Some(kind) = read("CHURN_STORE_KIND").and_then(|v| parse_value::<StoreKind>(&v)) {
            self.store.kind = kind;
        }
        if let Some(dir) = read("CHURN_STATE_DIR") {
            self.store.kind = StoreKind::File;
            self.store.dir = Some(PathBuf::from(dir));
        }
        if let Some(max) = read("CHURN_MAX_IN_FLIGHT").and_then(|v| parse_value::<usize>(&v)) {
            self.dispatch.max_in_flight = max.max(1);
        }
        if let Some(secs) = read("CHURN_EVENT_TIMEOUT_SECS").and_then(|v| parse_value::<u64>(&v)) {
            self.dispatch.event_timeout_secs = secs;
        }
    }

    /// Reject values the builder cannot use.
    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            bail!("namespace must not be empty");
        }
        if self.store.ttl_days <= 0 {
            bail!("store.ttl_days must be positive, got {}", self.store.ttl_days);
        }
        if self.dispatch.max_in_flight == 0 {
            bail!("dispatch.max_in_flight must be at least 1");
        }
        if let Some(unknown) = self
            .rules
            .keys()
            .find(|id| !Self::KNOWN_RULES.contains(&id.as_str()))
        {
            bail!("unknown rule {unknown:?} in [rules]");
        }
        let challenge = &self.actions.comeback_challenge;
        if challenge.wins_needed <= 0
            || challenge.duration_days <= 0
            || challenge.cooldown_hours < 0
        {
            bail!("actions.comeback_challenge values must be positive");
        }
        Ok(())
    }

    /// Effective settings for `rule_id`: built-in settings with any configured
    /// fields laid over them.
    pub fn rule(&self, rule_id: &str) -> RuleConfig {
        let defaults = RuleConfig::default_for(rule_id);
        match self.rules.get(rule_id) {
            Some(overrides) => overrides.apply(defaults),
            None => defaults,
        }
    }

    pub fn stat_codes(&self) -> StatCodes {
        StatCodes {
            rage_quit: self.stats.rage_quit_code.clone(),
            losing_streak: self.stats.losing_streak_code.clone(),
            total_wins: self.stats.total_wins_code.clone(),
        }
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            max_in_flight: self.dispatch.max_in_flight,
            event_timeout: (self.dispatch.event_timeout_secs > 0)
                .then(|| Duration::from_secs(self.dispatch.event_timeout_secs)),
            command_buffer_size: self.dispatch.command_buffer_size,
        }
    }
}

fn parse_value<T: FromStr>(value: &str) -> Option<T> {
    value.trim().parse().ok()
}

/// Which [`StateStore`](pipeline::StateStore) backs the pipeline.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum StoreKind {
    #[default]
    Memory,
    File,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    /// Directory for the file store (default: platform data directory).
    pub dir: Option<PathBuf>,
    /// Sliding expiry of player records.
    pub ttl_days: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Memory,
            dir: None,
            ttl_days: pipeline::repository::DEFAULT_TTL_DAYS,
        }
    }
}

impl StoreConfig {
    /// Directory used by the file store.
    ///
    /// Falls back to the platform data directory, then `./churn_state`.
    pub fn state_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            directories::ProjectDirs::from("", "", "churn")
                .map(|dirs| dirs.data_dir().join("state"))
                .unwrap_or_else(|| PathBuf::from("./churn_state"))
        })
    }
}

/// Platform stat codes mapped onto signal kinds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    pub rage_quit_code: String,
    pub losing_streak_code: String,
    pub total_wins_code: String,
}

impl Default for StatsConfig {
    fn default() -> Self {
        let codes = StatCodes::default();
        Self {
            rage_quit_code: codes.rage_quit,
            losing_streak_code: codes.losing_streak,
            total_wins_code: codes.total_wins,
        }
    }
}

/// Settings of one rule and its action binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleConfig {
    pub enabled: bool,
    pub priority: Option<i32>,
    /// Counter threshold for the rage-quit and losing-streak rules.
    pub threshold: Option<i64>,
    /// Minimum active members for the clan-activity rule.
    pub min_active_members: Option<u32>,
    /// Action ids run, in order, when the rule fires.
    pub actions: Vec<String>,
    pub rollback_on_error: bool,
}

/// A `[rules.<id>]` entry. Absent fields keep the built-in value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleOverride {
    pub enabled: Option<bool>,
    pub priority: Option<i32>,
    pub threshold: Option<i64>,
    pub min_active_members: Option<u32>,
    pub actions: Option<Vec<String>>,
    pub rollback_on_error: Option<bool>,
}

impl RuleOverride {
    pub fn apply(&self, base: RuleConfig) -> RuleConfig {
        RuleConfig {
            enabled: self.enabled.unwrap_or(base.enabled),
            priority: self.priority.or(base.priority),
            threshold: self.threshold.or(base.threshold),
            min_active_members: self.min_active_members.or(base.min_active_members),
            actions: self.actions.clone().unwrap_or(base.actions),
            rollback_on_error: self.rollback_on_error.unwrap_or(base.rollback_on_error),
        }
    }
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: None,
            threshold: None,
            min_active_members: None,
            actions: Vec::new(),
            rollback_on_error: false,
        }
    }
}

impl RuleConfig {
    /// Built-in binding for a rule that has no configuration entry.
    pub fn default_for(rule_id: &str) -> Self {
        let actions = |ids: &[&str]| ids.iter().map(|id| id.to_string()).collect();
        match rule_id {
            SessionDeclineRule::ID => Self {
                actions: actions(&[RecordSignalAction::ID, ComebackChallengeAction::ID]),
                rollback_on_error: true,
                ..Self::default()
            },
            ChallengeCompletionRule::ID => Self {
                actions: actions(&[GrantItemAction::ID]),
                ..Self::default()
            },
            RageQuitRule::ID => Self {
                actions: actions(&[RecordSignalAction::ID, ResetStatAction::ID]),
                ..Self::default()
            },
            LosingStreakRule::ID => Self {
                actions: actions(&[RecordSignalAction::ID]),
                ..Self::default()
            },
            // Needs a clan directory, so it is opt-in.
            ClanActivityRule::ID => Self {
                enabled: false,
                actions: actions(&[RecordSignalAction::ID]),
                ..Self::default()
            },
            _ => Self::default(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    pub comeback_challenge: ComebackChallengeConfig,
    pub grant_item: GrantItemConfig,
    pub reset_stat: ResetStatConfig,
    pub record_signal: RecordSignalConfig,
    /// Registered only when configured.
    pub increment_stat: Option<IncrementStatConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrantItemConfig {
    pub item_id: String,
    pub quantity: u32,
}

impl Default for GrantItemConfig {
    fn default() -> Self {
        Self {
            item_id: "comeback_chest".to_string(),
            quantity: 1,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetStatConfig {
    /// Statistic to reset (default: the rage-quit stat code).
    pub stat_code: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordSignalConfig {
    /// Severity recorded per rule id.
    pub severity: BTreeMap<String, Severity>,
}

impl Default for RecordSignalConfig {
    fn default() -> Self {
        Self {
            severity: BTreeMap::from([
                (SessionDeclineRule::ID.to_string(), Severity::High),
                (RageQuitRule::ID.to_string(), Severity::Medium),
                (LosingStreakRule::ID.to_string(), Severity::Medium),
                (ClanActivityRule::ID.to_string(), Severity::Low),
            ]),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementStatConfig {
    #[serde(default = "IncrementStatConfig::default_id")]
    pub id: String,
    pub stat_code: String,
    pub delta: i64,
}

impl IncrementStatConfig {
    fn default_id() -> String {
        IncrementStatAction::ID.to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    pub max_in_flight: usize,
    /// Per-event deadline in seconds; `0` disables it.
    pub event_timeout_secs: u64,
    pub command_buffer_size: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        let defaults = DispatchConfig::default();
        Self {
            max_in_flight: defaults.max_in_flight,
            event_timeout_secs: defaults.event_timeout.map(|d| d.as_secs()).unwrap_or(0),
            command_buffer_size: defaults.command_buffer_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = PipelineConfig::parse("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.store.ttl_days, 30);
        assert_eq!(config.actions.comeback_challenge.wins_needed, 3);
        config.validate().unwrap();
    }

    #[test]
    fn parses_full_file() {
        let config = PipelineConfig::parse(
            r#"
            namespace = "arena"

            [store]
            kind = "file"
            dir = "/var/lib/churn"
            ttl_days = 14

            [stats]
            rage_quit_code = "rq"

            [rules.rage_quit]
            threshold = 5
            priority = 70
            actions = ["record_signal", "grant_item"]
            rollback_on_error = true

            [rules.clan_activity]
            enabled = true
            min_active_members = 4

            [actions.comeback_challenge]
            wins_needed = 5

            [actions.grant_item]
            item_id = "gem_bag"
            quantity = 3

            [actions.record_signal.severity]
            rage_quit = "high"

            [actions.increment_stat]
            stat_code = "comebacks"
            delta = 1

            [dispatch]
            max_in_flight = 8
            event_timeout_secs = 0
            "#,
        )
        .unwrap();
        config.validate().unwrap();

        assert_eq!(config.namespace, "arena");
        assert_eq!(config.store.kind, StoreKind::File);
        assert_eq!(config.store.state_dir(), PathBuf::from("/var/lib/churn"));
        assert_eq!(config.stat_codes().rage_quit, "rq");
        assert_eq!(config.stat_codes().total_wins, "total-wins");

        let rage = config.rule(RageQuitRule::ID);
        assert_eq!(rage.threshold, Some(5));
        assert_eq!(rage.actions, vec!["record_signal", "grant_item"]);
        assert!(rage.rollback_on_error);
        assert!(config.rule(ClanActivityRule::ID).enabled);
        // Unlisted rules keep their built-in binding.
        assert_eq!(
            config.rule(SessionDeclineRule::ID),
            RuleConfig::default_for(SessionDeclineRule::ID)
        );

        assert_eq!(config.actions.comeback_challenge.wins_needed, 5);
        assert_eq!(config.actions.comeback_challenge.duration_days, 7);
        assert_eq!(config.actions.grant_item.quantity, 3);
        assert_eq!(config.actions.record_signal.severity["rage_quit"], Severity::High);
        assert_eq!(config.actions.increment_stat.as_ref().unwrap().id, "increment_stat");
        assert_eq!(config.dispatch_config().event_timeout, None);
        assert_eq!(config.dispatch_config().max_in_flight, 8);
    }

    #[test]
    fn partial_rule_entry_keeps_built_in_binding() {
        let config = PipelineConfig::parse(
            r#"
            [rules.session_decline]
            priority = 70

            [rules.clan_activity]
            min_active_members = 4
            "#,
        )
        .unwrap();

        let decline = config.rule(SessionDeclineRule::ID);
        assert_eq!(decline.priority, Some(70));
        assert_eq!(decline.actions, vec!["record_signal", "comeback_challenge"]);
        assert!(decline.rollback_on_error);
        assert!(decline.enabled);

        let clan = config.rule(ClanActivityRule::ID);
        assert_eq!(clan.min_active_members, Some(4));
        assert!(!clan.enabled);
        assert_eq!(clan.actions, vec!["record_signal"]);
    }

    #[test]
    fn unknown_rule_is_rejected() {
        let config = PipelineConfig::parse("[rules.vibes]\nenabled = true\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("vibes"));
    }

    #[test]
    fn overrides_take_precedence() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("CHURN_NAMESPACE", "live"),
            ("CHURN_STATE_DIR", "/tmp/churn"),
            ("CHURN_MAX_IN_FLIGHT", "0"),
            ("CHURN_EVENT_TIMEOUT_SECS", "5"),
            ("CHURN_STORE_KIND", ""),
        ]);
        let mut config = PipelineConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.namespace, "live");
        assert_eq!(config.store.kind, StoreKind::File);
        assert_eq!(config.store.dir, Some(PathBuf::from("/tmp/churn")));
        assert_eq!(config.dispatch.max_in_flight, 1);
        assert_eq!(config.dispatch_config().event_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn store_kind_parses_case_insensitively() {
        assert_eq!(parse_value::<StoreKind>("FILE"), Some(StoreKind::File));
        assert_eq!(parse_value::<StoreKind>("redis"), None);
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = PipelineConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("absent.toml"));
    }
}
