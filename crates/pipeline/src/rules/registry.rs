//! Thread-safe catalog of rules indexed by signal kind.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use churn_core::SignalKind;
use tracing::info;

use super::Rule;
use crate::api::RegistryError;

struct RuleEntry {
    rule: Arc<dyn Rule>,
    enabled: bool,
}

#[derive(Default)]
struct Inner {
    rules: HashMap<String, RuleEntry>,
    /// Rule ids per declared signal kind, in registration order.
    by_kind: HashMap<SignalKind, Vec<String>>,
    /// Rules that declared no kinds and match everything.
    wildcard: Vec<String>,
}

/// Registry that manages rules for the engine.
///
/// Lookups take a read lock and may run concurrently with evaluation on other
/// events. Registration, removal, and enable/disable take the write lock.
/// Enabled state is checked at lookup time, so toggling a rule is a live
/// switch on an existing registration.
///
/// # Architecture
///
/// ```text
/// RuleRegistry
/// ├── rules: HashMap<id, (Rule, enabled)>
/// ├── by_kind: HashMap<SignalKind, Vec<id>>
/// └── wildcard: Vec<id>
/// ```
#[derive(Default)]
pub struct RuleRegistry {
    inner: RwLock<Inner>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an enabled rule.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateRuleId`] if a rule with the same id exists.
    pub fn register(&self, rule: Arc<dyn Rule>) -> Result<(), RegistryError> {
        self.register_with_state(rule, true)
    }

    /// Register a rule with an explicit initial enabled state.
    pub fn register_with_state(
        &self,
        rule: Arc<dyn Rule>,
        enabled: bool,
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().map_err(|_| RegistryError::LockPoisoned)?;
        let id = rule.id().to_string();
        if inner.rules.contains_key(&id) {
            return Err(RegistryError::DuplicateRuleId(id));
        }

        if rule.signal_kinds().is_empty() {
            inner.wildcard.push(id.clone());
        } else {
            for kind in rule.signal_kinds() {
                inner.by_kind.entry(*kind).or_default().push(id.clone());
            }
        }

        info!(
            target: "pipeline::rules",
            rule_id = %id,
            priority = rule.priority(),
            enabled,
            "rule registered"
        );
        inner.rules.insert(id, RuleEntry { rule, enabled });
        Ok(())
    }

    /// Remove a rule and its index entries.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::RuleNotFound`] if no rule has this id.
    pub fn unregister(&self, id: &str) -> Result<Arc<dyn Rule>, RegistryError> {
        let mut inner = self.inner.write().map_err(|_| RegistryError::LockPoisoned)?;
        let entry = inner
            .rules
            .remove(id)
            .ok_or_else(|| RegistryError::RuleNotFound(id.to_string()))?;

        inner.wildcard.retain(|rule_id| rule_id != id);
        for ids in inner.by_kind.values_mut() {
            ids.retain(|rule_id| rule_id != id);
        }
        inner.by_kind.retain(|_, ids| !ids.is_empty());

        info!(target: "pipeline::rules", rule_id = %id, "rule unregistered");
        Ok(entry.rule)
    }

    /// Enable or disable a registered rule.
    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().map_err(|_| RegistryError::LockPoisoned)?;
        let entry = inner
            .rules
            .get_mut(id)
            .ok_or_else(|| RegistryError::RuleNotFound(id.to_string()))?;
        entry.enabled = enabled;
        Ok(())
    }

    pub fn is_enabled(&self, id: &str) -> Result<bool, RegistryError> {
        let inner = self.inner.read().map_err(|_| RegistryError::LockPoisoned)?;
        inner
            .rules
            .get(id)
            .map(|entry| entry.enabled)
            .ok_or_else(|| RegistryError::RuleNotFound(id.to_string()))
    }

    /// All enabled rules interested in `kind`: kind-specific rules in
    /// registration order, followed by wildcard rules.
    pub fn get_by_signal_kind(
        &self,
        kind: SignalKind,
    ) -> Result<Vec<Arc<dyn Rule>>, RegistryError> {
        let inner = self.inner.read().map_err(|_| RegistryError::LockPoisoned)?;
        let specific = inner.by_kind.get(&kind).into_iter().flatten();

        Ok(specific
            .chain(inner.wildcard.iter())
            .filter_map(|id| inner.rules.get(id))
            .filter(|entry| entry.enabled)
            .map(|entry| Arc::clone(&entry.rule))
            .collect())
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Rule>> {
        let inner = self.inner.read().ok()?;
        inner.rules.get(id).map(|entry| Arc::clone(&entry.rule))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner
            .read()
            .map(|inner| inner.rules.contains_key(id))
            .unwrap_or(false)
    }

    /// Returns the number of registered rules, enabled or not.
    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.rules.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered rule ids, sorted (for debugging and config validation).
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .inner
            .read()
            .map(|inner| inner.rules.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use churn_core::{Signal, Trigger};
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::rules::RuleError;

    struct StubRule {
        id: &'static str,
        kinds: Vec<SignalKind>,
    }

    #[async_trait]
    impl Rule for StubRule {
        fn id(&self) -> &str {
            self.id
        }

        fn signal_kinds(&self) -> &[SignalKind] {
            &self.kinds
        }

        async fn evaluate(
            &self,
            _signal: &Signal,
            _cancel: &CancellationToken,
        ) -> Result<Option<Trigger>, RuleError> {
            Ok(None)
        }
    }

    fn stub(id: &'static str, kinds: &[SignalKind]) -> Arc<dyn Rule> {
        Arc::new(StubRule {
            id,
            kinds: kinds.to_vec(),
        })
    }

    fn ids(rules: Vec<Arc<dyn Rule>>) -> Vec<String> {
        rules.iter().map(|r| r.id().to_string()).collect()
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let registry = RuleRegistry::new();
        registry.register(stub("a", &[SignalKind::Login])).unwrap();
        let err = registry.register(stub("a", &[SignalKind::RageQuit])).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateRuleId(id) if id == "a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn lookup_includes_wildcards_and_skips_other_kinds() {
        let registry = RuleRegistry::new();
        registry.register(stub("login", &[SignalKind::Login])).unwrap();
        registry.register(stub("any", &[])).unwrap();
        registry
            .register(stub("counters", &[SignalKind::RageQuit, SignalKind::LosingStreak]))
            .unwrap();

        assert_eq!(
            ids(registry.get_by_signal_kind(SignalKind::Login).unwrap()),
            vec!["login", "any"]
        );
        assert_eq!(
            ids(registry.get_by_signal_kind(SignalKind::LosingStreak).unwrap()),
            vec!["counters", "any"]
        );
        assert_eq!(
            ids(registry.get_by_signal_kind(SignalKind::MatchWin).unwrap()),
            vec!["any"]
        );
    }

    #[test]
    fn disabling_is_a_live_toggle() {
        let registry = RuleRegistry::new();
        registry.register(stub("login", &[SignalKind::Login])).unwrap();

        registry.set_enabled("login", false).unwrap();
        assert!(registry.get_by_signal_kind(SignalKind::Login).unwrap().is_empty());
        assert!(registry.contains("login"));

        registry.set_enabled("login", true).unwrap();
        assert_eq!(registry.get_by_signal_kind(SignalKind::Login).unwrap().len(), 1);
    }

    #[test]
    fn unregister_removes_index_entries() {
        let registry = RuleRegistry::new();
        registry.register(stub("login", &[SignalKind::Login])).unwrap();
        registry.unregister("login").unwrap();

        assert!(registry.get_by_signal_kind(SignalKind::Login).unwrap().is_empty());
        let err = registry.unregister("login").err().unwrap();
        assert!(matches!(err, RegistryError::RuleNotFound(_)));
        assert!(matches!(
            registry.set_enabled("login", true),
            Err(RegistryError::RuleNotFound(_))
        ));
    }

    #[test]
    fn concurrent_reads_and_writes_keep_indices_consistent() {
        let registry = Arc::new(RuleRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let id: &'static str = Box::leak(format!("rule-{n}").into_boxed_str());
                    registry.register(stub(id, &[SignalKind::Login])).unwrap();
                    for _ in 0..100 {
                        let _ = registry.get_by_signal_kind(SignalKind::Login).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.get_by_signal_kind(SignalKind::Login).unwrap().len(), 8);
    }
}
