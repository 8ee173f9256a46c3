//! Thread-safe catalog of actions keyed by id.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::info;

use super::Action;
use crate::api::RegistryError;

/// Registry of the actions available to rule bindings.
///
/// Shared between the executor and whoever manages registrations. Lookups
/// take the read lock and run concurrently; registration takes the write lock.
#[derive(Default)]
pub struct ActionRegistry {
    actions: RwLock<HashMap<String, Arc<dyn Action>>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateActionId`] if the id is taken.
    pub fn register(&self, action: Arc<dyn Action>) -> Result<(), RegistryError> {
        let mut actions = self.actions.write().map_err(|_| RegistryError::LockPoisoned)?;
        let id = action.id().to_string();
        if actions.contains_key(&id) {
            return Err(RegistryError::DuplicateActionId(id));
        }
        info!(
            target: "pipeline::actions",
            action_id = %id,
            rollback = action.supports_rollback(),
            "action registered"
        );
        actions.insert(id, action);
        Ok(())
    }

    pub fn unregister(&self, id: &str) -> Result<Option<Arc<dyn Action>>, RegistryError> {
        let mut actions = self.actions.write().map_err(|_| RegistryError::LockPoisoned)?;
        Ok(actions.remove(id))
    }

    pub fn get(&self, id: &str) -> Result<Option<Arc<dyn Action>>, RegistryError> {
        let actions = self.actions.read().map_err(|_| RegistryError::LockPoisoned)?;
        Ok(actions.get(id).map(Arc::clone))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.actions
            .read()
            .map(|actions| actions.contains_key(id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.actions.read().map(|actions| actions.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered action ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .actions
            .read()
            .map(|actions| actions.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = self.actions.write();
            panic!("poisoning action registry");
        }));
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use churn_core::{ChurnState, Trigger};
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::actions::{ActionError, ActionOutcome};

    struct Noop(&'static str);

    #[async_trait]
    impl Action for Noop {
        fn id(&self) -> &str {
            self.0
        }

        async fn execute(
            &self,
            _trigger: &Trigger,
            _state: &mut ChurnState,
            _cancel: &CancellationToken,
        ) -> Result<ActionOutcome, ActionError> {
            Ok(ActionOutcome::Unchanged)
        }
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let registry = ActionRegistry::new();
        registry.register(Arc::new(Noop("a"))).unwrap();
        let err = registry.register(Arc::new(Noop("a"))).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateActionId(id) if id == "a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn lookup_and_removal() {
        let registry = ActionRegistry::new();
        registry.register(Arc::new(Noop("b"))).unwrap();
        registry.register(Arc::new(Noop("a"))).unwrap();
        assert_eq!(registry.ids(), vec!["a", "b"]);

        assert!(registry.get("a").unwrap().is_some());
        assert!(registry.unregister("a").unwrap().is_some());
        assert!(registry.get("a").unwrap().is_none());
        assert!(!registry.contains("a"));
    }
}
