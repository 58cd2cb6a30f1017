use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::IcpScorer;
use crate::domain::icp::{IcpConfig, IcpConfigId, IcpConfigPatch};
use crate::errors::{ApplicationError, DomainError};

#[derive(Debug, Default)]
struct StoreState {
    configs: BTreeMap<IcpConfigId, IcpConfig>,
    default_id: Option<IcpConfigId>,
}

/// Owns the ICP configurations and which one is the default.
///
/// The default is tracked in one place under one lock, so at most one config
/// is ever flagged `is_default`. Scorers are handed an immutable snapshot.
#[derive(Clone, Debug, Default)]
pub struct ActiveConfigStore {
    state: Arc<RwLock<StoreState>>,
}

impl ActiveConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with one config, which becomes the default.
    pub fn with_config(config: IcpConfig) -> Result<Self, ApplicationError> {
        let store = Self::new();
        store.create(config, Utc::now())?;
        Ok(store)
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        match self.state.read() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        match self.state.write() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Saves a new config. The first config created while no default exists
    /// becomes the default.
    pub fn create(
        &self,
        mut config: IcpConfig,
        now: DateTime<Utc>,
    ) -> Result<IcpConfig, ApplicationError> {
        config.weights.validate()?;
        if config.id.0.trim().is_empty() {
            config.id = IcpConfigId(Uuid::new_v4().to_string());
        }

        let mut state = self.write();
        if state.configs.contains_key(&config.id) {
            return Err(ApplicationError::Conflict(format!(
                "icp config `{}` already exists",
                config.id
            )));
        }

        config.is_active = true;
        config.is_default = state.default_id.is_none();
        config.created_at = now;
        config.updated_at = now;
        if config.is_default {
            state.default_id = Some(config.id.clone());
        }
        state.configs.insert(config.id.clone(), config.clone());
        Ok(config)
    }

    pub fn update(
        &self,
        id: &IcpConfigId,
        patch: IcpConfigPatch,
        now: DateTime<Utc>,
    ) -> Result<IcpConfig, ApplicationError> {
        let mut state = self.write();
        let existing = state
            .configs
            .get(id)
            .ok_or_else(|| ApplicationError::not_found("icp config", id.0.clone()))?;

        let mut updated = existing.clone();
        updated.apply_patch(patch);
        updated.weights.validate()?;
        updated.updated_at = now;

        state.configs.insert(id.clone(), updated.clone());
        Ok(updated)
    }

    /// Soft delete. The default config cannot be deleted.
    pub fn delete(&self, id: &IcpConfigId, now: DateTime<Utc>) -> Result<(), ApplicationError> {
        let mut state = self.write();
        if state.default_id.as_ref() == Some(id) {
            return Err(DomainError::InvariantViolation(
                "the default ICP configuration cannot be deleted".to_string(),
            )
            .into());
        }

        let config = state
            .configs
            .get_mut(id)
            .ok_or_else(|| ApplicationError::not_found("icp config", id.0.clone()))?;
        config.is_active = false;
        config.updated_at = now;
        Ok(())
    }

    pub fn duplicate(
        &self,
        id: &IcpConfigId,
        now: DateTime<Utc>,
    ) -> Result<IcpConfig, ApplicationError> {
        let mut state = self.write();
        let source = state
            .configs
            .get(id)
            .ok_or_else(|| ApplicationError::not_found("icp config", id.0.clone()))?;

        let mut copy = source.clone();
        copy.id = IcpConfigId(Uuid::new_v4().to_string());
        copy.name = format!("{} (Copy)", source.name);
        copy.is_default = false;
        copy.is_active = true;
        copy.created_at = now;
        copy.updated_at = now;

        state.configs.insert(copy.id.clone(), copy.clone());
        Ok(copy)
    }

    /// Moves the default flag to `id` in one step.
    pub fn set_default(&self, id: &IcpConfigId, now: DateTime<Utc>) -> Result<(), ApplicationError> {
        let mut state = self.write();
        match state.configs.get(id) {
            None => return Err(ApplicationError::not_found("icp config", id.0.clone())),
            Some(config) if !config.is_active => {
                return Err(DomainError::InvariantViolation(format!(
                    "inactive ICP configuration `{id}` cannot become the default"
                ))
                .into())
            }
            Some(_) => {}
        }

        if let Some(previous) = state.default_id.take() {
            if let Some(config) = state.configs.get_mut(&previous) {
                config.is_default = false;
                config.updated_at = now;
            }
        }
        if let Some(config) = state.configs.get_mut(id) {
            config.is_default = true;
            config.updated_at = now;
        }
        state.default_id = Some(id.clone());
        Ok(())
    }

    pub fn get(&self, id: &IcpConfigId) -> Result<IcpConfig, ApplicationError> {
        self.read()
            .configs
            .get(id)
            .cloned()
            .ok_or_else(|| ApplicationError::not_found("icp config", id.0.clone()))
    }

    /// Active configs, default first, then by name.
    pub fn list(&self) -> Vec<IcpConfig> {
        let mut configs =
            self.read().configs.values().filter(|config| config.is_active).cloned().collect::<Vec<_>>();
        configs.sort_by(|left, right| {
            right.is_default.cmp(&left.is_default).then_with(|| left.name.cmp(&right.name))
        });
        configs
    }

    pub fn active(&self) -> Option<IcpConfig> {
        let state = self.read();
        state.default_id.as_ref().and_then(|id| state.configs.get(id)).cloned()
    }

    /// Scorer bound to the current default. Later store edits do not affect it.
    pub fn scorer(&self) -> IcpScorer {
        IcpScorer::new(self.active())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::ActiveConfigStore;
    use crate::domain::icp::{IcpConfig, IcpConfigId, IcpConfigPatch, ScoringWeights};
    use crate::domain::prospect::ProspectAttributes;
    use crate::errors::{ApplicationError, DomainError};

    fn config(id: &str, name: &str) -> IcpConfig {
        IcpConfig::new(IcpConfigId(id.to_string()), name)
    }

    #[test]
    fn first_config_becomes_default() {
        let store = ActiveConfigStore::new();
        let first = store.create(config("a", "Alpha"), Utc::now()).expect("create first");
        let second = store.create(config("b", "Beta"), Utc::now()).expect("create second");

        assert!(first.is_default);
        assert!(!second.is_default);
        assert_eq!(store.active().map(|config| config.id), Some(IcpConfigId("a".to_string())));
    }

    #[test]
    fn create_generates_an_id_when_missing() {
        let store = ActiveConfigStore::new();
        let created = store.create(config("", "Anonymous"), Utc::now()).expect("create");
        assert!(!created.id.0.is_empty());
    }

    #[test]
    fn weights_are_validated_on_save() {
        let store = ActiveConfigStore::new();
        let mut invalid = config("a", "Alpha");
        invalid.weights = ScoringWeights { title: 40, company: 40, signals: 40, triggers: 40 };

        let error = store.create(invalid, Utc::now()).expect_err("weights sum to 160");
        assert_eq!(error, ApplicationError::Domain(DomainError::InvalidWeights { sum: 160 }));

        store.create(config("a", "Alpha"), Utc::now()).expect("valid config");
        let error = store
            .update(
                &IcpConfigId("a".to_string()),
                IcpConfigPatch {
                    weights: Some(ScoringWeights { title: 10, company: 10, signals: 10, triggers: 10 }),
                    ..IcpConfigPatch::default()
                },
                Utc::now(),
            )
            .expect_err("weights sum to 40");
        assert_eq!(error, ApplicationError::Domain(DomainError::InvalidWeights { sum: 40 }));
        assert_eq!(
            store.get(&IcpConfigId("a".to_string())).map(|config| config.weights),
            Ok(ScoringWeights::default())
        );
    }

    #[test]
    fn set_default_swaps_exactly_one_flag() {
        let store = ActiveConfigStore::new();
        store.create(config("a", "Alpha"), Utc::now()).expect("create a");
        store.create(config("b", "Beta"), Utc::now()).expect("create b");

        store.set_default(&IcpConfigId("b".to_string()), Utc::now()).expect("set default");

        let defaults = store.list().into_iter().filter(|config| config.is_default).collect::<Vec<_>>();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id, IcpConfigId("b".to_string()));
        assert_eq!(store.list()[0].id, IcpConfigId("b".to_string()));
    }

    #[test]
    fn default_cannot_be_deleted_and_delete_is_soft() {
        let store = ActiveConfigStore::new();
        store.create(config("a", "Alpha"), Utc::now()).expect("create a");
        store.create(config("b", "Beta"), Utc::now()).expect("create b");

        let error = store.delete(&IcpConfigId("a".to_string()), Utc::now()).expect_err("default");
        assert!(matches!(error, ApplicationError::Domain(DomainError::InvariantViolation(_))));

        store.delete(&IcpConfigId("b".to_string()), Utc::now()).expect("delete b");
        assert_eq!(store.list().len(), 1);
        let deleted = store.get(&IcpConfigId("b".to_string())).expect("still stored");
        assert!(!deleted.is_active);

        let error = store.set_default(&IcpConfigId("b".to_string()), Utc::now()).expect_err("inactive");
        assert!(matches!(error, ApplicationError::Domain(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn duplicate_copies_criteria_but_not_default_flag() {
        let store = ActiveConfigStore::new();
        let mut original = config("a", "Alpha");
        original.target_titles = vec!["CTO".to_string()];
        store.create(original, Utc::now()).expect("create");

        let copy = store.duplicate(&IcpConfigId("a".to_string()), Utc::now()).expect("duplicate");
        assert_eq!(copy.name, "Alpha (Copy)");
        assert_eq!(copy.target_titles, vec!["CTO".to_string()]);
        assert!(!copy.is_default);
        assert_ne!(copy.id, IcpConfigId("a".to_string()));
    }

    #[test]
    fn missing_config_is_not_found() {
        let store = ActiveConfigStore::new();
        let error = store.get(&IcpConfigId("nope".to_string())).expect_err("missing");
        assert!(matches!(error, ApplicationError::NotFound { entity: "icp config", .. }));
    }

    #[test]
    fn scorer_uses_a_snapshot_of_the_default() {
        let store = ActiveConfigStore::new();
        let prospect = ProspectAttributes { title: Some("CTO".to_string()), seniority: None };
        assert_eq!(store.scorer().score(&prospect, None, None).total_score, 50);

        let mut alpha = config("a", "Alpha");
        alpha.target_titles = vec!["cto".to_string()];
        store.create(alpha, Utc::now()).expect("create");

        let scorer = store.scorer();
        let before = scorer.score(&prospect, None, None);
        store
            .update(
                &IcpConfigId("a".to_string()),
                IcpConfigPatch { target_titles: Some(Vec::new()), ..IcpConfigPatch::default() },
                Utc::now(),
            )
            .expect("update");

        assert_eq!(scorer.score(&prospect, None, None), before);
        assert_ne!(store.scorer().score(&prospect, None, None), before);
    }
}
