//! Application state shared across handlers

use oneclick_core::{RuleGroup, RuleRecord, SettingKey};
use oneclick_engine::{EngineConfig, EventHost, HostRegistration, RuleDispatcher, RuleSourcingEngine};
use oneclick_executor::InMemoryWorkItemForm;
use oneclick_storage::{InMemoryLocalCache, InMemoryStorage, LocalCache, SettingScope};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

pub const DEFAULT_WORK_ITEM_TYPE: &str = "Bug";
pub const DEFAULT_PROJECT_ID: &str = "default";

/// Shared application state
///
/// One hosted work item form and the dispatcher running its rules. The
/// dispatcher stays registered with `host` under the configured
/// contribution id until the state is dropped.
pub struct AppState {
    pub storage: Arc<InMemoryStorage>,
    pub form: Arc<InMemoryWorkItemForm>,
    pub dispatcher: Arc<RuleDispatcher>,
    pub host: Arc<EventHost>,
    registration: HostRegistration,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_storage(
            Arc::new(InMemoryStorage::new()),
            Arc::new(InMemoryLocalCache::new()),
            EngineConfig::default(),
            DEFAULT_WORK_ITEM_TYPE,
            DEFAULT_PROJECT_ID,
        )
    }

    /// Create with a custom backend and local cache
    pub fn with_storage(
        storage: Arc<InMemoryStorage>,
        local_cache: Arc<dyn LocalCache>,
        config: EngineConfig,
        work_item_type: &str,
        project_id: &str,
    ) -> Self {
        let contribution_id = config.contribution_id.clone();
        let engine = RuleSourcingEngine::with_storage(config, storage.clone(), local_cache);
        let form = Arc::new(InMemoryWorkItemForm::new(work_item_type, project_id));
        let dispatcher = Arc::new(RuleDispatcher::new(engine, form.clone()));

        let host = Arc::new(EventHost::new());
        let registration = dispatcher.attach(&host, &contribution_id);

        Self {
            storage,
            form,
            dispatcher,
            host,
            registration,
        }
    }

    /// Contribution id the dispatcher is registered under
    pub fn contribution_id(&self) -> &str {
        self.registration.contribution_id()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Initial backend content loaded at startup
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeedData {
    pub cache_stamp: Option<u64>,
    pub groups: Vec<RuleGroup>,
    /// Rules keyed by group id
    pub rules: HashMap<String, Vec<RuleRecord>>,
    pub subscriptions: Vec<String>,
    pub rules_ordering: HashMap<String, i64>,
}

impl SeedData {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load the seed into a backend for one work item type and project
    ///
    /// Returns the number of rules added.
    pub fn apply(self, storage: &InMemoryStorage, work_item_type: &str, project_id: &str) -> usize {
        if let Some(stamp) = self.cache_stamp {
            storage.set_cache_stamp(work_item_type, project_id, stamp);
        }
        for group in self.groups {
            storage.add_rule_group(work_item_type, project_id, group);
        }

        let user_scope = SettingScope::new(work_item_type, project_id, true);
        if !self.subscriptions.is_empty() {
            storage.set_setting(
                SettingKey::UserSubscriptions,
                &user_scope,
                serde_json::json!(self.subscriptions),
            );
        }
        if !self.rules_ordering.is_empty() {
            storage.set_setting(
                SettingKey::UserRulesOrdering,
                &user_scope,
                serde_json::json!(self.rules_ordering),
            );
        }

        let mut count = 0;
        for (group_id, rules) in self.rules {
            for rule in rules {
                storage.add_rule(&group_id, rule);
                count += 1;
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_applies_rules_and_settings() {
        let seed = SeedData::from_json(
            r#"{
                "cacheStamp": 3,
                "groups": [{"id": "team"}],
                "rules": {
                    "personal": [{"id": "r1", "workItemType": "Bug", "projectId": "p1"}],
                    "team": [{"id": "r2", "workItemType": "Bug", "projectId": "p1"}]
                },
                "subscriptions": ["team"]
            }"#,
        )
        .unwrap();

        let storage = InMemoryStorage::new();
        assert_eq!(seed.apply(&storage, "Bug", "p1"), 2);
        assert_eq!(
            storage.setting(SettingKey::UserSubscriptions, &SettingScope::new("Bug", "p1", true)),
            Some(serde_json::json!(["team"]))
        );
    }
}
