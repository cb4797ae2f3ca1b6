//! In-memory storage implementation for development and testing

use async_trait::async_trait;
use oneclick_core::{RuleGroup, RuleRecord, SettingKey};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::{LocalCache, RuleCatalog, RuleGroupCatalog, SettingScope, SettingStore, StorageError};

type ScopeKey = (String, String);

fn scope_key(work_item_type: &str, project_id: &str) -> ScopeKey {
    (work_item_type.to_lowercase(), project_id.to_lowercase())
}

/// In-memory settings, rule groups and rules
///
/// Call counters and failure switches let tests observe and disturb the
/// traffic the rules pipeline sends to the backend.
pub struct InMemoryStorage {
    settings: RwLock<HashMap<(SettingKey, ScopeKey, bool), serde_json::Value>>,
    cache_stamps: RwLock<HashMap<ScopeKey, u64>>,
    rule_groups: RwLock<HashMap<ScopeKey, Vec<RuleGroup>>>,
    /// Rules keyed by lowercased group id
    rules: RwLock<HashMap<String, Vec<RuleRecord>>>,
    latency: Option<Duration>,
    rule_loads: AtomicUsize,
    rule_group_loads: AtomicUsize,
    setting_updates: RwLock<HashMap<SettingKey, usize>>,
    fail_loads: AtomicBool,
    fail_setting_updates: AtomicBool,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            settings: RwLock::new(HashMap::new()),
            cache_stamps: RwLock::new(HashMap::new()),
            rule_groups: RwLock::new(HashMap::new()),
            rules: RwLock::new(HashMap::new()),
            latency: None,
            rule_loads: AtomicUsize::new(0),
            rule_group_loads: AtomicUsize::new(0),
            setting_updates: RwLock::new(HashMap::new()),
            fail_loads: AtomicBool::new(false),
            fail_setting_updates: AtomicBool::new(false),
        }
    }

    /// Delay every catalog read, simulating a remote round trip
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn set_setting(&self, key: SettingKey, scope: &SettingScope, value: serde_json::Value) {
        let mut settings = self.settings.write();
        settings.insert(
            (key, scope_key(&scope.work_item_type, &scope.project_id), scope.user_scoped),
            value,
        );
    }

    pub fn setting(&self, key: SettingKey, scope: &SettingScope) -> Option<serde_json::Value> {
        let settings = self.settings.read();
        settings
            .get(&(key, scope_key(&scope.work_item_type, &scope.project_id), scope.user_scoped))
            .cloned()
    }

    pub fn set_cache_stamp(&self, work_item_type: &str, project_id: &str, stamp: u64) {
        let mut stamps = self.cache_stamps.write();
        stamps.insert(scope_key(work_item_type, project_id), stamp);
    }

    /// Advance the cache stamp, as the server does whenever rules change
    pub fn bump_cache_stamp(&self, work_item_type: &str, project_id: &str) -> u64 {
        let mut stamps = self.cache_stamps.write();
        let stamp = stamps.entry(scope_key(work_item_type, project_id)).or_insert(0);
        *stamp += 1;
        *stamp
    }

    pub fn add_rule_group(&self, work_item_type: &str, project_id: &str, group: RuleGroup) {
        let mut groups = self.rule_groups.write();
        groups
            .entry(scope_key(work_item_type, project_id))
            .or_default()
            .push(group);
    }

    pub fn remove_rule_group(&self, work_item_type: &str, project_id: &str, group_id: &str) {
        let mut groups = self.rule_groups.write();
        if let Some(list) = groups.get_mut(&scope_key(work_item_type, project_id)) {
            list.retain(|g| !g.id.eq_ignore_ascii_case(group_id));
        }
    }

    pub fn add_rule(&self, group_id: &str, rule: RuleRecord) {
        let mut rules = self.rules.write();
        rules.entry(group_id.to_lowercase()).or_default().push(rule);
    }

    /// Number of `load_rules_for_groups` calls served
    pub fn rule_loads(&self) -> usize {
        self.rule_loads.load(Ordering::SeqCst)
    }

    /// Number of `load_rule_groups` calls served
    pub fn rule_group_loads(&self) -> usize {
        self.rule_group_loads.load(Ordering::SeqCst)
    }

    /// Number of successful writes to a setting key
    pub fn setting_updates(&self, key: SettingKey) -> usize {
        self.setting_updates.read().get(&key).copied().unwrap_or(0)
    }

    /// Make every remote read fail with a connection error
    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Make every setting write fail with a connection error
    pub fn fail_setting_updates(&self, fail: bool) {
        self.fail_setting_updates.store(fail, Ordering::SeqCst);
    }

    fn check_loads(&self) -> Result<(), StorageError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("setting service unavailable".to_string()));
        }
        Ok(())
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SettingStore for InMemoryStorage {
    async fn load(
        &self,
        key: SettingKey,
        scope: &SettingScope,
    ) -> Result<Option<serde_json::Value>, StorageError> {
        self.check_loads()?;
        Ok(self.setting(key, scope))
    }

    async fn update(
        &self,
        key: SettingKey,
        value: serde_json::Value,
        scope: &SettingScope,
    ) -> Result<(), StorageError> {
        if self.fail_setting_updates.load(Ordering::SeqCst) {
            return Err(StorageError::Connection(format!(
                "failed to write setting {}",
                key
            )));
        }
        self.set_setting(key, scope, value);
        *self.setting_updates.write().entry(key).or_insert(0) += 1;
        Ok(())
    }

    async fn read_cache_stamp(
        &self,
        work_item_type: &str,
        project_id: &str,
    ) -> Result<Option<u64>, StorageError> {
        self.check_loads()?;
        let stamps = self.cache_stamps.read();
        Ok(stamps.get(&scope_key(work_item_type, project_id)).copied())
    }
}

#[async_trait]
impl RuleGroupCatalog for InMemoryStorage {
    async fn load_rule_groups(
        &self,
        work_item_type: &str,
        project_id: &str,
    ) -> Result<Vec<RuleGroup>, StorageError> {
        self.simulate_latency().await;
        self.check_loads()?;
        self.rule_group_loads.fetch_add(1, Ordering::SeqCst);
        let groups = self.rule_groups.read();
        Ok(groups
            .get(&scope_key(work_item_type, project_id))
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl RuleCatalog for InMemoryStorage {
    async fn load_rules_for_groups(
        &self,
        group_ids: &[String],
        project_id: &str,
    ) -> Result<Vec<RuleRecord>, StorageError> {
        self.simulate_latency().await;
        self.check_loads()?;
        self.rule_loads.fetch_add(1, Ordering::SeqCst);
        let rules = self.rules.read();
        Ok(group_ids
            .iter()
            .filter_map(|id| rules.get(&id.to_lowercase()))
            .flatten()
            .filter(|r| r.project_id.eq_ignore_ascii_case(project_id))
            .cloned()
            .collect())
    }
}

/// In-memory local cache
pub struct InMemoryLocalCache {
    entries: RwLock<HashMap<String, String>>,
    writes: AtomicUsize,
}

impl InMemoryLocalCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for InMemoryLocalCache {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalCache for InMemoryLocalCache {
    fn read(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn write(&self, key: &str, json: &str) -> Result<(), StorageError> {
        self.entries.write().insert(key.to_string(), json.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(user_scoped: bool) -> SettingScope {
        SettingScope::new("Bug", "proj-1", user_scoped)
    }

    #[tokio::test]
    async fn test_settings_are_scoped_by_user_flag() {
        let storage = InMemoryStorage::new();
        storage
            .update(SettingKey::UserSubscriptions, serde_json::json!(["g1"]), &scope(true))
            .await
            .unwrap();

        let user = storage.load(SettingKey::UserSubscriptions, &scope(true)).await.unwrap();
        assert_eq!(user, Some(serde_json::json!(["g1"])));

        let project = storage.load(SettingKey::UserSubscriptions, &scope(false)).await.unwrap();
        assert!(project.is_none());
        assert_eq!(storage.setting_updates(SettingKey::UserSubscriptions), 1);
    }

    #[tokio::test]
    async fn test_cache_stamp_is_monotonic() {
        let storage = InMemoryStorage::new();
        assert_eq!(storage.read_cache_stamp("Bug", "proj-1").await.unwrap(), None);

        assert_eq!(storage.bump_cache_stamp("Bug", "proj-1"), 1);
        assert_eq!(storage.bump_cache_stamp("bug", "PROJ-1"), 2);
        assert_eq!(storage.read_cache_stamp("Bug", "proj-1").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_rules_are_loaded_per_group_and_project() {
        let storage = InMemoryStorage::new();
        let rule = RuleRecord::new("triage", "Bug", "proj-1");
        let other_project = RuleRecord::new("other", "Bug", "proj-2");
        storage.add_rule("Group-A", rule.clone());
        storage.add_rule("group-a", other_project);
        storage.add_rule("group-b", RuleRecord::new("unrelated", "Bug", "proj-1"));

        let rules = storage
            .load_rules_for_groups(&["GROUP-A".to_string()], "proj-1")
            .await
            .unwrap();
        assert_eq!(rules, vec![rule]);
        assert_eq!(storage.rule_loads(), 1);
    }

    #[tokio::test]
    async fn test_failure_switches() {
        let storage = InMemoryStorage::new();
        storage.fail_setting_updates(true);
        let result = storage
            .update(SettingKey::UserRulesOrdering, serde_json::json!({}), &scope(true))
            .await;
        assert!(matches!(result, Err(StorageError::Connection(_))));

        storage.fail_loads(true);
        assert!(storage.load_rule_groups("Bug", "proj-1").await.is_err());
    }

    #[test]
    fn test_local_cache_overwrites() {
        let cache = InMemoryLocalCache::new();
        cache.write("p/bug", "1").unwrap();
        cache.write("p/bug", "2").unwrap();
        assert_eq!(cache.read("p/bug").as_deref(), Some("2"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.writes(), 2);
    }
}
