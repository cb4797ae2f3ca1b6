//! Storage traits defining the interface to the remote services

use async_trait::async_trait;
use oneclick_core::{RuleGroup, RuleRecord, SettingKey};

use crate::StorageError;

/// Where a setting lives: per work item type and project, optionally per user
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SettingScope {
    pub work_item_type: String,
    pub project_id: String,
    pub user_scoped: bool,
}

impl SettingScope {
    pub fn new(work_item_type: &str, project_id: &str, user_scoped: bool) -> Self {
        Self {
            work_item_type: work_item_type.to_string(),
            project_id: project_id.to_string(),
            user_scoped,
        }
    }

    /// Scope a key is normally stored under
    pub fn for_key(key: SettingKey, work_item_type: &str, project_id: &str) -> Self {
        Self::new(work_item_type, project_id, key.is_user_scoped())
    }
}

/// Trait for the remote key/value setting store
#[async_trait]
pub trait SettingStore: Send + Sync {
    /// Load a setting, `None` when it was never written
    async fn load(
        &self,
        key: SettingKey,
        scope: &SettingScope,
    ) -> Result<Option<serde_json::Value>, StorageError>;

    /// Overwrite a setting
    async fn update(
        &self,
        key: SettingKey,
        value: serde_json::Value,
        scope: &SettingScope,
    ) -> Result<(), StorageError>;

    /// Current cache stamp for a work item type and project
    async fn read_cache_stamp(
        &self,
        work_item_type: &str,
        project_id: &str,
    ) -> Result<Option<u64>, StorageError>;
}

/// Trait for resolving rule groups
#[async_trait]
pub trait RuleGroupCatalog: Send + Sync {
    /// All rule groups defined for a work item type in a project
    async fn load_rule_groups(
        &self,
        work_item_type: &str,
        project_id: &str,
    ) -> Result<Vec<RuleGroup>, StorageError>;
}

/// Trait for resolving the rules of a set of groups
#[async_trait]
pub trait RuleCatalog: Send + Sync {
    async fn load_rules_for_groups(
        &self,
        group_ids: &[String],
        project_id: &str,
    ) -> Result<Vec<RuleRecord>, StorageError>;
}

/// Trait for the local persisted rule cache
pub trait LocalCache: Send + Sync {
    fn read(&self, key: &str) -> Option<String>;

    fn write(&self, key: &str, json: &str) -> Result<(), StorageError>;
}
