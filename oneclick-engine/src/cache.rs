//! Local rule cache validated against the server cache stamp

use oneclick_core::{equals_ignore_case, CacheSnapshot, RuleRecord};
use oneclick_storage::{LocalCache, StorageError};
use std::sync::Arc;

/// Rules restored from a usable snapshot
#[derive(Debug, Clone)]
pub struct CachedRules {
    pub rules: Vec<RuleRecord>,
    pub work_item_type_enabled: bool,
}

/// Reads and writes [`CacheSnapshot`]s through a [`LocalCache`]
#[derive(Clone)]
pub struct RuleCache {
    local: Arc<dyn LocalCache>,
}

impl RuleCache {
    pub fn new(local: Arc<dyn LocalCache>) -> Self {
        Self { local }
    }

    /// Rules cached for a project and work item type
    ///
    /// A snapshot is only usable when it was written under `cache_stamp`.
    /// Anything else (no stamp, no entry, unreadable JSON, another stamp
    /// or scope) is a miss.
    pub fn load(
        &self,
        project_id: &str,
        work_item_type: &str,
        cache_stamp: Option<u64>,
    ) -> Option<CachedRules> {
        let stamp = cache_stamp.filter(|s| *s != 0)?;
        let key = CacheSnapshot::key(project_id, work_item_type);
        let json = self.local.read(&key)?;

        let snapshot: CacheSnapshot = match serde_json::from_str(&json) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "Discarding unreadable rule cache");
                return None;
            }
        };

        if snapshot.cache_stamp != stamp {
            tracing::debug!(
                key = %key,
                cached = snapshot.cache_stamp,
                current = stamp,
                "Rule cache is stale"
            );
            return None;
        }

        if !equals_ignore_case(&snapshot.project_id, project_id)
            || !equals_ignore_case(&snapshot.work_item_type, work_item_type)
        {
            tracing::debug!(key = %key, "Rule cache belongs to another scope");
            return None;
        }

        tracing::debug!(key = %key, rules = snapshot.rules.len(), "Rule cache hit");
        Some(CachedRules {
            rules: snapshot.rules,
            work_item_type_enabled: snapshot.work_item_type_enabled,
        })
    }

    /// Replace the snapshot for a project and work item type
    pub fn store(
        &self,
        cache_stamp: u64,
        project_id: &str,
        work_item_type: &str,
        rules: &[RuleRecord],
        work_item_type_enabled: bool,
    ) -> Result<(), StorageError> {
        let snapshot = CacheSnapshot::new(cache_stamp, project_id, work_item_type, rules.to_vec())
            .with_work_item_type_enabled(work_item_type_enabled);
        let json = serde_json::to_string(&snapshot)?;
        self.local
            .write(&CacheSnapshot::key(project_id, work_item_type), &json)
    }
}
