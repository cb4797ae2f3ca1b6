//! Builds rule instances, caching compiled definitions

use lru::LruCache;
use oneclick_compiler::{CompiledRule, RuleCompiler};
use oneclick_core::RuleRecord;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::RuleInstance;

const DEFAULT_CACHE_SIZE: usize = 100;

/// Rule factory with LRU caching of compiled rule definitions
///
/// Instances are always fresh; only the compiled configuration is reused,
/// keyed by rule id and a fingerprint of its attribute bag.
pub struct RuleFactory {
    compiler: RuleCompiler,
    cache: Arc<Mutex<LruCache<(String, u64), CompiledRule>>>,
}

impl RuleFactory {
    pub fn new(cache_size: usize) -> Self {
        let cache_size = NonZeroUsize::new(cache_size)
            .unwrap_or(NonZeroUsize::MIN.saturating_add(DEFAULT_CACHE_SIZE - 1));
        Self {
            compiler: RuleCompiler::new(),
            cache: Arc::new(Mutex::new(LruCache::new(cache_size))),
        }
    }

    /// Wrap a record as an executable rule
    pub fn build(&self, record: RuleRecord) -> RuleInstance {
        let key = cache_key(&record);
        let mut cache = self.cache.lock();
        let compiled = match cache.get(&key) {
            Some(compiled) => compiled.clone(),
            None => {
                let compiled = self.compiler.compile(&record);
                cache.put(key, compiled.clone());
                compiled
            }
        };
        drop(cache);
        RuleInstance::new(record, compiled)
    }

    pub fn build_all(&self, records: Vec<RuleRecord>) -> Vec<Arc<RuleInstance>> {
        records
            .into_iter()
            .map(|r| Arc::new(self.build(r)))
            .collect()
    }

    pub fn cached_len(&self) -> usize {
        let cache = self.cache.lock();
        cache.len()
    }

    /// Clear the cache
    pub fn clear_cache(&self) {
        let mut cache = self.cache.lock();
        cache.clear();
    }
}

impl Default for RuleFactory {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}

fn cache_key(record: &RuleRecord) -> (String, u64) {
    let mut hasher = DefaultHasher::new();
    serde_json::to_string(&record.fields)
        .unwrap_or_default()
        .hash(&mut hasher);
    (record.id.to_lowercase(), hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use oneclick_core::{ActionSpec, Trigger};

    fn record() -> RuleRecord {
        RuleRecord::new("triage", "Bug", "proj-1")
            .with_triggers(vec![Trigger::WorkItemSaved])
            .with_actions(vec![ActionSpec::SaveWorkItem])
    }

    #[test]
    fn test_compiled_definitions_are_reused() {
        let factory = RuleFactory::new(10);
        let rule = record();

        let first = factory.build(rule.clone());
        let second = factory.build(rule);
        assert_eq!(factory.cached_len(), 1);
        assert_eq!(first.triggers(), second.triggers());
    }

    #[test]
    fn test_changed_fields_recompile() {
        let factory = RuleFactory::new(10);
        let rule = record();
        factory.build(rule.clone());

        let edited = rule.with_triggers(vec![Trigger::WorkItemReset]);
        let instance = factory.build(edited);
        assert_eq!(instance.triggers(), &[Trigger::WorkItemReset]);
        assert_eq!(factory.cached_len(), 2);

        factory.clear_cache();
        assert_eq!(factory.cached_len(), 0);
    }

    #[test]
    fn test_zero_capacity_falls_back_to_default() {
        let factory = RuleFactory::new(0);
        factory.build(record());
        assert_eq!(factory.cached_len(), 1);
    }
}
