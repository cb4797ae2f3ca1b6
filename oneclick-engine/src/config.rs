//! Engine configuration

/// Configuration of the rules engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Id of the group holding the user's personal rules
    pub personal_group_id: String,
    /// Id of the group holding rules shared by the whole project
    pub global_group_id: String,
    /// Id the dispatcher registers its lifecycle listener under
    pub contribution_id: String,
    /// Capacity of the compiled rule cache
    pub compiled_cache_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            personal_group_id: "personal".to_string(),
            global_group_id: "global".to_string(),
            contribution_id: "oneclick.work-item-rules-group".to_string(),
            compiled_cache_size: 100,
        }
    }
}

impl EngineConfig {
    /// Read overrides from `ONECLICK_*` environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let compiled_cache_size = match std::env::var("ONECLICK_COMPILED_CACHE_SIZE") {
            Ok(raw) => raw.parse::<usize>().unwrap_or_else(|_| {
                tracing::warn!(
                    "Ignoring invalid ONECLICK_COMPILED_CACHE_SIZE '{}', using {}",
                    raw,
                    defaults.compiled_cache_size
                );
                defaults.compiled_cache_size
            }),
            Err(_) => defaults.compiled_cache_size,
        };

        Self {
            personal_group_id: std::env::var("ONECLICK_PERSONAL_GROUP_ID")
                .unwrap_or(defaults.personal_group_id),
            global_group_id: std::env::var("ONECLICK_GLOBAL_GROUP_ID")
                .unwrap_or(defaults.global_group_id),
            contribution_id: std::env::var("ONECLICK_CONTRIBUTION_ID")
                .unwrap_or(defaults.contribution_id),
            compiled_cache_size,
        }
    }
}
