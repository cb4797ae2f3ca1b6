//! Typed access to the setting store

use oneclick_core::SettingKey;
use oneclick_storage::{SettingScope, SettingStore, StorageError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Typed wrapper over a [`SettingStore`]
#[derive(Clone)]
pub struct SettingsService {
    store: Arc<dyn SettingStore>,
}

impl SettingsService {
    pub fn new(store: Arc<dyn SettingStore>) -> Self {
        Self { store }
    }

    /// Load a setting, falling back to `default` when it is unset or
    /// does not have the expected shape
    pub async fn load_setting<T: DeserializeOwned>(
        &self,
        key: SettingKey,
        default: T,
        work_item_type: &str,
        project_id: &str,
    ) -> Result<T, StorageError> {
        let scope = SettingScope::for_key(key, work_item_type, project_id);
        match self.store.load(key, &scope).await? {
            None | Some(serde_json::Value::Null) => Ok(default),
            Some(value) => match serde_json::from_value(value) {
                Ok(parsed) => Ok(parsed),
                Err(e) => {
                    tracing::warn!("Setting {} has an unexpected shape, using default: {}", key, e);
                    Ok(default)
                }
            },
        }
    }

    pub async fn update_setting<T: Serialize>(
        &self,
        key: SettingKey,
        value: &T,
        work_item_type: &str,
        project_id: &str,
    ) -> Result<(), StorageError> {
        let scope = SettingScope::for_key(key, work_item_type, project_id);
        let value = serde_json::to_value(value)?;
        self.store.update(key, value, &scope).await
    }

    /// Current cache stamp; a zero stamp counts as no stamp
    pub async fn read_cache_stamp(
        &self,
        work_item_type: &str,
        project_id: &str,
    ) -> Result<Option<u64>, StorageError> {
        let stamp = self.store.read_cache_stamp(work_item_type, project_id).await?;
        Ok(stamp.filter(|s| *s != 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oneclick_storage::InMemoryStorage;

    #[tokio::test]
    async fn test_defaults_and_malformed_values() {
        let storage = Arc::new(InMemoryStorage::new());
        let settings = SettingsService::new(storage.clone());

        let enabled = settings
            .load_setting(SettingKey::GlobalRulesEnabled, true, "Bug", "p1")
            .await
            .unwrap();
        assert!(enabled);

        storage.set_setting(
            SettingKey::GlobalRulesEnabled,
            &SettingScope::for_key(SettingKey::GlobalRulesEnabled, "Bug", "p1"),
            serde_json::json!("not a bool"),
        );
        let enabled = settings
            .load_setting(SettingKey::GlobalRulesEnabled, true, "Bug", "p1")
            .await
            .unwrap();
        assert!(enabled);
    }

    #[tokio::test]
    async fn test_update_uses_key_scope() {
        let storage = Arc::new(InMemoryStorage::new());
        let settings = SettingsService::new(storage.clone());

        settings
            .update_setting(SettingKey::UserSubscriptions, &vec!["g1"], "Bug", "p1")
            .await
            .unwrap();

        let user_scope = SettingScope::new("Bug", "p1", true);
        assert_eq!(
            storage.setting(SettingKey::UserSubscriptions, &user_scope),
            Some(serde_json::json!(["g1"]))
        );
    }

    #[tokio::test]
    async fn test_zero_cache_stamp_is_absent() {
        let storage = Arc::new(InMemoryStorage::new());
        let settings = SettingsService::new(storage.clone());

        storage.set_cache_stamp("Bug", "p1", 0);
        assert_eq!(settings.read_cache_stamp("Bug", "p1").await.unwrap(), None);

        storage.bump_cache_stamp("Bug", "p1");
        assert_eq!(settings.read_cache_stamp("Bug", "p1").await.unwrap(), Some(1));
    }
}
