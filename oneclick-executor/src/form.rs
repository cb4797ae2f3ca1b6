//! The hosted work item form

use async_trait::async_trait;
use oneclick_core::CoreFieldRefNames;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::ExecutorError;

/// Work item type and project of the item open in the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormContext {
    pub work_item_type: String,
    pub project_id: String,
}

/// Trait for the form actions read from and write to
#[async_trait]
pub trait WorkItemForm: Send + Sync {
    async fn context(&self) -> Result<FormContext, ExecutorError>;

    async fn field_value(&self, field_ref_name: &str)
        -> Result<Option<serde_json::Value>, ExecutorError>;

    async fn set_field_value(
        &self,
        field_ref_name: &str,
        value: serde_json::Value,
    ) -> Result<(), ExecutorError>;

    async fn save(&self) -> Result<(), ExecutorError>;
}

/// In-memory form for development and testing
pub struct InMemoryWorkItemForm {
    fields: RwLock<BTreeMap<String, serde_json::Value>>,
    read_only_fields: RwLock<HashSet<String>>,
    /// Every successful write, in order
    writes: RwLock<Vec<(String, serde_json::Value)>>,
    saves: AtomicUsize,
}

impl InMemoryWorkItemForm {
    pub fn new(work_item_type: &str, project_id: &str) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(
            CoreFieldRefNames::WORK_ITEM_TYPE.to_string(),
            serde_json::Value::String(work_item_type.to_string()),
        );
        fields.insert(
            CoreFieldRefNames::TEAM_PROJECT.to_string(),
            serde_json::Value::String(project_id.to_string()),
        );
        Self {
            fields: RwLock::new(fields),
            read_only_fields: RwLock::new(HashSet::new()),
            writes: RwLock::new(Vec::new()),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn with_field(self, field_ref_name: &str, value: serde_json::Value) -> Self {
        self.fields.write().insert(field_ref_name.to_string(), value);
        self
    }

    /// Reject writes to a field
    pub fn mark_read_only(&self, field_ref_name: &str) {
        self.read_only_fields
            .write()
            .insert(field_ref_name.to_lowercase());
    }

    pub fn get(&self, field_ref_name: &str) -> Option<serde_json::Value> {
        self.fields.read().get(field_ref_name).cloned()
    }

    pub fn fields(&self) -> BTreeMap<String, serde_json::Value> {
        self.fields.read().clone()
    }

    pub fn writes(&self) -> Vec<(String, serde_json::Value)> {
        self.writes.read().clone()
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn text(&self, field_ref_name: &str) -> Result<String, ExecutorError> {
        match self.get(field_ref_name) {
            Some(serde_json::Value::String(s)) => Ok(s),
            _ => Err(ExecutorError::FieldNotFound(field_ref_name.to_string())),
        }
    }
}

#[async_trait]
impl WorkItemForm for InMemoryWorkItemForm {
    async fn context(&self) -> Result<FormContext, ExecutorError> {
        Ok(FormContext {
            work_item_type: self.text(CoreFieldRefNames::WORK_ITEM_TYPE)?,
            project_id: self.text(CoreFieldRefNames::TEAM_PROJECT)?,
        })
    }

    async fn field_value(
        &self,
        field_ref_name: &str,
    ) -> Result<Option<serde_json::Value>, ExecutorError> {
        Ok(self.get(field_ref_name))
    }

    async fn set_field_value(
        &self,
        field_ref_name: &str,
        value: serde_json::Value,
    ) -> Result<(), ExecutorError> {
        if self
            .read_only_fields
            .read()
            .contains(&field_ref_name.to_lowercase())
        {
            return Err(ExecutorError::ReadOnlyField(field_ref_name.to_string()));
        }
        self.fields
            .write()
            .insert(field_ref_name.to_string(), value.clone());
        self.writes.write().push((field_ref_name.to_string(), value));
        Ok(())
    }

    async fn save(&self) -> Result<(), ExecutorError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
