//! Core domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::{CoreError, FormEvent, RuleFieldNames};

/// A personal, global or team collection of rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleGroup {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

impl RuleGroup {
    pub fn new(name: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: Some(name),
            description: None,
            disabled: false,
        }
    }

    /// Create a group with a fixed id (the well-known personal and global groups)
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            description: None,
            disabled: false,
        }
    }
}

/// A rule as stored on the server and in the local cache
///
/// `fields` is the raw attribute bag. It is compiled into typed
/// triggers and actions when the rule is wrapped for execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRecord {
    pub id: String,
    pub work_item_type: String,
    pub project_id: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl RuleRecord {
    pub fn new(name: &str, work_item_type: &str, project_id: &str) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(
            RuleFieldNames::NAME.to_string(),
            serde_json::Value::String(name.to_string()),
        );
        Self {
            id: Uuid::new_v4().to_string(),
            work_item_type: work_item_type.to_string(),
            project_id: project_id.to_string(),
            disabled: false,
            fields,
        }
    }

    pub fn with_triggers(mut self, triggers: Vec<Trigger>) -> Self {
        self.fields.insert(
            RuleFieldNames::TRIGGERS.to_string(),
            serde_json::to_value(triggers).unwrap_or_default(),
        );
        self
    }

    pub fn with_actions(mut self, actions: Vec<ActionSpec>) -> Self {
        self.fields.insert(
            RuleFieldNames::ACTIONS.to_string(),
            serde_json::to_value(actions).unwrap_or_default(),
        );
        self
    }

    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }

    /// Display name, falling back to the id
    pub fn name(&self) -> &str {
        self.field(RuleFieldNames::NAME)
            .and_then(|v| v.as_str())
            .unwrap_or(&self.id)
    }

    /// Rule identity is the id, compared without regard to case
    pub fn same_id(&self, other_id: &str) -> bool {
        equals_ignore_case(&self.id, other_id)
    }
}

impl PartialEq for RuleRecord {
    fn eq(&self, other: &Self) -> bool {
        self.same_id(&other.id)
    }
}

impl Eq for RuleRecord {}

/// When a rule fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "camelCase")]
pub enum Trigger {
    WorkItemLoaded {
        #[serde(rename = "onlyIfNew", default)]
        only_if_new: bool,
    },
    FieldChanged {
        #[serde(rename = "fieldRefName")]
        field_ref_name: String,
        /// Expected new value; any change matches when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    WorkItemSaved,
    WorkItemRefreshed,
    WorkItemReset,
    WorkItemUnloaded,
}

impl Trigger {
    /// The lifecycle event this trigger listens to
    pub fn event(&self) -> FormEvent {
        match self {
            Trigger::WorkItemLoaded { .. } => FormEvent::Loaded,
            Trigger::FieldChanged { .. } => FormEvent::FieldChanged,
            Trigger::WorkItemSaved => FormEvent::Saved,
            Trigger::WorkItemRefreshed => FormEvent::Refreshed,
            Trigger::WorkItemReset => FormEvent::Reset,
            Trigger::WorkItemUnloaded => FormEvent::Unloaded,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            Trigger::FieldChanged { field_ref_name, .. } if field_ref_name.trim().is_empty() => {
                Err(CoreError::InvalidTrigger(
                    "fieldChanged trigger requires a field reference name".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

/// What a rule does when it runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "camelCase")]
pub enum ActionSpec {
    AddTags {
        tags: String,
    },
    RemoveTags {
        tags: String,
    },
    SetFieldValue {
        #[serde(rename = "fieldRefName")]
        field_ref_name: String,
        #[serde(rename = "fieldValue", default)]
        field_value: serde_json::Value,
    },
    SaveWorkItem,
}

impl ActionSpec {
    /// Action name used in error reports
    pub fn action_name(&self) -> &'static str {
        match self {
            ActionSpec::AddTags { .. } => "addTags",
            ActionSpec::RemoveTags { .. } => "removeTags",
            ActionSpec::SetFieldValue { .. } => "setFieldValue",
            ActionSpec::SaveWorkItem => "saveWorkItem",
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            ActionSpec::AddTags { tags } | ActionSpec::RemoveTags { tags }
                if split_tags(tags).is_empty() =>
            {
                Err(CoreError::InvalidAction(format!(
                    "{} requires at least one tag",
                    self.action_name()
                )))
            }
            ActionSpec::SetFieldValue { field_ref_name, .. } if field_ref_name.trim().is_empty() => {
                Err(CoreError::InvalidAction(
                    "setFieldValue requires a field reference name".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Split a `;`-separated tag string, trimming and dropping empty entries
pub fn split_tags(tags: &str) -> Vec<String> {
    tags.split(';')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Compare identifiers and type names the way the service does, ignoring case
pub fn equals_ignore_case(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// A failure reported by one action of a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionError {
    pub action_name: String,
    pub error: String,
}

impl ActionError {
    pub fn new(action_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            action_name: action_name.into(),
            error: error.into(),
        }
    }
}

impl std::fmt::Display for ActionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} : {}", self.action_name.to_uppercase(), self.error)
    }
}

/// User specific rank of rules, keyed by lowercased rule id
pub type UserRuleOrder = HashMap<String, i64>;

/// Rules persisted in the local cache for one project and work item type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    pub cache_stamp: u64,
    pub project_id: String,
    pub work_item_type: String,
    pub rules: Vec<RuleRecord>,
    /// Whether rules were enabled for the work item type when cached
    #[serde(default = "default_enabled")]
    pub work_item_type_enabled: bool,
    /// When this snapshot was written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub written_at: Option<DateTime<Utc>>,
}

impl CacheSnapshot {
    pub fn new(
        cache_stamp: u64,
        project_id: &str,
        work_item_type: &str,
        rules: Vec<RuleRecord>,
    ) -> Self {
        Self {
            cache_stamp,
            project_id: project_id.to_string(),
            work_item_type: work_item_type.to_string(),
            rules,
            work_item_type_enabled: true,
            written_at: Some(Utc::now()),
        }
    }

    pub fn with_work_item_type_enabled(mut self, enabled: bool) -> Self {
        self.work_item_type_enabled = enabled;
        self
    }

    /// Local cache key for a project and work item type
    pub fn key(project_id: &str, work_item_type: &str) -> String {
        format!("{}/{}", project_id, work_item_type).to_lowercase()
    }
}

fn default_enabled() -> bool {
    true
}
