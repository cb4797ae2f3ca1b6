//! Work item form lifecycle events

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::CoreError;

/// A lifecycle notification raised by the hosting work item form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FormEvent {
    Loaded,
    FieldChanged,
    Saved,
    Refreshed,
    Reset,
    Unloaded,
}

impl FormEvent {
    pub const ALL: [FormEvent; 6] = [
        FormEvent::Loaded,
        FormEvent::FieldChanged,
        FormEvent::Saved,
        FormEvent::Refreshed,
        FormEvent::Reset,
        FormEvent::Unloaded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FormEvent::Loaded => "loaded",
            FormEvent::FieldChanged => "fieldChanged",
            FormEvent::Saved => "saved",
            FormEvent::Refreshed => "refreshed",
            FormEvent::Reset => "reset",
            FormEvent::Unloaded => "unloaded",
        }
    }
}

impl std::fmt::Display for FormEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormEvent {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FormEvent::ALL
            .into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::UnknownEvent(s.to_string()))
    }
}

/// Payload delivered with a lifecycle event
///
/// One shape covers every event; fields that do not apply to an
/// event are left at their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormEventArgs {
    /// Work item id, absent for unsaved items
    pub id: Option<i64>,
    pub is_new: bool,
    pub is_read_only: bool,
    /// Changed field reference names mapped to their new values
    pub changed_fields: BTreeMap<String, serde_json::Value>,
}

impl FormEventArgs {
    pub fn loaded(id: Option<i64>, is_new: bool) -> Self {
        Self {
            id,
            is_new,
            ..Self::default()
        }
    }

    pub fn field_changed(field_ref_name: &str, value: serde_json::Value) -> Self {
        let mut changed_fields = BTreeMap::new();
        changed_fields.insert(field_ref_name.to_string(), value);
        Self {
            changed_fields,
            ..Self::default()
        }
    }

    /// Look up a changed field, ignoring case of the reference name
    pub fn changed_value(&self, field_ref_name: &str) -> Option<&serde_json::Value> {
        self.changed_fields
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(field_ref_name))
            .map(|(_, value)| value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event_names() {
        assert_eq!("fieldChanged".parse::<FormEvent>().unwrap(), FormEvent::FieldChanged);
        assert_eq!("LOADED".parse::<FormEvent>().unwrap(), FormEvent::Loaded);
        assert!("closed".parse::<FormEvent>().is_err());
    }

    #[test]
    fn test_changed_value_ignores_case() {
        let args = FormEventArgs::field_changed("System.State", serde_json::json!("Active"));
        assert_eq!(args.changed_value("system.state"), Some(&serde_json::json!("Active")));
        assert!(args.changed_value("System.Title").is_none());
    }

    #[test]
    fn test_args_deserialize_with_missing_fields() {
        let args: FormEventArgs = serde_json::from_str(r#"{"isNew": true}"#).unwrap();
        assert!(args.is_new);
        assert!(args.changed_fields.is_empty());
        assert_eq!(args.id, None);
    }
}
