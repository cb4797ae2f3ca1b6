//! Rule record compiler
//!
//! Reads the `triggers` and `actions` entries of a rule's attribute bag
//! and turns them into typed [`Trigger`] and [`ActionSpec`] values.

use oneclick_core::{ActionSpec, CoreError, RuleFieldNames, RuleRecord, Trigger};

use crate::CompilerError;

/// An action as it will be executed
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledAction {
    Valid(ActionSpec),
    /// Configuration that failed to compile; running it reports `error`
    Invalid { action_name: String, error: String },
}

impl CompiledAction {
    pub fn action_name(&self) -> &str {
        match self {
            CompiledAction::Valid(spec) => spec.action_name(),
            CompiledAction::Invalid { action_name, .. } => action_name,
        }
    }
}

/// Typed form of a rule's configuration
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledRule {
    pub triggers: Vec<Trigger>,
    pub actions: Vec<CompiledAction>,
    /// Set when the trigger configuration could not be compiled
    pub trigger_error: Option<CompilerError>,
}

/// Compiler for rule records
pub struct RuleCompiler;

impl RuleCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Compile a rule record
    ///
    /// Never fails as a whole: broken trigger configuration leaves the rule
    /// without triggers, and each broken action is kept as
    /// [`CompiledAction::Invalid`] so the failure surfaces when it runs.
    pub fn compile(&self, record: &RuleRecord) -> CompiledRule {
        let (triggers, trigger_error) = match self.compile_triggers(record) {
            Ok(triggers) => (triggers, None),
            Err(e) => {
                tracing::warn!("Rule {} has invalid triggers: {}", record.id, e);
                (Vec::new(), Some(e))
            }
        };

        let actions = match read_list(record, RuleFieldNames::ACTIONS) {
            Ok(items) => items.into_iter().map(compile_action).collect(),
            Err(e) => vec![CompiledAction::Invalid {
                action_name: RuleFieldNames::ACTIONS.to_string(),
                error: e.to_string(),
            }],
        };

        CompiledRule {
            triggers,
            actions,
            trigger_error,
        }
    }

    /// Validate a rule record, reporting the first problem found
    pub fn validate(&self, record: &RuleRecord) -> Result<(), CompilerError> {
        let compiled = self.compile(record);
        if let Some(e) = compiled.trigger_error {
            return Err(e);
        }

        for action in compiled.actions {
            if let CompiledAction::Invalid { action_name, error } = action {
                return Err(CompilerError::InvalidAction {
                    action_name,
                    message: error,
                });
            }
        }

        Ok(())
    }

    fn compile_triggers(&self, record: &RuleRecord) -> Result<Vec<Trigger>, CompilerError> {
        read_list(record, RuleFieldNames::TRIGGERS)?
            .into_iter()
            .map(|item| {
                let trigger: Trigger = serde_json::from_value(item)
                    .map_err(|e| CompilerError::InvalidTrigger(e.to_string()))?;
                trigger
                    .validate()
                    .map_err(|e| CompilerError::InvalidTrigger(e.to_string()))?;
                Ok(trigger)
            })
            .collect()
    }
}

impl Default for RuleCompiler {
    fn default() -> Self {
        Self::new()
    }
}

fn compile_action(item: serde_json::Value) -> CompiledAction {
    let action_name = item
        .get("name")
        .and_then(|n| n.as_str())
        .unwrap_or("unknown")
        .to_string();

    let spec: ActionSpec = match serde_json::from_value(item) {
        Ok(spec) => spec,
        Err(e) => {
            return CompiledAction::Invalid {
                action_name,
                error: e.to_string(),
            }
        }
    };

    match spec.validate() {
        Ok(()) => CompiledAction::Valid(spec),
        Err(CoreError::InvalidAction(error)) => CompiledAction::Invalid { action_name, error },
        Err(e) => CompiledAction::Invalid {
            action_name,
            error: e.to_string(),
        },
    }
}

/// Read a list-valued field; stored either as a JSON array or as a string
/// holding one. A missing field is an empty list.
fn read_list(record: &RuleRecord, field: &str) -> Result<Vec<serde_json::Value>, CompilerError> {
    let malformed = |message: String| CompilerError::MalformedField {
        field: field.to_string(),
        message,
    };

    match record.field(field) {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(serde_json::Value::Array(items)) => Ok(items.clone()),
        Some(serde_json::Value::String(raw)) if raw.trim().is_empty() => Ok(Vec::new()),
        Some(serde_json::Value::String(raw)) => {
            match serde_json::from_str::<serde_json::Value>(raw) {
                Ok(serde_json::Value::Array(items)) => Ok(items),
                Ok(_) => Err(malformed("expected a JSON array".to_string())),
                Err(e) => Err(malformed(e.to_string())),
            }
        }
        Some(_) => Err(malformed("expected a JSON array".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(triggers: serde_json::Value, actions: serde_json::Value) -> RuleRecord {
        let mut record = RuleRecord::new("rule", "Bug", "proj-1");
        record.fields.insert(RuleFieldNames::TRIGGERS.to_string(), triggers);
        record.fields.insert(RuleFieldNames::ACTIONS.to_string(), actions);
        record
    }

    #[test]
    fn test_compile_simple_rule() {
        let compiler = RuleCompiler::new();
        let compiled = compiler.compile(&record(
            json!([{"name": "workItemLoaded", "onlyIfNew": true}]),
            json!([{"name": "addTags", "tags": "triage"}, {"name": "saveWorkItem"}]),
        ));

        assert_eq!(compiled.triggers, vec![Trigger::WorkItemLoaded { only_if_new: true }]);
        assert_eq!(compiled.actions.len(), 2);
        assert_eq!(compiled.actions[1], CompiledAction::Valid(ActionSpec::SaveWorkItem));
        assert!(compiled.trigger_error.is_none());
    }

    #[test]
    fn test_compile_string_encoded_fields() {
        let compiler = RuleCompiler::new();
        let compiled = compiler.compile(&record(
            json!(r#"[{"name":"workItemSaved"}]"#),
            json!(r#"[{"name":"removeTags","tags":"stale"}]"#),
        ));

        assert_eq!(compiled.triggers, vec![Trigger::WorkItemSaved]);
        assert!(compiler.validate(&record(json!("[]"), json!(""))).is_ok());
    }

    #[test]
    fn test_invalid_action_is_kept() {
        let compiler = RuleCompiler::new();
        let rule = record(
            json!([{"name": "workItemSaved"}]),
            json!([{"name": "addTags", "tags": "  "}, {"name": "launchRocket"}]),
        );
        let compiled = compiler.compile(&rule);

        assert!(matches!(
            &compiled.actions[0],
            CompiledAction::Invalid { action_name, .. } if action_name == "addTags"
        ));
        assert_eq!(compiled.actions[1].action_name(), "launchRocket");
        assert!(matches!(
            compiler.validate(&rule),
            Err(CompilerError::InvalidAction { .. })
        ));
    }

    #[test]
    fn test_invalid_triggers_disable_rule() {
        let compiler = RuleCompiler::new();
        let compiled = compiler.compile(&record(
            json!([{"name": "fieldChanged", "fieldRefName": ""}]),
            json!([]),
        ));
        assert!(compiled.triggers.is_empty());
        assert!(matches!(compiled.trigger_error, Some(CompilerError::InvalidTrigger(_))));

        let malformed = compiler.compile(&record(json!("{not json"), json!([])));
        assert!(matches!(
            malformed.trigger_error,
            Some(CompilerError::MalformedField { .. })
        ));
    }
}
