//! Executable rule instances

use oneclick_compiler::CompiledRule;
use oneclick_core::{ActionError, FormEvent, FormEventArgs, RuleRecord, Trigger};
use serde::de::DeserializeOwned;
use std::sync::OnceLock;

use crate::{build_action, trigger_matches, Action, WorkItemForm};

/// A rule record wrapped with trigger matching and execution
///
/// Actions are built on first use from the compiled configuration.
pub struct RuleInstance {
    record: RuleRecord,
    compiled: CompiledRule,
    actions: OnceLock<Vec<Box<dyn Action>>>,
}

impl RuleInstance {
    pub fn new(record: RuleRecord, compiled: CompiledRule) -> Self {
        Self {
            record,
            compiled,
            actions: OnceLock::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn name(&self) -> &str {
        self.record.name()
    }

    pub fn work_item_type(&self) -> &str {
        &self.record.work_item_type
    }

    pub fn project_id(&self) -> &str {
        &self.record.project_id
    }

    pub fn record(&self) -> &RuleRecord {
        &self.record
    }

    pub fn triggers(&self) -> &[Trigger] {
        &self.compiled.triggers
    }

    /// Typed read of a raw record field
    pub fn field_value<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.record
            .field(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn actions(&self) -> &[Box<dyn Action>] {
        self.actions
            .get_or_init(|| self.compiled.actions.iter().map(build_action).collect())
    }

    /// Whether every action is valid
    pub fn is_valid(&self) -> bool {
        self.actions().iter().all(|a| a.is_valid())
    }

    pub fn should_run_on_event(&self, event: FormEvent, args: &FormEventArgs) -> bool {
        self.compiled
            .triggers
            .iter()
            .any(|t| trigger_matches(t, event, args))
    }

    /// Run the actions in order; the first failure stops the rule
    pub async fn run(&self, form: &dyn WorkItemForm) -> Option<ActionError> {
        for action in self.actions() {
            tracing::debug!(rule_id = %self.id(), action = action.name(), "Running action");
            if let Err(e) = action.run(form).await {
                tracing::warn!(
                    rule_id = %self.id(),
                    action = action.name(),
                    error = %e,
                    "Rule action failed"
                );
                return Some(ActionError::new(action.name(), e.to_string()));
            }
        }
        None
    }
}

impl std::fmt::Debug for RuleInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleInstance")
            .field("id", &self.record.id)
            .field("name", &self.name())
            .field("triggers", &self.compiled.triggers)
            .finish()
    }
}
