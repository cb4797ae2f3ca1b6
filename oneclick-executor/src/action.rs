//! Actions a rule performs on the work item form

use async_trait::async_trait;
use oneclick_compiler::CompiledAction;
use oneclick_core::{equals_ignore_case, split_tags, ActionSpec, CoreFieldRefNames};

use crate::{ExecutorError, WorkItemForm};

/// One step of a rule
#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the configuration allows the action to run
    fn is_valid(&self) -> bool;

    /// Whether the configuration changed since the action was built
    fn is_dirty(&self) -> bool;

    async fn run(&self, form: &dyn WorkItemForm) -> Result<(), ExecutorError>;
}

/// Build the action for a compiled configuration entry
pub fn build_action(action: &CompiledAction) -> Box<dyn Action> {
    match action {
        CompiledAction::Valid(ActionSpec::AddTags { tags }) => Box::new(AddTagsAction::new(tags)),
        CompiledAction::Valid(ActionSpec::RemoveTags { tags }) => {
            Box::new(RemoveTagsAction::new(tags))
        }
        CompiledAction::Valid(ActionSpec::SetFieldValue {
            field_ref_name,
            field_value,
        }) => Box::new(SetFieldValueAction::new(field_ref_name, field_value.clone())),
        CompiledAction::Valid(ActionSpec::SaveWorkItem) => Box::new(SaveWorkItemAction),
        CompiledAction::Invalid { action_name, error } => Box::new(InvalidAction {
            name: action_name.clone(),
            error: error.clone(),
        }),
    }
}

async fn current_tags(form: &dyn WorkItemForm) -> Result<Vec<String>, ExecutorError> {
    let value = form.field_value(CoreFieldRefNames::TAGS).await?;
    Ok(match value {
        Some(serde_json::Value::String(tags)) => split_tags(&tags),
        _ => Vec::new(),
    })
}

fn contains_tag(tags: &[String], tag: &str) -> bool {
    tags.iter().any(|t| equals_ignore_case(t, tag))
}

/// Adds tags to the work item
pub struct AddTagsAction {
    tags: String,
    original_tags: String,
}

impl AddTagsAction {
    pub fn new(tags: &str) -> Self {
        Self {
            tags: tags.to_string(),
            original_tags: tags.to_string(),
        }
    }

    pub fn set_tags(&mut self, tags: &str) {
        self.tags = tags.to_string();
    }
}

#[async_trait]
impl Action for AddTagsAction {
    fn name(&self) -> &str {
        "addTags"
    }

    fn is_valid(&self) -> bool {
        !split_tags(&self.tags).is_empty()
    }

    fn is_dirty(&self) -> bool {
        self.tags.to_lowercase() != self.original_tags.to_lowercase()
    }

    async fn run(&self, form: &dyn WorkItemForm) -> Result<(), ExecutorError> {
        let mut tags = current_tags(form).await?;
        for tag in split_tags(&self.tags) {
            if !contains_tag(&tags, &tag) {
                tags.push(tag);
            }
        }
        form.set_field_value(
            CoreFieldRefNames::TAGS,
            serde_json::Value::String(tags.join(";")),
        )
        .await
    }
}

/// Removes tags from the work item
pub struct RemoveTagsAction {
    tags: String,
    original_tags: String,
}

impl RemoveTagsAction {
    pub fn new(tags: &str) -> Self {
        Self {
            tags: tags.to_string(),
            original_tags: tags.to_string(),
        }
    }

    pub fn set_tags(&mut self, tags: &str) {
        self.tags = tags.to_string();
    }
}

#[async_trait]
impl Action for RemoveTagsAction {
    fn name(&self) -> &str {
        "removeTags"
    }

    fn is_valid(&self) -> bool {
        !split_tags(&self.tags).is_empty()
    }

    fn is_dirty(&self) -> bool {
        self.tags.to_lowercase() != self.original_tags.to_lowercase()
    }

    async fn run(&self, form: &dyn WorkItemForm) -> Result<(), ExecutorError> {
        let removed = split_tags(&self.tags);
        let tags: Vec<String> = current_tags(form)
            .await?
            .into_iter()
            .filter(|t| !contains_tag(&removed, t))
            .collect();
        form.set_field_value(
            CoreFieldRefNames::TAGS,
            serde_json::Value::String(tags.join(";")),
        )
        .await
    }
}

/// Writes a fixed value to a field
pub struct SetFieldValueAction {
    field_ref_name: String,
    field_value: serde_json::Value,
    original: (String, serde_json::Value),
}

impl SetFieldValueAction {
    pub fn new(field_ref_name: &str, field_value: serde_json::Value) -> Self {
        Self {
            field_ref_name: field_ref_name.to_string(),
            field_value: field_value.clone(),
            original: (field_ref_name.to_string(), field_value),
        }
    }

    pub fn set_field(&mut self, field_ref_name: &str, field_value: serde_json::Value) {
        self.field_ref_name = field_ref_name.to_string();
        self.field_value = field_value;
    }
}

#[async_trait]
impl Action for SetFieldValueAction {
    fn name(&self) -> &str {
        "setFieldValue"
    }

    fn is_valid(&self) -> bool {
        !self.field_ref_name.trim().is_empty()
    }

    fn is_dirty(&self) -> bool {
        !self.field_ref_name.eq_ignore_ascii_case(&self.original.0)
            || self.field_value != self.original.1
    }

    async fn run(&self, form: &dyn WorkItemForm) -> Result<(), ExecutorError> {
        form.set_field_value(&self.field_ref_name, self.field_value.clone())
            .await
    }
}

/// Saves the work item
pub struct SaveWorkItemAction;

#[async_trait]
impl Action for SaveWorkItemAction {
    fn name(&self) -> &str {
        "saveWorkItem"
    }

    fn is_valid(&self) -> bool {
        true
    }

    fn is_dirty(&self) -> bool {
        false
    }

    async fn run(&self, form: &dyn WorkItemForm) -> Result<(), ExecutorError> {
        form.save().await
    }
}

/// Stand-in for configuration that failed to compile
pub struct InvalidAction {
    name: String,
    error: String,
}

#[async_trait]
impl Action for InvalidAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_valid(&self) -> bool {
        false
    }

    fn is_dirty(&self) -> bool {
        false
    }

    async fn run(&self, _form: &dyn WorkItemForm) -> Result<(), ExecutorError> {
        Err(ExecutorError::InvalidAction(self.error.clone()))
    }
}
