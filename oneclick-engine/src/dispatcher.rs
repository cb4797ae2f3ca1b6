//! Dispatch of form lifecycle events to rules

use async_trait::async_trait;
use oneclick_core::{equals_ignore_case, ActionError, FormEvent, FormEventArgs};
use oneclick_executor::WorkItemForm;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

use crate::host::{EventHost, FormEventListener, HostRegistration};
use crate::ordering::{move_item, order_from_positions};
use crate::{EngineError, RuleList, RuleSourcingEngine};

/// Runs the rules of one work item form
///
/// Holds the rule list loaded on the first `loaded` event and the most
/// recent action failure.
pub struct RuleDispatcher {
    engine: RuleSourcingEngine,
    form: Arc<dyn WorkItemForm>,
    rules: RwLock<Option<RuleList>>,
    last_error: Mutex<Option<ActionError>>,
}

impl RuleDispatcher {
    pub fn new(engine: RuleSourcingEngine, form: Arc<dyn WorkItemForm>) -> Self {
        Self {
            engine,
            form,
            rules: RwLock::new(None),
            last_error: Mutex::new(None),
        }
    }

    pub fn engine(&self) -> &RuleSourcingEngine {
        &self.engine
    }

    pub fn form(&self) -> &Arc<dyn WorkItemForm> {
        &self.form
    }

    /// Handle a lifecycle event
    ///
    /// Errors come only from loading rules. Action failures land in the
    /// last error slot.
    pub async fn on_event(&self, event: FormEvent, args: FormEventArgs) -> Result<(), EngineError> {
        if event == FormEvent::Loaded && !self.has_rules() && !self.engine.is_loading() {
            self.load().await?;
        }
        self.fire(event, &args).await;
        Ok(())
    }

    /// Reload the rules from the server
    pub async fn refresh(&self) -> Result<RuleList, EngineError> {
        self.ensure_initialized().await?;
        self.engine.refresh_cache_stamp().await?;
        let rules = self.engine.get_rules(true).await?;
        *self.rules.write() = Some(rules.clone());
        Ok(rules)
    }

    /// Move a rule and save the resulting order for the user
    pub fn reorder(&self, old_index: usize, new_index: usize) -> Result<RuleList, EngineError> {
        if old_index == new_index {
            return Ok(self.rules());
        }

        let reordered = {
            let mut guard = self.rules.write();
            let len = guard.as_ref().map_or(0, Vec::len);
            match guard.as_mut() {
                Some(rules) if old_index < len && new_index < len => {
                    move_item(rules, old_index, new_index);
                    rules.clone()
                }
                _ => {
                    return Err(EngineError::InvalidReorder {
                        old_index,
                        new_index,
                        len,
                    })
                }
            }
        };

        let order = order_from_positions(reordered.iter().map(|r| r.id()));
        self.engine.set_rule_order(order.clone());
        self.engine.persist_rule_order(order)?;
        tracing::debug!(old_index, new_index, "Rules reordered");
        Ok(reordered)
    }

    /// Run one rule regardless of its triggers
    pub async fn execute_rule(&self, rule_id: &str) -> Result<Option<ActionError>, EngineError> {
        let rule = self
            .rules()
            .into_iter()
            .find(|r| equals_ignore_case(r.id(), rule_id))
            .ok_or_else(|| EngineError::RuleNotFound(rule_id.to_string()))?;

        tracing::info!(rule_id = %rule.id(), "Running rule on demand");
        let error = rule.run(self.form.as_ref()).await;
        if let Some(error) = &error {
            self.record_error(error.clone());
        }
        Ok(error)
    }

    pub fn last_error(&self) -> Option<ActionError> {
        self.last_error.lock().clone()
    }

    pub fn clear_error(&self) {
        *self.last_error.lock() = None;
    }

    /// Held rules, empty before the first load
    pub fn rules(&self) -> RuleList {
        self.rules.read().clone().unwrap_or_default()
    }

    pub fn has_rules(&self) -> bool {
        self.rules.read().is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.engine.is_loading()
    }

    /// Register with the host until the returned guard is dropped
    pub fn attach(self: &Arc<Self>, host: &Arc<EventHost>, contribution_id: &str) -> HostRegistration {
        host.register(contribution_id, self.clone());
        HostRegistration::new(host, contribution_id)
    }

    async fn ensure_initialized(&self) -> Result<(), EngineError> {
        if self.engine.is_initialized() {
            return Ok(());
        }
        let context = self.form.context().await?;
        self.engine
            .initialize(&context.work_item_type, &context.project_id)
            .await
    }

    async fn load(&self) -> Result<(), EngineError> {
        self.ensure_initialized().await?;
        let rules = self.engine.get_rules(false).await?;
        *self.rules.write() = Some(rules);
        Ok(())
    }

    async fn fire(&self, event: FormEvent, args: &FormEventArgs) {
        let rules = self.rules.read().clone();
        let Some(rules) = rules else {
            return;
        };

        for rule in rules.iter() {
            if !rule.should_run_on_event(event, args) {
                continue;
            }
            tracing::info!(
                rule_id = %rule.id(),
                event = %event,
                work_item_type = %rule.work_item_type(),
                project_id = %rule.project_id(),
                "RuleTrigger"
            );
            if let Some(error) = rule.run(self.form.as_ref()).await {
                self.record_error(error);
            }
        }
    }

    fn record_error(&self, error: ActionError) {
        tracing::warn!("Rule action failed: {}", error);
        *self.last_error.lock() = Some(error);
    }
}

#[async_trait]
impl FormEventListener for RuleDispatcher {
    async fn on_form_event(&self, event: FormEvent, args: FormEventArgs) {
        if let Err(e) = self.on_event(event, args).await {
            tracing::warn!(event = %event, "Failed to load rules: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EngineConfig;
    use oneclick_core::{ActionSpec, CoreFieldRefNames, RuleRecord, SettingKey, Trigger};
    use oneclick_executor::InMemoryWorkItemForm;
    use oneclick_storage::{InMemoryLocalCache, InMemoryStorage, SettingScope};
    use serde_json::json;
    use std::time::Duration;

    const WIT: &str = "Bug";
    const PROJECT: &str = "proj-1";

    fn rule(id: &str, actions: Vec<ActionSpec>) -> RuleRecord {
        let mut record = RuleRecord::new(id, WIT, PROJECT)
            .with_triggers(vec![Trigger::WorkItemSaved])
            .with_actions(actions);
        record.id = id.to_string();
        record
    }

    fn tag(tags: &str) -> ActionSpec {
        ActionSpec::AddTags {
            tags: tags.to_string(),
        }
    }

    fn setup(rules: Vec<RuleRecord>) -> (Arc<InMemoryStorage>, Arc<InMemoryWorkItemForm>, Arc<RuleDispatcher>) {
        let storage = Arc::new(InMemoryStorage::new());
        for record in rules {
            storage.add_rule("personal", record);
        }
        let engine = RuleSourcingEngine::with_storage(
            EngineConfig::default(),
            storage.clone(),
            Arc::new(InMemoryLocalCache::new()),
        );
        let form = Arc::new(InMemoryWorkItemForm::new(WIT, PROJECT));
        let dispatcher = Arc::new(RuleDispatcher::new(engine, form.clone()));
        (storage, form, dispatcher)
    }

    fn ids(rules: &RuleList) -> Vec<String> {
        rules.iter().map(|r| r.id().to_string()).collect()
    }

    #[tokio::test]
    async fn test_events_before_load_are_ignored() {
        let (storage, form, dispatcher) = setup(vec![rule("a", vec![tag("x")])]);

        dispatcher.on_event(FormEvent::Saved, FormEventArgs::default()).await.unwrap();

        assert!(!dispatcher.has_rules());
        assert_eq!(storage.rule_loads(), 0);
        assert!(form.writes().is_empty());
    }

    #[tokio::test]
    async fn test_loaded_event_loads_once() {
        let (storage, _, dispatcher) = setup(vec![rule("a", vec![tag("x")])]);

        dispatcher.on_event(FormEvent::Loaded, FormEventArgs::loaded(Some(1), false)).await.unwrap();
        dispatcher.on_event(FormEvent::Loaded, FormEventArgs::loaded(Some(1), false)).await.unwrap();

        assert_eq!(ids(&dispatcher.rules()), vec!["a"]);
        assert_eq!(storage.rule_loads(), 1);
    }

    #[tokio::test]
    async fn test_failing_rule_does_not_stop_siblings() {
        let (_, form, dispatcher) = setup(vec![
            rule("first", vec![tag("one")]),
            rule(
                "second",
                vec![
                    ActionSpec::SetFieldValue {
                        field_ref_name: "System.State".to_string(),
                        field_value: json!("Closed"),
                    },
                    tag("never"),
                ],
            ),
            rule("third", vec![tag("three")]),
        ]);
        form.mark_read_only("System.State");

        dispatcher.on_event(FormEvent::Loaded, FormEventArgs::default()).await.unwrap();
        dispatcher.on_event(FormEvent::Saved, FormEventArgs::default()).await.unwrap();

        assert_eq!(form.get(CoreFieldRefNames::TAGS), Some(json!("one;three")));
        let error = dispatcher.last_error().unwrap();
        assert_eq!(error.action_name, "setFieldValue");

        dispatcher.clear_error();
        assert!(dispatcher.last_error().is_none());
    }

    #[tokio::test]
    async fn test_success_keeps_previous_error() {
        let (_, form, dispatcher) = setup(vec![rule("a", vec![tag("x")])]);
        dispatcher.on_event(FormEvent::Loaded, FormEventArgs::default()).await.unwrap();
        dispatcher.record_error(ActionError::new("saveWorkItem", "conflict"));

        dispatcher.on_event(FormEvent::Saved, FormEventArgs::default()).await.unwrap();

        assert_eq!(form.get(CoreFieldRefNames::TAGS), Some(json!("x")));
        assert_eq!(dispatcher.last_error().unwrap().error, "conflict");
    }

    #[tokio::test]
    async fn test_reorder_persists_positions() {
        let (storage, _, dispatcher) = setup(vec![
            rule("a", vec![]),
            rule("b", vec![]),
            rule("c", vec![]),
        ]);
        dispatcher.on_event(FormEvent::Loaded, FormEventArgs::default()).await.unwrap();

        let reordered = dispatcher.reorder(2, 0).unwrap();
        dispatcher.engine().background().drain().await;

        assert_eq!(ids(&reordered), vec!["c", "a", "b"]);
        assert_eq!(ids(&dispatcher.rules()), vec!["c", "a", "b"]);
        assert_eq!(
            storage.setting(
                SettingKey::UserRulesOrdering,
                &SettingScope::new(WIT, PROJECT, true)
            ),
            Some(json!({"c": 0, "a": 1, "b": 2}))
        );
    }

    #[tokio::test]
    async fn test_reorder_bounds() {
        let (storage, _, dispatcher) = setup(vec![rule("a", vec![]), rule("b", vec![])]);
        dispatcher.on_event(FormEvent::Loaded, FormEventArgs::default()).await.unwrap();

        assert_eq!(ids(&dispatcher.reorder(1, 1).unwrap()), vec!["a", "b"]);
        assert!(matches!(
            dispatcher.reorder(0, 2),
            Err(EngineError::InvalidReorder { len: 2, .. })
        ));
        dispatcher.engine().background().drain().await;
        assert_eq!(storage.setting_updates(SettingKey::UserRulesOrdering), 0);
    }

    #[tokio::test]
    async fn test_refresh_reloads_from_server() {
        let (storage, _, dispatcher) = setup(vec![rule("a", vec![])]);
        storage.set_cache_stamp(WIT, PROJECT, 1);
        dispatcher.on_event(FormEvent::Loaded, FormEventArgs::default()).await.unwrap();

        storage.add_rule("personal", rule("b", vec![]));
        storage.bump_cache_stamp(WIT, PROJECT);
        let rules = dispatcher.refresh().await.unwrap();

        assert_eq!(ids(&rules), vec!["a", "b"]);
        assert_eq!(dispatcher.engine().cache_stamp(), Some(2));
        assert_eq!(storage.rule_loads(), 2);
    }

    #[tokio::test]
    async fn test_execute_rule_by_id() {
        let (_, form, dispatcher) = setup(vec![
            rule("tagger", vec![tag("manual")]),
            rule("broken", vec![ActionSpec::RemoveTags { tags: " ".to_string() }]),
        ]);
        dispatcher.on_event(FormEvent::Loaded, FormEventArgs::default()).await.unwrap();

        assert!(dispatcher.execute_rule("TAGGER").await.unwrap().is_none());
        assert_eq!(form.get(CoreFieldRefNames::TAGS), Some(json!("manual")));

        let error = dispatcher.execute_rule("broken").await.unwrap().unwrap();
        assert_eq!(error.action_name, "removeTags");
        assert_eq!(dispatcher.last_error(), Some(error));

        assert!(matches!(
            dispatcher.execute_rule("missing").await,
            Err(EngineError::RuleNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_load_failure_reaches_caller() {
        let (storage, _, dispatcher) = setup(vec![]);
        storage.fail_loads(true);

        let result = dispatcher.on_event(FormEvent::Loaded, FormEventArgs::default()).await;
        assert!(matches!(result, Err(EngineError::SourceLoad(_))));
        assert!(!dispatcher.has_rules());
    }

    #[tokio::test]
    async fn test_cancelled_loaded_event_does_not_block_next_load() {
        let storage = Arc::new(InMemoryStorage::new().with_latency(Duration::from_millis(100)));
        storage.add_rule("personal", rule("a", vec![tag("x")]));
        let engine = RuleSourcingEngine::with_storage(
            EngineConfig::default(),
            storage.clone(),
            Arc::new(InMemoryLocalCache::new()),
        );
        let form = Arc::new(InMemoryWorkItemForm::new(WIT, PROJECT));
        let dispatcher = Arc::new(RuleDispatcher::new(engine, form));

        let cancelled = tokio::time::timeout(
            Duration::from_millis(20),
            dispatcher.on_event(FormEvent::Loaded, FormEventArgs::default()),
        )
        .await;
        assert!(cancelled.is_err());
        assert!(!dispatcher.has_rules());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!dispatcher.is_loading());

        dispatcher.on_event(FormEvent::Loaded, FormEventArgs::default()).await.unwrap();
        assert!(dispatcher.has_rules());
        assert_eq!(ids(&dispatcher.rules()), vec!["a"]);
    }

    #[tokio::test]
    async fn test_attach_and_detach() {
        let (_, form, dispatcher) = setup(vec![rule("a", vec![tag("hosted")])]);
        let host = Arc::new(EventHost::new());

        let registration = dispatcher.attach(&host, "oneclick.rules");
        assert!(host.is_registered("oneclick.rules"));

        host.notify(FormEvent::Loaded, FormEventArgs::default()).await;
        host.notify(FormEvent::Saved, FormEventArgs::default()).await;
        assert_eq!(form.get(CoreFieldRefNames::TAGS), Some(json!("hosted")));

        drop(registration);
        assert!(!host.is_registered("oneclick.rules"));
    }
}
