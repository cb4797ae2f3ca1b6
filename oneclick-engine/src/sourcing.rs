//! Rule sourcing
//!
//! Resolves the rules that apply to the open work item: from the local
//! cache when it is still valid for the server cache stamp, otherwise from
//! the personal, global and subscribed rule groups on the server. The
//! result is ordered for the current user and wrapped as [`RuleInstance`]s.

use futures::future::{BoxFuture, FutureExt, Shared};
use oneclick_core::{
    equals_ignore_case, CacheSnapshot, RuleRecord, SettingKey, UserRuleOrder,
};
use oneclick_executor::{FormContext, RuleFactory, RuleInstance};
use oneclick_storage::{LocalCache, RuleCatalog, RuleGroupCatalog, SettingStore, Storage};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::ordering::sort_by_user_order;
use crate::{BackgroundTasks, EngineConfig, EngineError, RuleCache, SettingsService};

/// Ordered rules ready for dispatch
pub type RuleList = Vec<Arc<RuleInstance>>;

type LoadKey = (String, bool);
type LoadFuture = Shared<BoxFuture<'static, Result<RuleList, EngineError>>>;

#[derive(Debug, Default)]
struct SourcingState {
    context: Option<FormContext>,
    cache_stamp: Option<u64>,
    rule_order: UserRuleOrder,
    work_item_type_enabled: bool,
}

struct EngineInner {
    config: EngineConfig,
    settings: SettingsService,
    rule_groups: Arc<dyn RuleGroupCatalog>,
    rules: Arc<dyn RuleCatalog>,
    cache: RuleCache,
    factory: RuleFactory,
    background: BackgroundTasks,
    initialized: OnceCell<()>,
    state: RwLock<SourcingState>,
    in_flight: Mutex<HashMap<LoadKey, LoadFuture>>,
    loading: AtomicUsize,
}

/// Marks a load as in progress and clears its in-flight entry when dropped
///
/// Lives inside the spawned load task, so it is released even when every
/// caller has stopped waiting or the task panics.
struct LoadGuard {
    inner: Arc<EngineInner>,
    key: LoadKey,
}

impl LoadGuard {
    fn new(inner: Arc<EngineInner>, key: LoadKey) -> Self {
        inner.loading.fetch_add(1, Ordering::SeqCst);
        Self { inner, key }
    }
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        self.inner.in_flight.lock().remove(&self.key);
        self.inner.loading.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Supplies the ordered rule list for one work item type and project
#[derive(Clone)]
pub struct RuleSourcingEngine {
    inner: Arc<EngineInner>,
}

impl RuleSourcingEngine {
    pub fn new(
        config: EngineConfig,
        settings: Arc<dyn SettingStore>,
        rule_groups: Arc<dyn RuleGroupCatalog>,
        rules: Arc<dyn RuleCatalog>,
        local_cache: Arc<dyn LocalCache>,
    ) -> Self {
        let factory = RuleFactory::new(config.compiled_cache_size);
        Self {
            inner: Arc::new(EngineInner {
                config,
                settings: SettingsService::new(settings),
                rule_groups,
                rules,
                cache: RuleCache::new(local_cache),
                factory,
                background: BackgroundTasks::new(),
                initialized: OnceCell::new(),
                state: RwLock::new(SourcingState {
                    work_item_type_enabled: true,
                    ..SourcingState::default()
                }),
                in_flight: Mutex::new(HashMap::new()),
                loading: AtomicUsize::new(0),
            }),
        }
    }

    /// Engine over a single backend serving settings, groups and rules
    pub fn with_storage<S: Storage + 'static>(
        config: EngineConfig,
        storage: Arc<S>,
        local_cache: Arc<dyn LocalCache>,
    ) -> Self {
        Self::new(config, storage.clone(), storage.clone(), storage, local_cache)
    }

    /// Bind the engine to a work item type and project
    ///
    /// Reads the cache stamp and the user's rule order. Only the first
    /// successful call has any effect.
    pub async fn initialize(&self, work_item_type: &str, project_id: &str) -> Result<(), EngineError> {
        let inner = &self.inner;
        inner
            .initialized
            .get_or_try_init(|| async {
                let (cache_stamp, rule_order) = tokio::try_join!(
                    inner.settings.read_cache_stamp(work_item_type, project_id),
                    inner.settings.load_setting(
                        SettingKey::UserRulesOrdering,
                        UserRuleOrder::new(),
                        work_item_type,
                        project_id,
                    ),
                )?;

                tracing::info!(
                    work_item_type,
                    project_id,
                    cache_stamp = ?cache_stamp,
                    ranked_rules = rule_order.len(),
                    "Rule sourcing initialized"
                );

                let mut state = inner.state.write();
                state.context = Some(FormContext {
                    work_item_type: work_item_type.to_string(),
                    project_id: project_id.to_string(),
                });
                state.cache_stamp = cache_stamp;
                state.rule_order = normalize_order(rule_order);
                Ok::<(), EngineError>(())
            })
            .await?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.initialized()
    }

    /// Ordered rules for the bound work item type and project
    ///
    /// Overlapping calls with the same `force_from_server` share one load.
    /// The load runs on its own task and completes even if no caller waits.
    pub async fn get_rules(&self, force_from_server: bool) -> Result<RuleList, EngineError> {
        let context = self.context().ok_or(EngineError::NotInitialized)?;
        let key = (
            CacheSnapshot::key(&context.project_id, &context.work_item_type),
            force_from_server,
        );

        let load = {
            let mut in_flight = self.inner.in_flight.lock();
            match in_flight.get(&key) {
                Some(load) => {
                    tracing::debug!(key = %key.0, force_from_server, "Joining in-flight rule load");
                    load.clone()
                }
                None => {
                    // The map lock is held until the entry is inserted, so the
                    // task cannot clear it first.
                    let guard = LoadGuard::new(self.inner.clone(), key.clone());
                    let task = tokio::spawn(async move {
                        let inner = guard.inner.clone();
                        let result = inner.load_rules(context, force_from_server).await;
                        drop(guard);
                        result
                    });
                    let load = task
                        .map(|joined| match joined {
                            Ok(result) => result,
                            Err(e) => Err(EngineError::SourceLoad(format!(
                                "rule load task failed: {}",
                                e
                            ))),
                        })
                        .boxed()
                        .shared();
                    in_flight.insert(key, load.clone());
                    load
                }
            }
        };

        load.await
    }

    /// Re-read the server cache stamp
    pub async fn refresh_cache_stamp(&self) -> Result<Option<u64>, EngineError> {
        let context = self.context().ok_or(EngineError::NotInitialized)?;
        let stamp = self
            .inner
            .settings
            .read_cache_stamp(&context.work_item_type, &context.project_id)
            .await?;
        tracing::debug!(cache_stamp = ?stamp, "Cache stamp refreshed");
        self.inner.state.write().cache_stamp = stamp;
        Ok(stamp)
    }

    pub fn context(&self) -> Option<FormContext> {
        self.inner.state.read().context.clone()
    }

    pub fn cache_stamp(&self) -> Option<u64> {
        self.inner.state.read().cache_stamp
    }

    pub fn rule_order(&self) -> UserRuleOrder {
        self.inner.state.read().rule_order.clone()
    }

    pub fn set_rule_order(&self, order: UserRuleOrder) {
        self.inner.state.write().rule_order = normalize_order(order);
    }

    /// Save the user's rule order without waiting for the write
    pub fn persist_rule_order(&self, order: UserRuleOrder) -> Result<(), EngineError> {
        let context = self.context().ok_or(EngineError::NotInitialized)?;
        let settings = self.inner.settings.clone();
        self.inner.background.spawn("persist-rule-order", async move {
            settings
                .update_setting(
                    SettingKey::UserRulesOrdering,
                    &order,
                    &context.work_item_type,
                    &context.project_id,
                )
                .await?;
            tracing::debug!(ranked_rules = order.len(), "Rule order saved");
            Ok(())
        });
        Ok(())
    }

    /// Whether rules were enabled for the work item type at the last load
    pub fn work_item_type_enabled(&self) -> bool {
        self.inner.state.read().work_item_type_enabled
    }

    pub fn is_loading(&self) -> bool {
        self.inner.loading.load(Ordering::SeqCst) > 0
    }

    pub fn background(&self) -> &BackgroundTasks {
        &self.inner.background
    }

    pub fn factory(&self) -> &RuleFactory {
        &self.inner.factory
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }
}

impl EngineInner {
    async fn load_rules(&self, context: FormContext, force_from_server: bool) -> Result<RuleList, EngineError> {
        let cache_stamp = self.state.read().cache_stamp;

        let cached = if force_from_server {
            None
        } else {
            self.cache
                .load(&context.project_id, &context.work_item_type, cache_stamp)
        };

        let mut records = match cached {
            Some(cached) => {
                self.state.write().work_item_type_enabled = cached.work_item_type_enabled;
                cached.rules
            }
            None => {
                let (records, enabled) = self.load_from_server(&context).await?;
                self.state.write().work_item_type_enabled = enabled;
                if let Some(stamp) = cache_stamp {
                    if let Err(e) = self.cache.store(
                        stamp,
                        &context.project_id,
                        &context.work_item_type,
                        &records,
                        enabled,
                    ) {
                        tracing::warn!("Failed to write rule cache: {}", e);
                    }
                }
                records
            }
        };

        let order = self.state.read().rule_order.clone();
        sort_by_user_order(&mut records, &order, |r| r.id.as_str());

        tracing::info!(
            work_item_type = %context.work_item_type,
            project_id = %context.project_id,
            rules = records.len(),
            force_from_server,
            "Rules loaded"
        );
        Ok(self.factory.build_all(records))
    }

    /// Returns the rules and whether the work item type is enabled
    async fn load_from_server(&self, context: &FormContext) -> Result<(Vec<RuleRecord>, bool), EngineError> {
        let work_item_type = context.work_item_type.as_str();
        let project_id = context.project_id.as_str();

        let (type_enabled, personal_enabled, global_enabled, subscriptions) = tokio::try_join!(
            self.settings
                .load_setting(SettingKey::WorkItemTypeEnabled, true, work_item_type, project_id),
            self.settings
                .load_setting(SettingKey::PersonalRulesEnabled, true, work_item_type, project_id),
            self.settings
                .load_setting(SettingKey::GlobalRulesEnabled, true, work_item_type, project_id),
            self.settings.load_setting::<Vec<String>>(
                SettingKey::UserSubscriptions,
                Vec::new(),
                work_item_type,
                project_id,
            ),
        )?;

        if !type_enabled {
            tracing::info!(work_item_type, project_id, "Rules are disabled for work item type");
            return Ok((Vec::new(), false));
        }

        let mut group_ids = Vec::new();
        if personal_enabled {
            group_ids.push(self.config.personal_group_id.clone());
        }
        if global_enabled {
            group_ids.push(self.config.global_group_id.clone());
        }

        if !subscriptions.is_empty() {
            let groups = self
                .rule_groups
                .load_rule_groups(work_item_type, project_id)
                .await?;

            let mut retained = Vec::with_capacity(subscriptions.len());
            for id in &subscriptions {
                match groups.iter().find(|g| equals_ignore_case(&g.id, id)) {
                    Some(group) => {
                        retained.push(id.clone());
                        if group.disabled {
                            tracing::debug!(group_id = %id, "Skipping disabled rule group");
                        } else if !group_ids.iter().any(|g| equals_ignore_case(g, id)) {
                            group_ids.push(group.id.clone());
                        }
                    }
                    None => tracing::debug!(group_id = %id, "Subscribed rule group no longer exists"),
                }
            }

            if retained.len() != subscriptions.len() {
                self.prune_subscriptions(retained, context);
            }
        }

        if group_ids.is_empty() {
            return Ok((Vec::new(), true));
        }

        let rules = self
            .rules
            .load_rules_for_groups(&group_ids, project_id)
            .await?
            .into_iter()
            .filter(|r| !r.disabled && equals_ignore_case(&r.work_item_type, work_item_type))
            .collect();
        Ok((rules, true))
    }

    fn prune_subscriptions(&self, retained: Vec<String>, context: &FormContext) {
        let settings = self.settings.clone();
        let context = context.clone();
        self.background.spawn("prune-subscriptions", async move {
            settings
                .update_setting(
                    SettingKey::UserSubscriptions,
                    &retained,
                    &context.work_item_type,
                    &context.project_id,
                )
                .await?;
            tracing::info!(remaining = retained.len(), "Removed deleted rule groups from subscriptions");
            Ok(())
        });
    }
}

fn normalize_order(order: UserRuleOrder) -> UserRuleOrder {
    order
        .into_iter()
        .map(|(id, rank)| (id.to_lowercase(), rank))
        .collect()
}
