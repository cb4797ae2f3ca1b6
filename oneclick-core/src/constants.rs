//! Well-known setting keys and field names

use serde::{Deserialize, Serialize};

/// Keys of the settings read and written by the rules pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettingKey {
    WorkItemTypeEnabled,
    PersonalRulesEnabled,
    GlobalRulesEnabled,
    UserSubscriptions,
    UserRulesOrdering,
}

impl SettingKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::WorkItemTypeEnabled => "wit-enabled",
            SettingKey::PersonalRulesEnabled => "personal-rules-enabled",
            SettingKey::GlobalRulesEnabled => "global-rules-enabled",
            SettingKey::UserSubscriptions => "user-subscriptions",
            SettingKey::UserRulesOrdering => "user-rules-ordering",
        }
    }

    /// Whether the setting is stored per user rather than per project
    pub fn is_user_scoped(&self) -> bool {
        matches!(
            self,
            SettingKey::UserSubscriptions | SettingKey::UserRulesOrdering
        )
    }
}

impl std::fmt::Display for SettingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keys of the attribute bag carried by a rule record
pub struct RuleFieldNames;

impl RuleFieldNames {
    pub const NAME: &'static str = "name";
    pub const DESCRIPTION: &'static str = "description";
    pub const COLOR: &'static str = "color";
    pub const TRIGGERS: &'static str = "triggers";
    pub const ACTIONS: &'static str = "actions";
}

/// Reference names of the work item fields the pipeline touches
pub struct CoreFieldRefNames;

impl CoreFieldRefNames {
    pub const TAGS: &'static str = "System.Tags";
    pub const WORK_ITEM_TYPE: &'static str = "System.WorkItemType";
    pub const TEAM_PROJECT: &'static str = "System.TeamProject";
}
