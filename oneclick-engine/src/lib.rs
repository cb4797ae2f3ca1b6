//! OneClick rules engine
//!
//! Sources the rules that apply to a work item form (personal, global and
//! subscribed groups), caches them locally against the server cache stamp,
//! orders them for the current user, and dispatches form lifecycle events
//! to the matching rules.

pub mod background;
pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod host;
pub mod ordering;
pub mod settings;
pub mod sourcing;

pub use background::{BackgroundFailure, BackgroundTasks};
pub use cache::RuleCache;
pub use config::EngineConfig;
pub use dispatcher::RuleDispatcher;
pub use error::EngineError;
pub use host::{EventHost, FormEventListener, HostRegistration};
pub use settings::SettingsService;
pub use sourcing::{RuleList, RuleSourcingEngine};
