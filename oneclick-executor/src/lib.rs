//! Executor for OneClick rules
//!
//! Wraps rule records as executable [`RuleInstance`]s: trigger matching
//! against form lifecycle events, and sequential execution of the rule's
//! actions against the hosted work item form.

pub mod action;
pub mod error;
pub mod factory;
pub mod form;
pub mod rule;
pub mod trigger;

pub use action::{build_action, Action};
pub use error::ExecutorError;
pub use factory::RuleFactory;
pub use form::{FormContext, InMemoryWorkItemForm, WorkItemForm};
pub use rule::RuleInstance;
pub use trigger::trigger_matches;
