//! Storage layer for OneClick
//!
//! Defines the contracts of the remote setting store, the rule group and
//! rule catalogs, and the local rule cache. Ships an in-memory backend for
//! development and testing, and a directory-backed local cache.

pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use error::StorageError;
pub use file::{FileCacheConfig, FileLocalCache};
pub use memory::{InMemoryLocalCache, InMemoryStorage};
pub use traits::{LocalCache, RuleCatalog, RuleGroupCatalog, SettingScope, SettingStore};

/// Unified trait for a backend serving settings, rule groups and rules
#[async_trait::async_trait]
pub trait Storage: SettingStore + RuleGroupCatalog + RuleCatalog + Send + Sync {}

#[async_trait::async_trait]
impl<T> Storage for T where T: SettingStore + RuleGroupCatalog + RuleCatalog + Send + Sync {}
