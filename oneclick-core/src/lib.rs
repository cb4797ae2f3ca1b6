//! Core domain models for OneClick
//!
//! This crate contains the shared data structures used across
//! the rules pipeline: rule groups, raw rule records, the typed
//! trigger/action configuration, cache snapshots and form events.

pub mod constants;
pub mod error;
pub mod events;
pub mod models;

pub use constants::{CoreFieldRefNames, RuleFieldNames, SettingKey};
pub use error::CoreError;
pub use events::{FormEvent, FormEventArgs};
pub use models::*;
