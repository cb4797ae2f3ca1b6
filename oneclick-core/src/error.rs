//! Error types for the core crate

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid trigger: {0}")]
    InvalidTrigger(String),

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Unknown form event: {0}")]
    UnknownEvent(String),
}
