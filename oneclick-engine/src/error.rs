//! Engine error types

use oneclick_executor::ExecutorError;
use oneclick_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by rule sourcing and dispatch
///
/// `Clone` so one in-flight load can hand the same outcome to every caller.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("Failed to load rules: {0}")]
    SourceLoad(String),

    #[error("Rule sourcing engine is not initialized")]
    NotInitialized,

    #[error("Cannot move rule from {old_index} to {new_index} in a list of {len}")]
    InvalidReorder {
        old_index: usize,
        new_index: usize,
        len: usize,
    },

    #[error("Rule not found: {0}")]
    RuleNotFound(String),

    #[error("Form error: {0}")]
    Form(String),
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        EngineError::SourceLoad(err.to_string())
    }
}

impl From<ExecutorError> for EngineError {
    fn from(err: ExecutorError) -> Self {
        EngineError::Form(err.to_string())
    }
}
