//! Compiler error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompilerError {
    #[error("Malformed field '{field}': {message}")]
    MalformedField { field: String, message: String },

    #[error("Invalid trigger: {0}")]
    InvalidTrigger(String),

    #[error("Invalid action '{action_name}': {message}")]
    InvalidAction { action_name: String, message: String },
}
