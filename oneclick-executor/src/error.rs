//! Executor error types

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ExecutorError {
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Field is read only: {0}")]
    ReadOnlyField(String),

    #[error("Form error: {0}")]
    Form(String),

    #[error("Invalid action: {0}")]
    InvalidAction(String),
}
