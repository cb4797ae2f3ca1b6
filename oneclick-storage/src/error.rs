//! Storage error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions_keep_the_cause() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = StorageError::from(parse);
        assert!(matches!(error, StorageError::Serialization(_)));
        assert!(error.to_string().starts_with("Serialization error: "));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read only");
        let error = StorageError::from(io);
        assert!(matches!(error, StorageError::Io(_)));
        assert_eq!(error.to_string(), "IO error: read only");
    }
}
