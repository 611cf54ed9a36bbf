//! Storage error types.

use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Failed to create client: {0}")]
    Client(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Classify an `object_store` error, keeping `context` in the message.
    pub fn from_object_store(err: object_store::Error, context: &str) -> Self {
        if let object_store::Error::NotFound { path, .. } = &err {
            return StorageError::NotFound(path.clone());
        }

        let message = format!("{}: {}", context, err);
        let lowered = message.to_lowercase();
        if lowered.contains("timed out") || lowered.contains("timeout") {
            StorageError::Timeout(message)
        } else if lowered.contains("connect") || lowered.contains("dns") {
            StorageError::Connection(message)
        } else {
            StorageError::Backend(message)
        }
    }

    /// Transient errors skip the current unit of work; the next poll retries.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::NotFound(_) | StorageError::Timeout(_) | StorageError::Connection(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_transient() {
        let err = object_store::Error::NotFound {
            path: "ABI-L2-CMIPC/2018/319/23".to_string(),
            source: "missing".into(),
        };
        let classified = StorageError::from_object_store(err, "list");
        assert!(matches!(classified, StorageError::NotFound(_)));
        assert!(classified.is_transient());
    }

    #[test]
    fn test_generic_timeout_is_classified() {
        let err = object_store::Error::Generic {
            store: "S3",
            source: "operation timed out".into(),
        };
        let classified = StorageError::from_object_store(err, "list");
        assert!(matches!(classified, StorageError::Timeout(_)));
    }
}
