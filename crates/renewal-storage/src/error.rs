//! Storage layer error types.

use renewal_engine::StoreError;
use thiserror::Error;

/// Errors that can occur in the storage layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// RocksDB operation failed
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    /// Column family not found
    #[error("Column family not found: {0}")]
    ColumnFamilyNotFound(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Dataset file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Write refused because it would break a storage invariant
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::RocksDb(e) => StoreError::Unavailable(e.to_string()),
            StorageError::Io(e) => StoreError::Unavailable(e.to_string()),
            StorageError::NotFound(what) => StoreError::NotFound(what),
            other => StoreError::Rejected(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_to_store_error() {
        let err: StoreError = StorageError::Rejected("over capacity".to_string()).into();
        assert!(!err.is_transient());

        let err: StoreError = StorageError::NotFound("session s1".to_string()).into();
        assert!(matches!(err, StoreError::NotFound(_)));

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err: StoreError = StorageError::Io(io).into();
        assert!(err.is_transient());
    }
}
