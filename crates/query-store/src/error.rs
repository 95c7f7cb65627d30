//! Query store error types.

use thiserror::Error;

/// Errors that can occur when reading or writing projections.
#[derive(Debug, Error)]
pub enum QueryStoreError {
    /// An error occurred in the embedded document database.
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    /// A document could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value has an unexpected shape.
    #[error("Invalid stored value: {0}")]
    InvalidDocument(String),

    /// The store is temporarily unreachable.
    #[error("Query store unavailable: {0}")]
    Unavailable(String),
}

impl QueryStoreError {
    /// Returns true when the failure is expected to clear up on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::Database(sled::Error::Io(_))
        )
    }
}

impl common::Transient for QueryStoreError {
    fn is_transient(&self) -> bool {
        QueryStoreError::is_transient(self)
    }
}

/// Result type for query store operations.
pub type Result<T> = std::result::Result<T, QueryStoreError>;
