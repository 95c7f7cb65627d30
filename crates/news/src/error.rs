//! Errors returned by the news service.

use command_store::{CommandStoreError, ValidationError};
use common::{NewsId, Version};
use query_store::QueryStoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NewsError {
    /// The submitted fields break a length or presence rule.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// No visible article has this id.
    #[error("News {0} not found")]
    NotFound(NewsId),

    /// The caller's expected version is not the current one.
    #[error("Version conflict for news {id}: expected version {expected}, found {actual}")]
    Conflict {
        id: NewsId,
        expected: Version,
        actual: Version,
    },

    #[error("News {0} is already published")]
    AlreadyPublished(NewsId),

    /// The article was retired and accepts no further writes.
    #[error("News {0} is retired")]
    Retired(NewsId),

    /// The write timed out; it may or may not have been committed.
    /// Re-read the current version before retrying.
    #[error("Commit outcome unknown for news {0}")]
    CommitUnknown(NewsId),

    /// The projection did not reach the requested version in time.
    #[error("Version {version} of news {id} is not visible yet")]
    NotVisible { id: NewsId, version: Version },

    /// Transient failures outlasted the retry policy.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Command store error: {0}")]
    Store(CommandStoreError),

    #[error("Query store error: {0}")]
    Query(#[from] QueryStoreError),
}

impl From<CommandStoreError> for NewsError {
    fn from(e: CommandStoreError) -> Self {
        match e {
            CommandStoreError::Conflict {
                id,
                expected,
                actual,
            } => Self::Conflict {
                id,
                expected,
                actual,
            },
            CommandStoreError::InvalidId(id) => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}

/// Result type for news service operations.
pub type Result<T> = std::result::Result<T, NewsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflicts_surface_as_conflicts() {
        let err: NewsError = CommandStoreError::Conflict {
            id: NewsId::new(4),
            expected: Version::new(1),
            actual: Version::new(2),
        }
        .into();
        assert!(matches!(
            err,
            NewsError::Conflict { id, .. } if id == NewsId::new(4)
        ));
    }

    #[test]
    fn invalid_ids_read_as_not_found() {
        let err: NewsError = CommandStoreError::InvalidId(NewsId::new(-1)).into();
        assert!(matches!(err, NewsError::NotFound(_)));
    }
}
