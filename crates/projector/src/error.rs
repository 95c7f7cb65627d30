//! Projector error types.

use command_store::CommandStoreError;
use common::{NewsId, RetryError, Version};
use query_store::QueryStoreError;
use thiserror::Error;

/// Errors that can occur while projecting revisions.
#[derive(Debug, Error)]
pub enum ProjectorError {
    /// An error occurred in the command store.
    #[error("Command store error: {0}")]
    CommandStore(#[from] CommandStoreError),

    /// An error occurred in the query store.
    #[error("Query store error: {0}")]
    QueryStore(#[from] QueryStoreError),

    /// The stored projection went backwards. The id is halted until rebuilt.
    #[error(
        "Corrupt projection for news {id}: version {expected} was already applied, store holds {found}"
    )]
    CorruptProjection {
        id: NewsId,
        expected: Version,
        found: Version,
    },

    /// A revision needed to fill a gap is not in the command store.
    #[error("Revision {version} of news {id} is missing from the command store")]
    MissingRevision { id: NewsId, version: Version },

    /// A transient failure outlasted the retry policy.
    #[error("{operation} failed after {attempts} attempts: {message}")]
    RetryExhausted {
        operation: &'static str,
        attempts: u32,
        message: String,
    },
}

impl ProjectorError {
    pub(crate) fn from_retry<E>(operation: &'static str, err: RetryError<E>) -> Self
    where
        E: Into<ProjectorError> + std::fmt::Display,
    {
        match err {
            RetryError::Permanent(e) => e.into(),
            RetryError::Exhausted { attempts, last } => Self::RetryExhausted {
                operation,
                attempts,
                message: last.to_string(),
            },
        }
    }
}

/// Result type for projector operations.
pub type Result<T> = std::result::Result<T, ProjectorError>;
