use thiserror::Error;

use crate::{NewsId, Version};

/// Errors that can occur when interacting with the command store.
#[derive(Debug, Error)]
pub enum CommandStoreError {
    /// The base version supplied by the caller is not the current version.
    #[error("Version conflict for news {id}: expected version {expected}, found {actual}")]
    Conflict {
        id: NewsId,
        expected: Version,
        actual: Version,
    },

    /// The news id is not a valid identifier.
    #[error("Invalid news id: {0}")]
    InvalidId(NewsId),

    /// A stored row could not be mapped back into a record.
    #[error("Invalid stored row: {0}")]
    InvalidRow(String),

    /// The store is temporarily unreachable.
    #[error("Command store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl CommandStoreError {
    /// Returns true when the failure is expected to clear up on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Database(err) => matches!(
                err,
                sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Io(_)
                    | sqlx::Error::WorkerCrashed
            ),
            _ => false,
        }
    }
}

impl common::Transient for CommandStoreError {
    fn is_transient(&self) -> bool {
        CommandStoreError::is_transient(self)
    }
}

/// Result type for command store operations.
pub type Result<T> = std::result::Result<T, CommandStoreError>;
