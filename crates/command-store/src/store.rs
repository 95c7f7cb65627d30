use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::{
    CommandStoreError, CommittedRevision, LogPosition, NewsId, NewsRecord, Result, RevisionDraft,
    Version,
};

/// Core trait for command store implementations.
///
/// A command store is the authoritative, append-only history of every news
/// article. All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait CommandStore: Send + Sync {
    /// Allocates a fresh article id.
    async fn allocate_id(&self) -> Result<NewsId>;

    /// Appends the next revision of an article.
    ///
    /// `base_version` must equal the current highest version of `id`
    /// (`Version::initial()` for a new article), otherwise the call fails
    /// with `Conflict`. Appends are serialized per id: two concurrent
    /// appends with the same base never both succeed.
    ///
    /// Returns the committed version, which is always `base_version + 1`.
    async fn append(
        &self,
        id: NewsId,
        base_version: Version,
        draft: RevisionDraft,
    ) -> Result<Version>;

    /// Gets the current highest version of an article.
    ///
    /// Returns None if the article has no revisions.
    async fn current_version(&self, id: NewsId) -> Result<Option<Version>>;

    /// Retrieves one revision of an article.
    async fn get_revision(&self, id: NewsId, version: Version) -> Result<Option<NewsRecord>>;

    /// Retrieves all revisions of an article in version order.
    async fn get_history(&self, id: NewsId) -> Result<Vec<NewsRecord>>;

    /// Retrieves the revisions of an article starting at `from_version`, in version order.
    async fn get_revisions_from(
        &self,
        id: NewsId,
        from_version: Version,
    ) -> Result<Vec<NewsRecord>>;

    /// Reads up to `limit` commit log entries after `after`, in commit order.
    ///
    /// For a single id, log order equals version order.
    async fn read_log(&self, after: LogPosition, limit: usize) -> Result<Vec<CommittedRevision>>;

    /// Returns the current highest version of every article.
    async fn heads(&self) -> Result<Vec<(NewsId, Version)>>;

    /// Subscribes to commit notifications carrying the latest log position.
    fn subscribe(&self) -> watch::Receiver<LogPosition>;
}

#[async_trait]
impl<T: CommandStore + ?Sized> CommandStore for Arc<T> {
    async fn allocate_id(&self) -> Result<NewsId> {
        (**self).allocate_id().await
    }

    async fn append(
        &self,
        id: NewsId,
        base_version: Version,
        draft: RevisionDraft,
    ) -> Result<Version> {
        (**self).append(id, base_version, draft).await
    }

    async fn current_version(&self, id: NewsId) -> Result<Option<Version>> {
        (**self).current_version(id).await
    }

    async fn get_revision(&self, id: NewsId, version: Version) -> Result<Option<NewsRecord>> {
        (**self).get_revision(id, version).await
    }

    async fn get_history(&self, id: NewsId) -> Result<Vec<NewsRecord>> {
        (**self).get_history(id).await
    }

    async fn get_revisions_from(
        &self,
        id: NewsId,
        from_version: Version,
    ) -> Result<Vec<NewsRecord>> {
        (**self).get_revisions_from(id, from_version).await
    }

    async fn read_log(&self, after: LogPosition, limit: usize) -> Result<Vec<CommittedRevision>> {
        (**self).read_log(after, limit).await
    }

    async fn heads(&self) -> Result<Vec<(NewsId, Version)>> {
        (**self).heads().await
    }

    fn subscribe(&self) -> watch::Receiver<LogPosition> {
        (**self).subscribe()
    }
}

/// Extension trait providing convenience methods for command stores.
#[async_trait]
pub trait CommandStoreExt: CommandStore {
    /// Checks if an article exists (has any revisions).
    async fn exists(&self, id: NewsId) -> Result<bool> {
        Ok(self.current_version(id).await?.is_some())
    }

    /// Loads the latest revision of an article.
    async fn latest(&self, id: NewsId) -> Result<Option<NewsRecord>> {
        match self.current_version(id).await? {
            Some(version) => self.get_revision(id, version).await,
            None => Ok(None),
        }
    }

    /// Retrieves the revisions `from..=to` of an article, failing if any is missing.
    async fn get_range(&self, id: NewsId, from: Version, to: Version) -> Result<Vec<NewsRecord>> {
        let records: Vec<_> = self
            .get_revisions_from(id, from)
            .await?
            .into_iter()
            .take_while(|r| r.version <= to)
            .collect();

        let expected = (to.as_i64() - from.as_i64() + 1).max(0) as usize;
        if records.len() != expected {
            return Err(CommandStoreError::InvalidRow(format!(
                "news {id}: expected {expected} revisions in {from}..={to}, found {}",
                records.len()
            )));
        }
        Ok(records)
    }
}

// Blanket implementation for all CommandStore implementations
impl<T: CommandStore + ?Sized> CommandStoreExt for T {}

/// Rejects ids that can never name an article.
pub fn validate_id(id: NewsId) -> Result<()> {
    if id.is_valid() {
        Ok(())
    } else {
        Err(CommandStoreError::InvalidId(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_id_rejects_non_positive_ids() {
        assert!(validate_id(NewsId::new(1)).is_ok());
        assert!(matches!(
            validate_id(NewsId::new(0)),
            Err(CommandStoreError::InvalidId(_))
        ));
    }
}
