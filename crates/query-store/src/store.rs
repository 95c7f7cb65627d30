//! Core query store trait.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{LogPosition, NewsFilter, NewsId, NewsProjection, Result, UpsertOutcome, Version};

/// A read-optimized store of news projections keyed by id.
///
/// Only the projector writes to it. Reads see whatever the projector has
/// applied so far and never wait on the command side.
#[async_trait]
pub trait QueryStore: Send + Sync {
    /// Inserts or replaces the projection of an article.
    ///
    /// Idempotent and monotone: if the stored version is already greater
    /// than or equal to `projection.version`, nothing is written and
    /// `UpsertOutcome::Stale` is returned.
    async fn upsert(&self, projection: NewsProjection) -> Result<UpsertOutcome>;

    /// Gets the projection of an article; None means not found.
    async fn get(&self, id: NewsId) -> Result<Option<NewsProjection>>;

    /// Returns the projections matching a filter, ordered by id.
    async fn query(&self, filter: &NewsFilter) -> Result<Vec<NewsProjection>>;

    /// Returns the number of stored projections.
    async fn count(&self) -> Result<usize>;

    /// Loads the commit log position the projector has fully applied.
    async fn load_checkpoint(&self) -> Result<LogPosition>;

    /// Durably records the commit log position the projector has fully applied.
    async fn save_checkpoint(&self, position: LogPosition) -> Result<()>;

    /// Removes every projection and resets the checkpoint.
    async fn clear(&self) -> Result<()>;
}

#[async_trait]
impl<T: QueryStore + ?Sized> QueryStore for Arc<T> {
    async fn upsert(&self, projection: NewsProjection) -> Result<UpsertOutcome> {
        (**self).upsert(projection).await
    }

    async fn get(&self, id: NewsId) -> Result<Option<NewsProjection>> {
        (**self).get(id).await
    }

    async fn query(&self, filter: &NewsFilter) -> Result<Vec<NewsProjection>> {
        (**self).query(filter).await
    }

    async fn count(&self) -> Result<usize> {
        (**self).count().await
    }

    async fn load_checkpoint(&self) -> Result<LogPosition> {
        (**self).load_checkpoint().await
    }

    async fn save_checkpoint(&self, position: LogPosition) -> Result<()> {
        (**self).save_checkpoint(position).await
    }

    async fn clear(&self) -> Result<()> {
        (**self).clear().await
    }
}

/// Extension trait providing convenience methods for query stores.
#[async_trait]
pub trait QueryStoreExt: QueryStore {
    /// Returns the version currently projected for an article.
    async fn version_of(&self, id: NewsId) -> Result<Option<Version>> {
        Ok(self.get(id).await?.map(|p| p.version))
    }
}

impl<T: QueryStore + ?Sized> QueryStoreExt for T {}
