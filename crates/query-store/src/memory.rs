use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    LogPosition, NewsFilter, NewsId, NewsProjection, Result, UpsertOutcome, store::QueryStore,
};

/// In-memory query store implementation.
///
/// Provides the same interface as the sled implementation without any
/// durability; suited to tests and single-process deployments.
#[derive(Clone, Default)]
pub struct InMemoryQueryStore {
    documents: Arc<RwLock<BTreeMap<NewsId, NewsProjection>>>,
    checkpoint: Arc<RwLock<LogPosition>>,
}

impl InMemoryQueryStore {
    /// Creates a new empty in-memory query store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueryStore for InMemoryQueryStore {
    async fn upsert(&self, projection: NewsProjection) -> Result<UpsertOutcome> {
        let mut documents = self.documents.write().await;

        let outcome = match documents.get(&projection.id) {
            Some(existing) if existing.version >= projection.version => {
                return Ok(UpsertOutcome::Stale {
                    current: existing.version,
                });
            }
            Some(existing) => UpsertOutcome::Replaced {
                previous: existing.version,
            },
            None => UpsertOutcome::Inserted,
        };

        documents.insert(projection.id, projection);
        Ok(outcome)
    }

    async fn get(&self, id: NewsId) -> Result<Option<NewsProjection>> {
        Ok(self.documents.read().await.get(&id).cloned())
    }

    async fn query(&self, filter: &NewsFilter) -> Result<Vec<NewsProjection>> {
        let documents = self.documents.read().await;
        Ok(filter.apply(documents.values().cloned()))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.documents.read().await.len())
    }

    async fn load_checkpoint(&self) -> Result<LogPosition> {
        Ok(*self.checkpoint.read().await)
    }

    async fn save_checkpoint(&self, position: LogPosition) -> Result<()> {
        *self.checkpoint.write().await = position;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.documents.write().await.clear();
        *self.checkpoint.write().await = LogPosition::start();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Version;
    use crate::projection::fixtures::projection;
    use crate::store::QueryStoreExt;

    #[tokio::test]
    async fn upsert_inserts_then_replaces() {
        let store = InMemoryQueryStore::new();

        let outcome = store.upsert(projection(1, 1, "A")).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted);

        let outcome = store.upsert(projection(1, 2, "B")).await.unwrap();
        assert_eq!(
            outcome,
            UpsertOutcome::Replaced {
                previous: Version::new(1)
            }
        );

        let stored = store.get(NewsId::new(1)).await.unwrap().unwrap();
        assert_eq!(stored.title, "B");
        assert_eq!(stored.version, Version::new(2));
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let store = InMemoryQueryStore::new();
        store.upsert(projection(1, 2, "B")).await.unwrap();
        let once = store.get(NewsId::new(1)).await.unwrap();

        let outcome = store.upsert(projection(1, 2, "B")).await.unwrap();
        assert_eq!(
            outcome,
            UpsertOutcome::Stale {
                current: Version::new(2)
            }
        );
        assert_eq!(store.get(NewsId::new(1)).await.unwrap(), once);
    }

    #[tokio::test]
    async fn upsert_never_regresses() {
        let store = InMemoryQueryStore::new();
        store.upsert(projection(1, 3, "C")).await.unwrap();

        let outcome = store.upsert(projection(1, 2, "B")).await.unwrap();
        assert!(!outcome.is_applied());
        assert_eq!(
            store.version_of(NewsId::new(1)).await.unwrap(),
            Some(Version::new(3))
        );
    }

    #[tokio::test]
    async fn concurrent_upserts_keep_the_highest_version() {
        let store = InMemoryQueryStore::new();
        let mut handles = Vec::new();
        for v in (1..=20).rev() {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .upsert(projection(7, v, &format!("v{v}")))
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stored = store.get(NewsId::new(7)).await.unwrap().unwrap();
        assert_eq!(stored.version, Version::new(20));
        assert_eq!(stored.title, "v20");
    }

    #[tokio::test]
    async fn query_applies_filter() {
        let store = InMemoryQueryStore::new();
        let mut tagged = projection(2, 1, "tagged");
        tagged.tags = vec!["vote".into()];
        store.upsert(projection(1, 1, "plain")).await.unwrap();
        store.upsert(tagged).await.unwrap();

        let results = store.query(&NewsFilter::new().tag("vote")).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "tagged");
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn checkpoint_round_trip_and_clear() {
        let store = InMemoryQueryStore::new();
        assert_eq!(store.load_checkpoint().await.unwrap(), LogPosition::start());

        store.upsert(projection(1, 1, "A")).await.unwrap();
        store.save_checkpoint(LogPosition::new(9)).await.unwrap();
        assert_eq!(store.load_checkpoint().await.unwrap(), LogPosition::new(9));

        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(store.load_checkpoint().await.unwrap(), LogPosition::start());
    }
}
