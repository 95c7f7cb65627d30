use std::path::Path;

use async_trait::async_trait;
use sled::IVec;

use crate::{
    LogPosition, NewsFilter, NewsId, NewsProjection, QueryStoreError, Result, UpsertOutcome,
    store::QueryStore,
};

const DOCUMENTS_TREE: &str = "news";
const META_TREE: &str = "meta";
const CHECKPOINT_KEY: &[u8] = b"checkpoint";

/// Query store backed by an embedded sled database.
///
/// Each projection is one JSON document keyed by the big-endian id, so
/// iteration order is id order. Upserts use compare-and-swap, which keeps
/// them monotone even with several writers on the same id.
#[derive(Clone)]
pub struct SledQueryStore {
    db: sled::Db,
    documents: sled::Tree,
    meta: sled::Tree,
}

impl SledQueryStore {
    /// Opens (or creates) a store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::Config::default().path(path.as_ref()).open()?;
        tracing::info!(
            path = %path.as_ref().display(),
            recovered = db.was_recovered(),
            "query store opened"
        );
        Self::from_db(db)
    }

    /// Opens a store that is deleted when dropped.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::default().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        let documents = db.open_tree(DOCUMENTS_TREE)?;
        let meta = db.open_tree(META_TREE)?;
        Ok(Self {
            db,
            documents,
            meta,
        })
    }

    /// Flushes all pending writes to disk.
    pub async fn flush(&self) -> Result<()> {
        self.db.flush_async().await?;
        Ok(())
    }

    fn key(id: NewsId) -> [u8; 8] {
        id.as_i64().to_be_bytes()
    }

    fn decode(bytes: &IVec) -> Result<NewsProjection> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[async_trait]
impl QueryStore for SledQueryStore {
    async fn upsert(&self, projection: NewsProjection) -> Result<UpsertOutcome> {
        let key = Self::key(projection.id);
        let encoded = serde_json::to_vec(&projection)?;

        loop {
            let current = self.documents.get(key)?;
            let outcome = match &current {
                Some(bytes) => {
                    let existing = Self::decode(bytes)?;
                    if existing.version >= projection.version {
                        return Ok(UpsertOutcome::Stale {
                            current: existing.version,
                        });
                    }
                    UpsertOutcome::Replaced {
                        previous: existing.version,
                    }
                }
                None => UpsertOutcome::Inserted,
            };

            match self
                .documents
                .compare_and_swap(key, current.as_ref(), Some(encoded.clone()))?
            {
                Ok(()) => return Ok(outcome),
                Err(_) => {
                    // Another writer got in between; re-read and decide again.
                    metrics::counter!("query_store_cas_retries").increment(1);
                }
            }
        }
    }

    async fn get(&self, id: NewsId) -> Result<Option<NewsProjection>> {
        self.documents
            .get(Self::key(id))?
            .as_ref()
            .map(Self::decode)
            .transpose()
    }

    async fn query(&self, filter: &NewsFilter) -> Result<Vec<NewsProjection>> {
        let mut projections = Vec::new();
        for entry in self.documents.iter() {
            let (_, value) = entry?;
            projections.push(Self::decode(&value)?);
        }
        Ok(filter.apply(projections))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.documents.len())
    }

    async fn load_checkpoint(&self) -> Result<LogPosition> {
        match self.meta.get(CHECKPOINT_KEY)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_ref().try_into().map_err(|_| {
                    QueryStoreError::InvalidDocument(format!(
                        "checkpoint has {} bytes, expected 8",
                        bytes.len()
                    ))
                })?;
                Ok(LogPosition::new(i64::from_be_bytes(raw)))
            }
            None => Ok(LogPosition::start()),
        }
    }

    async fn save_checkpoint(&self, position: LogPosition) -> Result<()> {
        self.meta
            .insert(CHECKPOINT_KEY, position.as_i64().to_be_bytes().to_vec())?;
        // Documents were written before the checkpoint, so one flush makes both durable.
        self.db.flush_async().await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.documents.clear()?;
        self.meta.clear()?;
        self.db.flush_async().await?;
        Ok(())
    }
}
