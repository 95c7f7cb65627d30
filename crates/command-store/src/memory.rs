use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock, watch};

use crate::{
    CommandStoreError, CommittedRevision, LogPosition, NewsId, NewsRecord, Result, RevisionDraft,
    Version,
    feed::CommitFeed,
    store::{CommandStore, validate_id},
};

type History = Arc<Mutex<Vec<NewsRecord>>>;

/// In-memory command store implementation.
///
/// Each article's history sits behind its own mutex, so appends are
/// serialized per id while different ids proceed in parallel. Provides the
/// same interface as the PostgreSQL implementation.
#[derive(Clone)]
pub struct InMemoryCommandStore {
    histories: Arc<RwLock<HashMap<NewsId, History>>>,
    log: Arc<RwLock<Vec<CommittedRevision>>>,
    next_id: Arc<AtomicI64>,
    feed: CommitFeed,
}

impl InMemoryCommandStore {
    /// Creates a new empty in-memory command store.
    pub fn new() -> Self {
        Self {
            histories: Arc::new(RwLock::new(HashMap::new())),
            log: Arc::new(RwLock::new(Vec::new())),
            next_id: Arc::new(AtomicI64::new(1)),
            feed: CommitFeed::new(),
        }
    }

    /// Returns the total number of revisions stored.
    pub async fn revision_count(&self) -> usize {
        self.log.read().await.len()
    }

    async fn history(&self, id: NewsId) -> Option<History> {
        self.histories.read().await.get(&id).cloned()
    }

    /// Returns the history an append at `base_version` should lock.
    ///
    /// A new entry is only created for a first revision, so conflicting
    /// appends to unknown ids leave the map untouched.
    async fn history_for_append(&self, id: NewsId, base_version: Version) -> Result<History> {
        if let Some(history) = self.history(id).await {
            return Ok(history);
        }
        if base_version != Version::initial() {
            metrics::counter!("command_store_conflicts").increment(1);
            return Err(CommandStoreError::Conflict {
                id,
                expected: base_version,
                actual: Version::initial(),
            });
        }
        Ok(self.histories.write().await.entry(id).or_default().clone())
    }
}

impl Default for InMemoryCommandStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandStore for InMemoryCommandStore {
    async fn allocate_id(&self) -> Result<NewsId> {
        Ok(NewsId::new(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn append(
        &self,
        id: NewsId,
        base_version: Version,
        draft: RevisionDraft,
    ) -> Result<Version> {
        validate_id(id)?;

        let history = self.history_for_append(id, base_version).await?;
        let mut history = history.lock().await;

        let current_version = history
            .last()
            .map(|r| r.version)
            .unwrap_or(Version::initial());

        if current_version != base_version {
            metrics::counter!("command_store_conflicts").increment(1);
            return Err(CommandStoreError::Conflict {
                id,
                expected: base_version,
                actual: current_version,
            });
        }

        let version = current_version.next();
        let record = NewsRecord::from_draft(id, version, draft, Utc::now());

        // The log entry is pushed while the id's lock is held, so log order
        // matches version order for this id.
        let position = {
            let mut log = self.log.write().await;
            let position = LogPosition::new(log.len() as i64 + 1);
            log.push(CommittedRevision {
                position,
                record: record.clone(),
            });
            position
        };
        history.push(record);
        drop(history);

        self.feed.publish(position);
        metrics::counter!("command_store_appends").increment(1);
        tracing::debug!(news_id = %id, %version, %position, "revision committed");

        Ok(version)
    }

    async fn current_version(&self, id: NewsId) -> Result<Option<Version>> {
        let Some(history) = self.history(id).await else {
            return Ok(None);
        };
        let history = history.lock().await;
        Ok(history.last().map(|r| r.version))
    }

    async fn get_revision(&self, id: NewsId, version: Version) -> Result<Option<NewsRecord>> {
        let Some(history) = self.history(id).await else {
            return Ok(None);
        };
        let history = history.lock().await;
        Ok(history.iter().find(|r| r.version == version).cloned())
    }

    async fn get_history(&self, id: NewsId) -> Result<Vec<NewsRecord>> {
        self.get_revisions_from(id, Version::first()).await
    }

    async fn get_revisions_from(
        &self,
        id: NewsId,
        from_version: Version,
    ) -> Result<Vec<NewsRecord>> {
        let Some(history) = self.history(id).await else {
            return Ok(Vec::new());
        };
        let history = history.lock().await;
        Ok(history
            .iter()
            .filter(|r| r.version >= from_version)
            .cloned()
            .collect())
    }

    async fn read_log(&self, after: LogPosition, limit: usize) -> Result<Vec<CommittedRevision>> {
        let log = self.log.read().await;
        let start = after.as_i64().max(0) as usize;
        Ok(log.iter().skip(start).take(limit).cloned().collect())
    }

    async fn heads(&self) -> Result<Vec<(NewsId, Version)>> {
        let histories: Vec<(NewsId, History)> = self
            .histories
            .read()
            .await
            .iter()
            .map(|(id, h)| (*id, h.clone()))
            .collect();

        let mut heads = Vec::with_capacity(histories.len());
        for (id, history) in histories {
            if let Some(last) = history.lock().await.last() {
                heads.push((id, last.version));
            }
        }
        heads.sort_by_key(|(id, _)| *id);
        Ok(heads)
    }

    fn subscribe(&self) -> watch::Receiver<LogPosition> {
        self.feed.subscribe()
    }
}
