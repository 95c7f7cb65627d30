//! Applies committed revisions to the query store.

use std::collections::{HashMap, HashSet};

use command_store::{
    CommandStore, CommandStoreError, CommandStoreExt, CommittedRevision, NewsRecord,
};
use common::{NewsId, RetryError, RetryPolicy, Version, retry};
use futures_util::future::join_all;
use query_store::{QueryStore, QueryStoreExt, UpsertOutcome};
use tokio::sync::{Mutex, RwLock};

use crate::{ProjectorError, Result, mapping::to_projection};

/// Tuning for a [`Projector`].
#[derive(Debug, Clone)]
pub struct ProjectorConfig {
    /// Maximum number of log entries read per batch.
    pub batch_size: usize,
    /// Number of lanes a batch is split into. Revisions of one id always
    /// share a lane, so lanes can run concurrently.
    pub partitions: usize,
    /// Retry policy for transient store failures.
    pub retry: RetryPolicy,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            batch_size: 256,
            partitions: 4,
            retry: RetryPolicy::default(),
        }
    }
}

/// What happened to one delivered revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The revision was written, together with `backfilled` earlier
    /// revisions that had not been projected yet.
    Applied { backfilled: usize },
    /// The query store already holds this version or a newer one.
    Duplicate,
    /// The id is halted; nothing was written.
    Halted,
}

/// Counts for one processed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub applied: usize,
    pub backfilled: usize,
    pub duplicates: usize,
    pub halted: usize,
}

impl BatchReport {
    fn record(&mut self, outcome: ApplyOutcome) {
        match outcome {
            ApplyOutcome::Applied { backfilled } => {
                self.applied += 1;
                self.backfilled += backfilled;
            }
            ApplyOutcome::Duplicate => self.duplicates += 1,
            ApplyOutcome::Halted => self.halted += 1,
        }
    }

    fn merge(&mut self, other: BatchReport) {
        self.applied += other.applied;
        self.backfilled += other.backfilled;
        self.duplicates += other.duplicates;
        self.halted += other.halted;
    }
}

/// Keeps a query store in sync with a command store.
///
/// The projector guarantees, per id:
/// - Ordering: version `v` is never written before `v - 1`. A revision that
///   arrives ahead of its predecessors is preceded by the missing ones,
///   fetched from the command store.
/// - Idempotence: re-delivered revisions are detected and skipped.
/// - Progress tracking: the checkpoint only moves after a whole batch is applied.
///
/// If the stored version of an id is ever seen below a version this projector
/// already applied, the id is halted and reported as corrupt. Halted ids are
/// skipped until [`Projector::rebuild`] runs.
///
/// Rounds ([`run_once`](Projector::run_once), [`catch_up`](Projector::catch_up),
/// [`reconcile`](Projector::reconcile) and [`rebuild`](Projector::rebuild))
/// hold a round lock, so at most one of them runs at a time.
pub struct Projector<C, Q> {
    commands: C,
    queries: Q,
    config: ProjectorConfig,
    round: Mutex<()>,
    applied: RwLock<HashMap<NewsId, Version>>,
    halted: RwLock<HashSet<NewsId>>,
}

impl<C: CommandStore, Q: QueryStore> Projector<C, Q> {
    /// Creates a projector with the default configuration.
    pub fn new(commands: C, queries: Q) -> Self {
        Self::with_config(commands, queries, ProjectorConfig::default())
    }

    pub fn with_config(commands: C, queries: Q, config: ProjectorConfig) -> Self {
        Self {
            commands,
            queries,
            config,
            round: Mutex::new(()),
            applied: RwLock::new(HashMap::new()),
            halted: RwLock::new(HashSet::new()),
        }
    }

    pub fn commands(&self) -> &C {
        &self.commands
    }

    pub fn queries(&self) -> &Q {
        &self.queries
    }

    pub fn config(&self) -> &ProjectorConfig {
        &self.config
    }

    /// Returns the ids whose projection is halted, in id order.
    pub async fn halted_ids(&self) -> Vec<NewsId> {
        let mut ids: Vec<_> = self.halted.read().await.iter().copied().collect();
        ids.sort();
        ids
    }

    /// Applies one committed revision.
    ///
    /// Does not take the round lock; callers mixing this with rounds
    /// serialize it themselves.
    #[tracing::instrument(
        skip(self, revision),
        fields(news_id = %revision.record.id, version = %revision.record.version, position = %revision.position)
    )]
    pub async fn apply(&self, revision: &CommittedRevision) -> Result<ApplyOutcome> {
        self.apply_record(&revision.record).await
    }

    /// Applies a batch of revisions in log order.
    ///
    /// The batch is split into lanes by id and the lanes run concurrently.
    /// Every lane is run to completion or to its first error; the first error
    /// is returned after all lanes finish.
    pub async fn apply_batch(&self, batch: &[CommittedRevision]) -> Result<BatchReport> {
        let partitions = self.config.partitions.max(1);
        let mut lanes: Vec<Vec<&CommittedRevision>> = (0..partitions).map(|_| Vec::new()).collect();
        for revision in batch {
            lanes[lane_of(revision.record.id, partitions)].push(revision);
        }

        let results = join_all(
            lanes
                .into_iter()
                .filter(|lane| !lane.is_empty())
                .map(|lane| self.apply_lane(lane)),
        )
        .await;

        let mut report = BatchReport::default();
        let mut first_error = None;
        for result in results {
            match result {
                Ok(lane_report) => report.merge(lane_report),
                Err(e) if first_error.is_none() => first_error = Some(e),
                Err(e) => tracing::warn!(error = %e, "additional lane failure in batch"),
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Reads the next batch after the checkpoint, applies it and advances the checkpoint.
    ///
    /// Returns the number of log entries consumed.
    #[tracing::instrument(skip(self))]
    pub async fn run_once(&self) -> Result<usize> {
        let _round = self.round.lock().await;
        self.run_batch().await
    }

    /// Runs batches until the checkpoint reaches the end of the log.
    ///
    /// Returns the number of log entries consumed.
    #[tracing::instrument(skip(self))]
    pub async fn catch_up(&self) -> Result<usize> {
        let _round = self.round.lock().await;
        self.drain().await
    }

    /// Compares every id's head version with its projection and repairs laggards.
    ///
    /// Covers log entries the checkpoint moved past without applying, which
    /// can happen when commits become visible out of position order.
    /// Returns the number of ids repaired.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile(&self) -> Result<usize> {
        let _round = self.round.lock().await;
        self.repair_laggards().await
    }

    /// Clears the query store and every halt, then replays the whole log.
    ///
    /// Waits for any round in flight, so no batch can save a checkpoint
    /// past the cleared store.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild(&self) -> Result<usize> {
        let _round = self.round.lock().await;
        self.queries.clear().await?;
        self.applied.write().await.clear();
        self.halted.write().await.clear();
        tracing::info!("query store cleared, replaying commit log");
        self.drain().await
    }

    async fn run_batch(&self) -> Result<usize> {
        let retry_policy = &self.config.retry;

        let checkpoint = retry(retry_policy, "load checkpoint", || {
            self.queries.load_checkpoint()
        })
        .await
        .map_err(|e| ProjectorError::from_retry("load checkpoint", e))?;

        let batch = retry(retry_policy, "read commit log", || {
            self.commands.read_log(checkpoint, self.config.batch_size)
        })
        .await
        .map_err(|e| ProjectorError::from_retry("read commit log", e))?;

        let Some(last) = batch.last().map(|r| r.position) else {
            return Ok(0);
        };

        let report = self.apply_batch(&batch).await?;

        retry(retry_policy, "save checkpoint", || {
            self.queries.save_checkpoint(last)
        })
        .await
        .map_err(|e| ProjectorError::from_retry("save checkpoint", e))?;

        metrics::counter!("projector_revisions_applied").increment(report.applied as u64);
        metrics::counter!("projector_revisions_duplicate").increment(report.duplicates as u64);
        metrics::gauge!("projector_checkpoint").set(last.as_i64() as f64);

        tracing::debug!(
            from = %checkpoint,
            to = %last,
            applied = report.applied,
            backfilled = report.backfilled,
            duplicates = report.duplicates,
            halted = report.halted,
            "batch projected"
        );

        Ok(batch.len())
    }

    async fn drain(&self) -> Result<usize> {
        let mut total = 0;
        loop {
            let consumed = self.run_batch().await?;
            total += consumed;
            if consumed < self.config.batch_size.max(1) {
                break;
            }
        }

        if total > 0 {
            tracing::info!(entries = total, "catch-up complete");
        }
        Ok(total)
    }

    async fn repair_laggards(&self) -> Result<usize> {
        let heads = retry(&self.config.retry, "read heads", || self.commands.heads())
            .await
            .map_err(|e| ProjectorError::from_retry("read heads", e))?;

        let mut repaired = 0;
        for (id, head) in heads {
            if self.is_halted(id).await {
                continue;
            }
            let projected = self.projected_version(id).await?;
            if projected >= head {
                continue;
            }

            let record = retry(&self.config.retry, "read head revision", || {
                self.commands.get_revision(id, head)
            })
            .await
            .map_err(|e| ProjectorError::from_retry("read head revision", e))?
            .ok_or(ProjectorError::MissingRevision { id, version: head })?;

            tracing::warn!(%id, %projected, %head, "projection behind the command store, repairing");
            if let ApplyOutcome::Applied { .. } = self.apply_record(&record).await? {
                repaired += 1;
            }
        }

        if repaired > 0 {
            metrics::counter!("projector_reconciled").increment(repaired as u64);
        }
        Ok(repaired)
    }

    async fn apply_lane(&self, lane: Vec<&CommittedRevision>) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        for revision in lane {
            report.record(self.apply(revision).await?);
        }
        Ok(report)
    }

    async fn apply_record(&self, record: &NewsRecord) -> Result<ApplyOutcome> {
        let id = record.id;
        if self.is_halted(id).await {
            metrics::counter!("projector_halted_skips").increment(1);
            return Ok(ApplyOutcome::Halted);
        }

        let projected = self.projected_version(id).await?;
        self.check_not_regressed(id, projected).await?;

        if record.version <= projected {
            tracing::debug!(%id, version = %record.version, %projected, "duplicate delivery");
            return Ok(ApplyOutcome::Duplicate);
        }

        let missing = if record.version > projected.next() {
            self.fetch_missing(id, projected.next(), record.version).await?
        } else {
            Vec::new()
        };

        for earlier in &missing {
            self.write(earlier).await?;
        }
        self.write(record).await?;

        Ok(ApplyOutcome::Applied {
            backfilled: missing.len(),
        })
    }

    /// Fetches the revisions `from..before` that must be written first.
    async fn fetch_missing(
        &self,
        id: NewsId,
        from: Version,
        before: Version,
    ) -> Result<Vec<NewsRecord>> {
        let to = Version::new(before.as_i64() - 1);
        tracing::debug!(%id, %from, %to, "revision arrived early, filling the gap");

        let missing = retry(&self.config.retry, "read missing revisions", || {
            self.commands.get_range(id, from, to)
        })
        .await
        .map_err(|e| match e {
            RetryError::Permanent(CommandStoreError::InvalidRow(_)) => {
                ProjectorError::MissingRevision { id, version: from }
            }
            other => ProjectorError::from_retry("read missing revisions", other),
        })?;

        metrics::counter!("projector_gap_fills").increment(missing.len() as u64);
        Ok(missing)
    }

    async fn write(&self, record: &NewsRecord) -> Result<()> {
        let id = record.id;
        let projection = to_projection(record);

        let outcome = retry(&self.config.retry, "upsert projection", || {
            self.queries.upsert(projection.clone())
        })
        .await
        .map_err(|e| ProjectorError::from_retry("upsert projection", e))?;

        let stored = match outcome {
            UpsertOutcome::Inserted => {
                self.check_not_regressed(id, Version::initial()).await?;
                record.version
            }
            UpsertOutcome::Replaced { previous } => {
                self.check_not_regressed(id, previous).await?;
                record.version
            }
            UpsertOutcome::Stale { current } => {
                self.check_not_regressed(id, current).await?;
                current
            }
        };

        let mut applied = self.applied.write().await;
        let mark = applied.entry(id).or_insert(stored);
        if *mark < stored {
            *mark = stored;
        }
        Ok(())
    }

    async fn projected_version(&self, id: NewsId) -> Result<Version> {
        let version = retry(&self.config.retry, "read projected version", || {
            self.queries.version_of(id)
        })
        .await
        .map_err(|e| ProjectorError::from_retry("read projected version", e))?;
        Ok(version.unwrap_or_else(Version::initial))
    }

    async fn is_halted(&self, id: NewsId) -> bool {
        self.halted.read().await.contains(&id)
    }

    /// Halts `id` if the store shows a version below one this projector wrote.
    async fn check_not_regressed(&self, id: NewsId, observed: Version) -> Result<()> {
        let Some(expected) = self.applied.read().await.get(&id).copied() else {
            return Ok(());
        };
        if observed >= expected {
            return Ok(());
        }

        self.halted.write().await.insert(id);
        metrics::counter!("projector_corrupt_projections").increment(1);
        tracing::error!(
            %id,
            %expected,
            found = %observed,
            "projection regressed below an applied version, halting id"
        );
        Err(ProjectorError::CorruptProjection {
            id,
            expected,
            found: observed,
        })
    }
}

fn lane_of(id: NewsId, partitions: usize) -> usize {
    id.as_i64().rem_euclid(partitions as i64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use command_store::{InMemoryCommandStore, NewsFields, NewsType, RevisionDraft, RevisionKind};
    use common::LogPosition;
    use query_store::{InMemoryQueryStore, NewsFilter, NewsProjection, QueryStoreError};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    fn config() -> ProjectorConfig {
        ProjectorConfig {
            batch_size: 2,
            partitions: 3,
            retry: RetryPolicy::immediate(3),
        }
    }

    async fn create(store: &InMemoryCommandStore, title: &str) -> NewsId {
        let id = store.allocate_id().await.unwrap();
        let draft = RevisionDraft::created(
            NewsType::default(),
            NewsFields::new(title, "content", "author"),
            Utc::now(),
        );
        store.append(id, Version::initial(), draft).await.unwrap();
        id
    }

    async fn retitle(store: &InMemoryCommandStore, id: NewsId, title: &str) -> Version {
        let latest = store.latest(id).await.unwrap().unwrap();
        let mut draft = RevisionDraft::following(&latest, RevisionKind::Updated);
        draft.fields.title = title.to_string();
        store.append(id, latest.version, draft).await.unwrap()
    }

    async fn log(store: &InMemoryCommandStore) -> Vec<CommittedRevision> {
        store.read_log(LogPosition::start(), 100).await.unwrap()
    }

    /// Query store that fails the first `failures` upserts.
    #[derive(Clone)]
    struct FlakyQueryStore {
        inner: InMemoryQueryStore,
        failures: Arc<AtomicU32>,
    }

    impl FlakyQueryStore {
        fn new(failures: u32) -> Self {
            Self {
                inner: InMemoryQueryStore::new(),
                failures: Arc::new(AtomicU32::new(failures)),
            }
        }
    }

    #[async_trait]
    impl QueryStore for FlakyQueryStore {
        async fn upsert(&self, projection: NewsProjection) -> query_store::Result<UpsertOutcome> {
            let failing = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(QueryStoreError::Unavailable("injected".into()));
            }
            self.inner.upsert(projection).await
        }

        async fn get(&self, id: NewsId) -> query_store::Result<Option<NewsProjection>> {
            self.inner.get(id).await
        }

        async fn query(&self, filter: &NewsFilter) -> query_store::Result<Vec<NewsProjection>> {
            self.inner.query(filter).await
        }

        async fn count(&self) -> query_store::Result<usize> {
            self.inner.count().await
        }

        async fn load_checkpoint(&self) -> query_store::Result<LogPosition> {
            self.inner.load_checkpoint().await
        }

        async fn save_checkpoint(&self, position: LogPosition) -> query_store::Result<()> {
            self.inner.save_checkpoint(position).await
        }

        async fn clear(&self) -> query_store::Result<()> {
            self.inner.clear().await
        }
    }

    /// Query store that can hold the next checkpoint load until released.
    #[derive(Clone)]
    struct GatedQueryStore {
        inner: InMemoryQueryStore,
        armed: Arc<AtomicBool>,
        paused: Arc<Notify>,
        resume: Arc<Notify>,
    }

    impl GatedQueryStore {
        fn new() -> Self {
            Self {
                inner: InMemoryQueryStore::new(),
                armed: Arc::new(AtomicBool::new(false)),
                paused: Arc::new(Notify::new()),
                resume: Arc::new(Notify::new()),
            }
        }

        fn hold_next_checkpoint_load(&self) {
            self.armed.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl QueryStore for GatedQueryStore {
        async fn upsert(&self, projection: NewsProjection) -> query_store::Result<UpsertOutcome> {
            self.inner.upsert(projection).await
        }

        async fn get(&self, id: NewsId) -> query_store::Result<Option<NewsProjection>> {
            self.inner.get(id).await
        }

        async fn query(&self, filter: &NewsFilter) -> query_store::Result<Vec<NewsProjection>> {
            self.inner.query(filter).await
        }

        async fn count(&self) -> query_store::Result<usize> {
            self.inner.count().await
        }

        async fn load_checkpoint(&self) -> query_store::Result<LogPosition> {
            if self.armed.swap(false, Ordering::SeqCst) {
                self.paused.notify_one();
                self.resume.notified().await;
            }
            self.inner.load_checkpoint().await
        }

        async fn save_checkpoint(&self, position: LogPosition) -> query_store::Result<()> {
            self.inner.save_checkpoint(position).await
        }

        async fn clear(&self) -> query_store::Result<()> {
            self.inner.clear().await
        }
    }

    #[tokio::test]
    async fn catch_up_projects_every_revision_and_saves_checkpoint() {
        let commands = InMemoryCommandStore::new();
        let a = create(&commands, "A").await;
        retitle(&commands, a, "A2").await;
        let b = create(&commands, "B").await;

        let queries = InMemoryQueryStore::new();
        let projector = Projector::with_config(commands, queries.clone(), config());

        assert_eq!(projector.catch_up().await.unwrap(), 3);

        let doc_a = queries.get(a).await.unwrap().unwrap();
        assert_eq!(doc_a.title, "A2");
        assert_eq!(doc_a.version, Version::new(2));
        assert_eq!(queries.get(b).await.unwrap().unwrap().title, "B");
        assert_eq!(queries.load_checkpoint().await.unwrap(), LogPosition::new(3));

        assert_eq!(projector.catch_up().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn early_revision_pulls_in_its_predecessors() {
        let commands = InMemoryCommandStore::new();
        let id = create(&commands, "A").await;
        retitle(&commands, id, "B").await;
        retitle(&commands, id, "C").await;
        let entries = log(&commands).await;

        let queries = InMemoryQueryStore::new();
        let projector = Projector::with_config(commands, queries.clone(), config());

        // v1 lands, then v3 arrives before v2.
        assert_eq!(
            projector.apply(&entries[0]).await.unwrap(),
            ApplyOutcome::Applied { backfilled: 0 }
        );
        assert_eq!(
            projector.apply(&entries[2]).await.unwrap(),
            ApplyOutcome::Applied { backfilled: 1 }
        );
        assert_eq!(
            projector.apply(&entries[1]).await.unwrap(),
            ApplyOutcome::Duplicate
        );

        let doc = queries.get(id).await.unwrap().unwrap();
        assert_eq!(doc.version, Version::new(3));
        assert_eq!(doc.title, "C");
    }

    #[tokio::test]
    async fn redelivery_is_a_no_op() {
        let commands = InMemoryCommandStore::new();
        let id = create(&commands, "A").await;
        let entries = log(&commands).await;

        let queries = InMemoryQueryStore::new();
        let projector = Projector::new(commands, queries.clone());

        projector.apply(&entries[0]).await.unwrap();
        let before = queries.get(id).await.unwrap();
        assert_eq!(
            projector.apply(&entries[0]).await.unwrap(),
            ApplyOutcome::Duplicate
        );
        assert_eq!(queries.get(id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn transient_upsert_failures_are_retried() {
        let commands = InMemoryCommandStore::new();
        let id = create(&commands, "A").await;

        let queries = FlakyQueryStore::new(2);
        let projector = Projector::with_config(commands, queries.clone(), config());

        assert_eq!(projector.catch_up().await.unwrap(), 1);
        assert_eq!(queries.get(id).await.unwrap().unwrap().title, "A");
    }

    #[tokio::test]
    async fn exhausted_retries_leave_the_checkpoint_alone() {
        let commands = InMemoryCommandStore::new();
        let id = create(&commands, "A").await;

        let queries = FlakyQueryStore::new(10);
        let projector = Projector::with_config(commands, queries.clone(), config());

        let err = projector.catch_up().await.unwrap_err();
        assert!(matches!(
            err,
            ProjectorError::RetryExhausted { attempts: 3, .. }
        ));
        assert_eq!(queries.load_checkpoint().await.unwrap(), LogPosition::start());
        assert!(queries.get(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn regression_halts_the_id_but_not_others() {
        let commands = InMemoryCommandStore::new();
        let id = create(&commands, "A").await;
        retitle(&commands, id, "B").await;

        let queries = InMemoryQueryStore::new();
        let projector = Projector::with_config(commands.clone(), queries.clone(), config());
        projector.catch_up().await.unwrap();

        // Something outside the projector wipes the document.
        queries.clear().await.unwrap();
        queries
            .save_checkpoint(LogPosition::new(2))
            .await
            .unwrap();

        retitle(&commands, id, "C").await;
        let err = projector.catch_up().await.unwrap_err();
        assert!(matches!(
            err,
            ProjectorError::CorruptProjection { found, .. } if found == Version::initial()
        ));
        assert_eq!(projector.halted_ids().await, vec![id]);

        // Later batches skip the halted id and keep going.
        let other = create(&commands, "Other").await;
        projector.catch_up().await.unwrap();
        assert!(queries.get(id).await.unwrap().is_none());
        assert_eq!(queries.get(other).await.unwrap().unwrap().title, "Other");

        // A rebuild clears the halt and restores the id.
        projector.rebuild().await.unwrap();
        assert!(projector.halted_ids().await.is_empty());
        assert_eq!(queries.get(id).await.unwrap().unwrap().title, "C");
    }

    #[tokio::test]
    async fn rebuild_waits_for_the_round_in_flight() {
        let commands = InMemoryCommandStore::new();
        let a = create(&commands, "A").await;
        retitle(&commands, a, "A2").await;

        let queries = GatedQueryStore::new();
        let projector = Arc::new(Projector::with_config(
            commands.clone(),
            queries.clone(),
            config(),
        ));
        projector.catch_up().await.unwrap();
        let b = create(&commands, "B").await;

        // A round stops right after reading checkpoint 2.
        queries.hold_next_checkpoint_load();
        let round = tokio::spawn({
            let projector = Arc::clone(&projector);
            async move { projector.run_once().await }
        });
        queries.paused.notified().await;

        let rebuild = tokio::spawn({
            let projector = Arc::clone(&projector);
            async move { projector.rebuild().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            queries.get(a).await.unwrap().map(|doc| doc.version),
            Some(Version::new(2)),
            "rebuild cleared the store under a running round"
        );

        queries.resume.notify_one();
        assert_eq!(round.await.unwrap().unwrap(), 1);
        assert_eq!(rebuild.await.unwrap().unwrap(), 3);

        let doc_a = queries.get(a).await.unwrap().unwrap();
        assert_eq!(doc_a.version, Version::new(2));
        assert_eq!(doc_a.title, "A2");
        assert_eq!(
            queries.get(b).await.unwrap().map(|doc| doc.version),
            Some(Version::new(1))
        );
        assert!(projector.halted_ids().await.is_empty());
        assert_eq!(queries.load_checkpoint().await.unwrap(), LogPosition::new(3));
    }

    #[tokio::test]
    async fn reconcile_repairs_skipped_entries() {
        let commands = InMemoryCommandStore::new();
        let id = create(&commands, "A").await;
        retitle(&commands, id, "B").await;

        let queries = InMemoryQueryStore::new();
        // The checkpoint moved past both entries without applying them.
        queries.save_checkpoint(LogPosition::new(2)).await.unwrap();
        let projector = Projector::with_config(commands, queries.clone(), config());

        assert_eq!(projector.catch_up().await.unwrap(), 0);
        assert!(queries.get(id).await.unwrap().is_none());

        assert_eq!(projector.reconcile().await.unwrap(), 1);
        let doc = queries.get(id).await.unwrap().unwrap();
        assert_eq!(doc.version, Version::new(2));
        assert_eq!(doc.title, "B");

        assert_eq!(projector.reconcile().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn batch_lanes_cover_every_id() {
        let commands = InMemoryCommandStore::new();
        let mut ids = Vec::new();
        for n in 0..7 {
            let id = create(&commands, &format!("n{n}")).await;
            retitle(&commands, id, &format!("n{n}-v2")).await;
            ids.push(id);
        }
        let entries = log(&commands).await;

        let queries = InMemoryQueryStore::new();
        let projector = Projector::with_config(commands, queries.clone(), config());
        let report = projector.apply_batch(&entries).await.unwrap();

        assert_eq!(report.applied, 14);
        assert_eq!(report.duplicates, 0);
        for id in ids {
            assert_eq!(
                queries.version_of(id).await.unwrap(),
                Some(Version::new(2))
            );
        }
    }

    #[test]
    fn lanes_are_stable_per_id() {
        assert_eq!(lane_of(NewsId::new(7), 4), 3);
        assert_eq!(lane_of(NewsId::new(7), 4), lane_of(NewsId::new(11), 4));
        assert_eq!(lane_of(NewsId::new(5), 1), 0);
    }
}
