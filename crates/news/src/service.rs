//! News service providing the public API for news operations.

use std::time::Duration;

use chrono::Utc;
use command_store::{
    CommandStore, NewsFields, NewsRecord, RevisionDraft, RevisionKind,
};
use common::{NewsId, RetryError, Version, retry};
use query_store::{NewsFilter, NewsProjection, QueryStore};

use crate::{NewsError, NewsPatch, Result, ServiceConfig};

/// Identity of a newly created article.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Created {
    pub id: NewsId,
    pub version: Version,
}

/// Service for writing and reading news articles of one news type.
///
/// Every write is a new revision in the command store, checked against the
/// version the caller last saw. Reads come from the query store and may
/// trail the latest write until the projector catches up; use
/// [`NewsService::read_at_least`] to wait for a known version.
pub struct NewsService<C, Q> {
    commands: C,
    queries: Q,
    config: ServiceConfig,
}

impl<C: CommandStore, Q: QueryStore> NewsService<C, Q> {
    /// Creates a service with the default configuration.
    pub fn new(commands: C, queries: Q) -> Self {
        Self::with_config(commands, queries, ServiceConfig::default())
    }

    pub fn with_config(commands: C, queries: Q, config: ServiceConfig) -> Self {
        Self {
            commands,
            queries,
            config,
        }
    }

    pub fn commands(&self) -> &C {
        &self.commands
    }

    pub fn queries(&self) -> &Q {
        &self.queries
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Creates a new article at version 1.
    #[tracing::instrument(skip(self, fields), fields(title = %fields.title))]
    pub async fn create(&self, fields: NewsFields) -> Result<Created> {
        fields.validate()?;

        let id = retry(&self.config.write_retry, "allocate id", || {
            self.commands.allocate_id()
        })
        .await
        .map_err(unavailable_or_store)?;

        let draft = RevisionDraft::created(self.config.news_type.clone(), fields, Utc::now());
        let version = self.commit(id, Version::initial(), draft).await?;

        metrics::counter!("news_created").increment(1);
        tracing::info!(%id, "news created");
        Ok(Created { id, version })
    }

    /// Applies `patch` on top of revision `expected_version` and commits the result.
    #[tracing::instrument(skip(self, patch))]
    pub async fn update(
        &self,
        id: NewsId,
        expected_version: Version,
        patch: NewsPatch,
    ) -> Result<Version> {
        let base = self.writable_revision(id, expected_version).await?;

        let fields = patch.apply_to(base.fields());
        fields.validate()?;

        let mut draft = RevisionDraft::following(&base, RevisionKind::Updated);
        draft.fields = fields;
        let version = self.commit(id, expected_version, draft).await?;

        metrics::counter!("news_updated").increment(1);
        Ok(version)
    }

    /// Publishes the article as of revision `expected_version`.
    #[tracing::instrument(skip(self))]
    pub async fn publish(&self, id: NewsId, expected_version: Version) -> Result<Version> {
        let base = self.writable_revision(id, expected_version).await?;
        if base.is_published() {
            return Err(NewsError::AlreadyPublished(id));
        }

        let mut draft = RevisionDraft::following(&base, RevisionKind::Published);
        draft.published_at = Some(Utc::now());
        let version = self.commit(id, expected_version, draft).await?;

        metrics::counter!("news_published").increment(1);
        tracing::info!(%id, %version, "news published");
        Ok(version)
    }

    /// Retires the article. The tombstone revision keeps the history intact
    /// while hiding the article from reads.
    #[tracing::instrument(skip(self))]
    pub async fn retire(&self, id: NewsId, expected_version: Version) -> Result<Version> {
        let base = self.writable_revision(id, expected_version).await?;

        let mut draft = RevisionDraft::following(&base, RevisionKind::Retired);
        draft.retired_at = Some(Utc::now());
        let version = self.commit(id, expected_version, draft).await?;

        metrics::counter!("news_retired").increment(1);
        tracing::info!(%id, %version, "news retired");
        Ok(version)
    }

    /// Reads the current projection of an article.
    #[tracing::instrument(skip(self))]
    pub async fn read(&self, id: NewsId) -> Result<NewsProjection> {
        self.queries
            .get(id)
            .await?
            .filter(|p| self.is_visible(p))
            .ok_or(NewsError::NotFound(id))
    }

    /// Reads an article once its projection has reached `version`.
    ///
    /// Fails with `NotVisible` if that does not happen within `timeout`.
    #[tracing::instrument(skip(self))]
    pub async fn read_at_least(
        &self,
        id: NewsId,
        version: Version,
        timeout: Duration,
    ) -> Result<NewsProjection> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(projection) = self.queries.get(id).await? {
                if projection.version >= version {
                    return if self.is_visible(&projection) {
                        Ok(projection)
                    } else {
                        Err(NewsError::NotFound(id))
                    };
                }
            }

            if tokio::time::Instant::now() >= deadline {
                metrics::counter!("news_read_not_visible").increment(1);
                return Err(NewsError::NotVisible { id, version });
            }
            tokio::time::sleep(self.config.read_poll_interval).await;
        }
    }

    /// Searches projections of this service's news type.
    #[tracing::instrument(skip(self))]
    pub async fn search(&self, filter: &NewsFilter) -> Result<Vec<NewsProjection>> {
        let pinned = filter.clone().news_type(self.config.news_type.clone());
        Ok(self.queries.query(&pinned).await?)
    }

    /// Returns the current committed version of an article.
    ///
    /// Reads the command store, so it is the right call after `CommitUnknown`.
    #[tracing::instrument(skip(self))]
    pub async fn current_version(&self, id: NewsId) -> Result<Version> {
        self.commands
            .current_version(id)
            .await?
            .ok_or(NewsError::NotFound(id))
    }

    /// Returns every committed revision of an article, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn history(&self, id: NewsId) -> Result<Vec<NewsRecord>> {
        let history = self.commands.get_history(id).await?;
        match history.first() {
            Some(first) if first.news_type == self.config.news_type => Ok(history),
            _ => Err(NewsError::NotFound(id)),
        }
    }

    /// Returns one committed revision of an article.
    #[tracing::instrument(skip(self))]
    pub async fn revision(&self, id: NewsId, version: Version) -> Result<NewsRecord> {
        self.commands
            .get_revision(id, version)
            .await?
            .filter(|r| r.news_type == self.config.news_type)
            .ok_or(NewsError::NotFound(id))
    }

    fn is_visible(&self, projection: &NewsProjection) -> bool {
        projection.news_type == self.config.news_type && !projection.is_retired()
    }

    /// Loads the revision a write is based on and checks it accepts writes.
    async fn writable_revision(&self, id: NewsId, expected_version: Version) -> Result<NewsRecord> {
        let base = match self.commands.get_revision(id, expected_version).await? {
            Some(record) => record,
            None => {
                return match self.commands.current_version(id).await? {
                    Some(actual) => Err(NewsError::Conflict {
                        id,
                        expected: expected_version,
                        actual,
                    }),
                    None => Err(NewsError::NotFound(id)),
                };
            }
        };

        if base.news_type != self.config.news_type {
            return Err(NewsError::NotFound(id));
        }
        if base.is_retired() {
            return Err(NewsError::Retired(id));
        }
        Ok(base)
    }

    /// Appends a revision with retries, bounded by the write timeout.
    async fn commit(&self, id: NewsId, base: Version, draft: RevisionDraft) -> Result<Version> {
        let attempt = retry(&self.config.write_retry, "append revision", || {
            self.commands.append(id, base, draft.clone())
        });

        match tokio::time::timeout(self.config.write_timeout, attempt).await {
            Ok(Ok(version)) => Ok(version),
            Ok(Err(e)) => {
                let err = unavailable_or_store(e);
                if matches!(err, NewsError::Conflict { .. }) {
                    metrics::counter!("news_write_conflicts").increment(1);
                    tracing::debug!(%id, %base, "write lost the version race");
                }
                Err(err)
            }
            Err(_) => {
                metrics::counter!("news_commit_unknown").increment(1);
                tracing::warn!(
                    %id,
                    %base,
                    timeout_ms = self.config.write_timeout.as_millis() as u64,
                    "write timed out, outcome unknown"
                );
                Err(NewsError::CommitUnknown(id))
            }
        }
    }
}

fn unavailable_or_store(err: RetryError<command_store::CommandStoreError>) -> NewsError {
    match err {
        RetryError::Permanent(e) => e.into(),
        RetryError::Exhausted { attempts, last } => {
            NewsError::Unavailable(format!("gave up after {attempts} attempts: {last}"))
        }
    }
}
