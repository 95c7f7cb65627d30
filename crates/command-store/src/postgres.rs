use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use tokio::sync::watch;

use crate::{
    CommandStoreError, CommittedRevision, LogPosition, NewsId, NewsRecord, NewsType, Result,
    RevisionDraft, RevisionKind, Version,
    feed::CommitFeed,
    store::{CommandStore, validate_id},
};

const SELECT_COLUMNS: &str = "position, id, version, kind, title, content, author, news_type, \
     tags, created_at, published_at, retired_at, committed_at";

/// PostgreSQL-backed command store implementation.
///
/// Appends for one id are serialized with a transaction-scoped advisory
/// lock on the id; the `(id, version)` primary key backs that up.
#[derive(Clone)]
pub struct PostgresCommandStore {
    pool: PgPool,
    feed: CommitFeed,
}

impl PostgresCommandStore {
    /// Creates a new PostgreSQL command store.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            feed: CommitFeed::new(),
        }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_record(row: &PgRow) -> Result<NewsRecord> {
        let kind: String = row.try_get("kind")?;
        let news_type: String = row.try_get("news_type")?;

        Ok(NewsRecord {
            id: NewsId::new(row.try_get("id")?),
            version: Version::new(row.try_get("version")?),
            kind: kind
                .parse::<RevisionKind>()
                .map_err(|e| CommandStoreError::InvalidRow(e.to_string()))?,
            title: row.try_get("title")?,
            content: row.try_get("content")?,
            author: row.try_get("author")?,
            news_type: NewsType::parse(news_type)
                .map_err(|e| CommandStoreError::InvalidRow(e.to_string()))?,
            tags: row.try_get("tags")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            published_at: row.try_get("published_at")?,
            retired_at: row.try_get("retired_at")?,
            committed_at: row.try_get::<DateTime<Utc>, _>("committed_at")?,
        })
    }

    fn row_to_committed(row: PgRow) -> Result<CommittedRevision> {
        Ok(CommittedRevision {
            position: LogPosition::new(row.try_get("position")?),
            record: Self::row_to_record(&row)?,
        })
    }
}

#[async_trait]
impl CommandStore for PostgresCommandStore {
    async fn allocate_id(&self) -> Result<NewsId> {
        let id: i64 = sqlx::query_scalar("SELECT nextval('news_id_seq')")
            .fetch_one(&self.pool)
            .await?;
        Ok(NewsId::new(id))
    }

    #[tracing::instrument(skip(self, draft), fields(news_id = %id, base = %base_version))]
    async fn append(
        &self,
        id: NewsId,
        base_version: Version,
        draft: RevisionDraft,
    ) -> Result<Version> {
        validate_id(id)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(id.as_i64())
            .execute(&mut *tx)
            .await?;

        let current: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM news WHERE id = $1")
            .bind(id.as_i64())
            .fetch_one(&mut *tx)
            .await?;
        let actual = Version::new(current.unwrap_or(0));

        if actual != base_version {
            metrics::counter!("command_store_conflicts").increment(1);
            return Err(CommandStoreError::Conflict {
                id,
                expected: base_version,
                actual,
            });
        }

        let version = actual.next();
        let position: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO news (id, version, kind, title, content, author, news_type, tags,
                              created_at, published_at, retired_at, committed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING position
            "#,
        )
        .bind(id.as_i64())
        .bind(version.as_i64())
        .bind(draft.kind.as_str())
        .bind(&draft.fields.title)
        .bind(&draft.fields.content)
        .bind(&draft.fields.author)
        .bind(draft.news_type.as_str())
        .bind(&draft.fields.tags)
        .bind(draft.created_at)
        .bind(draft.published_at)
        .bind(draft.retired_at)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            // A primary key violation means another writer committed this version
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("news_pkey")
            {
                return CommandStoreError::Conflict {
                    id,
                    expected: base_version,
                    actual: version,
                };
            }
            CommandStoreError::Database(e)
        })?;

        tx.commit().await?;

        let position = LogPosition::new(position);
        self.feed.publish(position);
        metrics::counter!("command_store_appends").increment(1);
        tracing::debug!(%version, %position, "revision committed");

        Ok(version)
    }

    async fn current_version(&self, id: NewsId) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM news WHERE id = $1")
                .bind(id.as_i64())
                .fetch_one(&self.pool)
                .await?;

        Ok(version.map(Version::new))
    }

    async fn get_revision(&self, id: NewsId, version: Version) -> Result<Option<NewsRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM news WHERE id = $1 AND version = $2"
        ))
        .bind(id.as_i64())
        .bind(version.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn get_history(&self, id: NewsId) -> Result<Vec<NewsRecord>> {
        self.get_revisions_from(id, Version::first()).await
    }

    async fn get_revisions_from(
        &self,
        id: NewsId,
        from_version: Version,
    ) -> Result<Vec<NewsRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM news WHERE id = $1 AND version >= $2 ORDER BY version ASC"
        ))
        .bind(id.as_i64())
        .bind(from_version.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn read_log(&self, after: LogPosition, limit: usize) -> Result<Vec<CommittedRevision>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM news WHERE position > $1 ORDER BY position ASC LIMIT $2"
        ))
        .bind(after.as_i64())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_committed).collect()
    }

    async fn heads(&self) -> Result<Vec<(NewsId, Version)>> {
        let rows = sqlx::query("SELECT id, MAX(version) AS version FROM news GROUP BY id ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<(NewsId, Version)> {
                Ok((
                    NewsId::new(row.try_get("id")?),
                    Version::new(row.try_get("version")?),
                ))
            })
            .collect()
    }

    fn subscribe(&self) -> watch::Receiver<LogPosition> {
        self.feed.subscribe()
    }
}
