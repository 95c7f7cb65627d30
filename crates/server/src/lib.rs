//! Process bootstrap for the news record system.
//!
//! [`start`] builds the command and query stores named by the [`Config`],
//! spawns the projector worker and hands back an [`App`] holding the news
//! service. A transport layer embeds the service; this crate only owns its
//! lifetime.

pub mod config;
pub mod error;
pub mod telemetry;

use std::sync::Arc;

use command_store::{CommandStore, InMemoryCommandStore, PostgresCommandStore};
use news::{NewsService, ServiceConfig};
use projector::{Projector, ProjectorConfig, ProjectorWorker, WorkerConfig};
use query_store::{InMemoryQueryStore, QueryStore, SledQueryStore};
use sqlx::postgres::PgPoolOptions;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use config::{Config, LogFormat};
pub use error::ServerError;

pub type SharedCommandStore = Arc<dyn CommandStore>;
pub type SharedQueryStore = Arc<dyn QueryStore>;
pub type SharedNewsService = NewsService<SharedCommandStore, SharedQueryStore>;
pub type SharedProjector = Projector<SharedCommandStore, SharedQueryStore>;

/// A running instance: the news service plus its projector worker.
pub struct App {
    service: Arc<SharedNewsService>,
    projector: Arc<SharedProjector>,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

impl App {
    pub fn service(&self) -> Arc<SharedNewsService> {
        Arc::clone(&self.service)
    }

    pub fn projector(&self) -> Arc<SharedProjector> {
        Arc::clone(&self.projector)
    }

    /// Stops the projector worker and waits for it to finish its round.
    pub async fn shutdown(self) -> Result<(), ServerError> {
        self.cancel.cancel();
        self.worker.await?;
        tracing::info!("news server stopped");
        Ok(())
    }
}

/// Connects the configured stores.
///
/// PostgreSQL migrations are applied before the store is handed out.
pub async fn connect_stores(
    config: &Config,
) -> Result<(SharedCommandStore, SharedQueryStore), ServerError> {
    let commands: SharedCommandStore = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
            let store = PostgresCommandStore::new(pool);
            store.run_migrations().await?;
            tracing::info!("command store: postgres");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, revisions are kept in memory");
            Arc::new(InMemoryCommandStore::new())
        }
    };

    let queries: SharedQueryStore = match &config.query_db_path {
        Some(path) => Arc::new(SledQueryStore::open(path)?),
        None => {
            tracing::warn!("QUERY_DB_PATH not set, projections are kept in memory");
            Arc::new(InMemoryQueryStore::new())
        }
    };

    Ok((commands, queries))
}

/// Builds the service over the given stores and spawns the projector worker.
pub fn assemble(config: &Config, commands: SharedCommandStore, queries: SharedQueryStore) -> App {
    let service = Arc::new(NewsService::with_config(
        Arc::clone(&commands),
        Arc::clone(&queries),
        ServiceConfig {
            news_type: config.news_type.clone(),
            write_timeout: config.write_timeout,
            ..ServiceConfig::default()
        },
    ));

    let projector = Arc::new(Projector::with_config(
        commands,
        queries,
        ProjectorConfig {
            batch_size: config.projector_batch_size,
            partitions: config.projector_partitions,
            ..ProjectorConfig::default()
        },
    ));

    let cancel = CancellationToken::new();
    let worker = ProjectorWorker::new(
        Arc::clone(&projector),
        WorkerConfig {
            poll_interval: config.projector_poll,
            ..WorkerConfig::default()
        },
        cancel.clone(),
    )
    .spawn();

    App {
        service,
        projector,
        cancel,
        worker,
    }
}

/// Connects the stores and starts the projector worker.
#[tracing::instrument(skip(config), fields(news_type = %config.news_type))]
pub async fn start(config: &Config) -> Result<App, ServerError> {
    let (commands, queries) = connect_stores(config).await?;
    let app = assemble(config, commands, queries);
    tracing::info!(
        partitions = config.projector_partitions,
        batch_size = config.projector_batch_size,
        "news server started"
    );
    Ok(app)
}
