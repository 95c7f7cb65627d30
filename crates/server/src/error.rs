//! Errors raised while starting or stopping the server.

use command_store::CommandStoreError;
use query_store::QueryStoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// An environment variable holds an unusable value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Connecting to PostgreSQL failed.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Applying the schema migrations failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Command store error: {0}")]
    CommandStore(#[from] CommandStoreError),

    #[error("Query store error: {0}")]
    QueryStore(#[from] QueryStoreError),

    /// The tracing subscriber could not be installed.
    #[error("Telemetry setup error: {0}")]
    Telemetry(String),

    /// The Prometheus exporter could not be installed.
    #[error("Metrics exporter error: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    /// The projector worker panicked or was aborted.
    #[error("Projector worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}
