//! Application configuration loaded from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use common::NewsType;

use crate::error::ServerError;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `NEWS_TYPE`: category served by this process (default: `"politics"`)
/// - `DATABASE_URL`: PostgreSQL command store; unset keeps revisions in memory
/// - `QUERY_DB_PATH`: sled directory for the query store; unset keeps projections in memory
/// - `PROJECTOR_PARTITIONS`: concurrent projector lanes (default: `4`)
/// - `PROJECTOR_BATCH_SIZE`: log entries per projector batch (default: `256`)
/// - `PROJECTOR_POLL_MS`: longest idle wait of the projector (default: `500`)
/// - `WRITE_TIMEOUT_MS`: bound on a single write (default: `5000`)
/// - `METRICS_ADDR`: Prometheus listener address; unset disables the exporter
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub news_type: NewsType,
    pub database_url: Option<String>,
    pub query_db_path: Option<PathBuf>,
    pub projector_partitions: usize,
    pub projector_batch_size: usize,
    pub projector_poll: Duration,
    pub write_timeout: Duration,
    pub metrics_addr: Option<SocketAddr>,
    pub log_format: LogFormat,
    pub log_level: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults.
    ///
    /// Unparseable numbers fall back to their default. An invalid news type,
    /// metrics address or log format is an error.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ServerError> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let number = |key: &str, default: u64| {
            var(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(default)
        };

        let news_type = match var("NEWS_TYPE") {
            Some(raw) => NewsType::parse(raw.trim())
                .map_err(|e| ServerError::Config(format!("NEWS_TYPE: {e}")))?,
            None => defaults.news_type,
        };

        let metrics_addr = var("METRICS_ADDR")
            .map(|raw| {
                raw.trim()
                    .parse::<SocketAddr>()
                    .map_err(|e| ServerError::Config(format!("METRICS_ADDR {raw:?}: {e}")))
            })
            .transpose()?;

        let log_format = match var("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ServerError::Config(format!(
                    "LOG_FORMAT must be \"text\" or \"json\", got {other:?}"
                )));
            }
        };

        Ok(Self {
            news_type,
            database_url: var("DATABASE_URL"),
            query_db_path: var("QUERY_DB_PATH").map(PathBuf::from),
            projector_partitions: number(
                "PROJECTOR_PARTITIONS",
                defaults.projector_partitions as u64,
            )
            .max(1) as usize,
            projector_batch_size: number(
                "PROJECTOR_BATCH_SIZE",
                defaults.projector_batch_size as u64,
            )
            .max(1) as usize,
            projector_poll: Duration::from_millis(number(
                "PROJECTOR_POLL_MS",
                defaults.projector_poll.as_millis() as u64,
            )),
            write_timeout: Duration::from_millis(number(
                "WRITE_TIMEOUT_MS",
                defaults.write_timeout.as_millis() as u64,
            )),
            metrics_addr,
            log_format,
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            news_type: NewsType::default(),
            database_url: None,
            query_db_path: None,
            projector_partitions: 4,
            projector_batch_size: 256,
            projector_poll: Duration::from_millis(500),
            write_timeout: Duration::from_millis(5000),
            metrics_addr: None,
            log_format: LogFormat::Text,
            log_level: "info".to_string(),
        }
    }
}
