//! Tracing and metrics setup.

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{Config, LogFormat};
use crate::error::ServerError;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level when it parses.
pub fn init_tracing(config: &Config) -> Result<(), ServerError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| ServerError::Telemetry(e.to_string()))?;

    let json = config.log_format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .try_init()
        .map_err(|e| ServerError::Telemetry(e.to_string()))
}

/// Installs the Prometheus recorder and its scrape listener.
///
/// Does nothing when no metrics address is configured; metrics macros are
/// then no-ops.
pub fn init_metrics(config: &Config) -> Result<(), ServerError> {
    let Some(addr) = config.metrics_addr else {
        return Ok(());
    };

    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(%addr, "prometheus exporter listening");
    Ok(())
}
