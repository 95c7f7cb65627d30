use std::time::Duration;

use common::{NewsType, RetryPolicy};

/// Settings for a [`crate::NewsService`].
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// The category this service creates and serves.
    pub news_type: NewsType,
    /// Upper bound on one write, retries included. A write that runs out
    /// of time may or may not have committed.
    pub write_timeout: Duration,
    /// Retry policy for transient command-store failures.
    pub write_retry: RetryPolicy,
    /// How often `read_at_least` re-reads the query store.
    pub read_poll_interval: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            news_type: NewsType::default(),
            write_timeout: Duration::from_secs(5),
            write_retry: RetryPolicy::default(),
            read_poll_interval: Duration::from_millis(20),
        }
    }
}

impl ServiceConfig {
    pub fn for_news_type(news_type: NewsType) -> Self {
        Self {
            news_type,
            ..Self::default()
        }
    }
}
