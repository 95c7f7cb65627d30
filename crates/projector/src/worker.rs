//! Background loop that keeps a [`Projector`] running.
//!
//! The worker wakes up whenever the command store announces a commit, or
//! after `poll_interval` at the latest, and catches the projector up. Every
//! `reconcile_every` rounds it also runs [`Projector::reconcile`]. Failed
//! rounds back off exponentially. The loop exits when its
//! [`CancellationToken`] is triggered.

use std::sync::Arc;
use std::time::Duration;

use command_store::CommandStore;
use common::RetryPolicy;
use query_store::QueryStore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::Projector;

/// Tuning for a [`ProjectorWorker`].
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Longest time between rounds when no commit is announced.
    pub poll_interval: Duration,
    /// Run a reconciliation pass every this many rounds. Zero disables it.
    pub reconcile_every: u32,
    /// Backoff between failed rounds. `max_attempts` is ignored.
    pub error_backoff: RetryPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            reconcile_every: 120,
            error_backoff: RetryPolicy {
                initial_delay: Duration::from_millis(200),
                max_delay: Duration::from_secs(30),
                ..RetryPolicy::default()
            },
        }
    }
}

pub struct ProjectorWorker<C, Q> {
    projector: Arc<Projector<C, Q>>,
    config: WorkerConfig,
    cancel: CancellationToken,
}

impl<C, Q> ProjectorWorker<C, Q>
where
    C: CommandStore + 'static,
    Q: QueryStore + 'static,
{
    pub fn new(
        projector: Arc<Projector<C, Q>>,
        config: WorkerConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            projector,
            config,
            cancel,
        }
    }

    /// Runs the worker on the tokio runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Runs until cancelled.
    pub async fn run(self) {
        let mut commits = self.projector.commands().subscribe();
        let mut feed_open = true;
        let mut backoff = self.config.error_backoff.initial_delay;
        let mut rounds = 0u32;

        tracing::info!(
            poll_ms = self.config.poll_interval.as_millis() as u64,
            "projector worker started"
        );

        // Repair anything a previous run skipped before tailing the log.
        if let Err(e) = self.projector.reconcile().await {
            tracing::warn!(error = %e, "startup reconciliation failed");
        }

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let round = self.projector.catch_up().await;
            rounds = rounds.wrapping_add(1);

            let wait = match round {
                Ok(_) => {
                    backoff = self.config.error_backoff.initial_delay;
                    if self.config.reconcile_every > 0 && rounds % self.config.reconcile_every == 0
                    {
                        if let Err(e) = self.projector.reconcile().await {
                            tracing::warn!(error = %e, "periodic reconciliation failed");
                        }
                    }
                    None
                }
                Err(e) => {
                    metrics::counter!("projector_round_failures").increment(1);
                    tracing::error!(
                        error = %e,
                        retry_in_ms = backoff.as_millis() as u64,
                        "projector round failed"
                    );
                    let wait = backoff;
                    backoff = self.config.error_backoff.next_delay(backoff);
                    Some(wait)
                }
            };

            match wait {
                Some(delay) => {
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                None if feed_open => {
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        changed = commits.changed() => {
                            if changed.is_err() {
                                tracing::debug!("commit feed closed, polling only");
                                feed_open = false;
                            }
                        }
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
                None => {
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
            }
        }

        tracing::info!("projector worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProjectorConfig;
    use chrono::Utc;
    use command_store::{
        InMemoryCommandStore, NewsFields, NewsId, NewsType, RevisionDraft, Version,
    };
    use query_store::{InMemoryQueryStore, QueryStoreExt};

    async fn wait_for_version(queries: &InMemoryQueryStore, id: NewsId, version: Version) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if queries.version_of(id).await.unwrap() == Some(version) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("projection did not catch up in time");
    }

    #[tokio::test]
    async fn worker_projects_new_commits_until_cancelled() {
        let commands = InMemoryCommandStore::new();
        let queries = InMemoryQueryStore::new();
        let projector = Arc::new(Projector::with_config(
            commands.clone(),
            queries.clone(),
            ProjectorConfig {
                retry: RetryPolicy::immediate(2),
                ..ProjectorConfig::default()
            },
        ));

        let cancel = CancellationToken::new();
        let config = WorkerConfig {
            // Long enough that only the commit feed can explain a fast catch-up.
            poll_interval: Duration::from_secs(60),
            ..WorkerConfig::default()
        };
        let handle = ProjectorWorker::new(projector, config, cancel.clone()).spawn();

        let id = commands.allocate_id().await.unwrap();
        let draft = RevisionDraft::created(
            NewsType::default(),
            NewsFields::new("Live", "content", "author"),
            Utc::now(),
        );
        commands.append(id, Version::initial(), draft).await.unwrap();

        wait_for_version(&queries, id, Version::first()).await;

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_worker_exits_immediately() {
        let projector = Arc::new(Projector::new(
            InMemoryCommandStore::new(),
            InMemoryQueryStore::new(),
        ));
        let cancel = CancellationToken::new();
        cancel.cancel();

        tokio::time::timeout(
            Duration::from_secs(5),
            ProjectorWorker::new(projector, WorkerConfig::default(), cancel).run(),
        )
        .await
        .expect("worker ignored cancellation");
    }
}
