//! Bounded concurrent branches for report building.
//!
//! One report fans out over subjects, courses or students. Each branch runs
//! under a shared concurrency limit and its own timeout; a branch that fails
//! or times out yields no result instead of failing the report. Dropping the
//! fan-out future (the request went away) cancels every branch still waiting;
//! cancelling the shutdown token fails the whole fan-out with
//! [`EngineError::Cancelled`].
//!
//! Branches must not fan out again: the limiter is shared, and a branch
//! holding a permit while waiting for another could starve.

use std::fmt::{Debug, Display};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::core::metrics;
use crate::services::EngineError;

enum BranchOutcome<T> {
    Done(T),
    Failed(String),
    TimedOut,
    Cancelled,
}

/// Branch results in input order; `None` where the branch failed.
#[derive(Debug)]
pub(crate) struct FanIn<K, T> {
    pub(crate) results: Vec<(K, Option<T>)>,
    pub(crate) failed: usize,
}

impl<K, T> FanIn<K, T> {
    pub(crate) fn is_complete(&self) -> bool {
        self.failed == 0
    }

    pub(crate) fn successes(self) -> impl Iterator<Item = (K, T)> {
        self.results.into_iter().filter_map(|(key, value)| value.map(|value| (key, value)))
    }
}

#[derive(Clone)]
pub(crate) struct FanOut {
    permits: Arc<Semaphore>,
    branch_timeout: Duration,
    shutdown: CancellationToken,
}

impl FanOut {
    pub(crate) fn new(
        max_concurrency: usize,
        branch_timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
            branch_timeout,
            shutdown,
        }
    }

    pub(crate) async fn run<K, T, E, F, Fut>(
        &self,
        label: &'static str,
        keys: Vec<K>,
        branch: F,
    ) -> Result<FanIn<K, T>, EngineError>
    where
        K: Debug,
        T: Send + 'static,
        E: Display + Send + 'static,
        F: Fn(&K) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let started = Instant::now();
        let cancel = self.shutdown.child_token();
        let _cancel_on_drop = cancel.clone().drop_guard();

        let mut branches = JoinSet::new();
        for (index, key) in keys.iter().enumerate() {
            let work = branch(key);
            let permits = self.permits.clone();
            let cancel = cancel.clone();
            let timeout = self.branch_timeout;

            branches.spawn(async move {
                let outcome = tokio::select! {
                    _ = cancel.cancelled() => BranchOutcome::Cancelled,
                    outcome = async move {
                        let Ok(_permit) = permits.acquire_owned().await else {
                            return BranchOutcome::Failed("limiter closed".to_string());
                        };
                        match tokio::time::timeout(timeout, work).await {
                            Ok(Ok(value)) => BranchOutcome::Done(value),
                            Ok(Err(err)) => BranchOutcome::Failed(err.to_string()),
                            Err(_) => BranchOutcome::TimedOut,
                        }
                    } => outcome,
                };
                (index, outcome)
            });
        }

        let mut slots: Vec<Option<T>> = keys.iter().map(|_| None).collect();
        let mut failed = 0;
        while let Some(joined) = branches.join_next().await {
            let (index, outcome) = match joined {
                Ok(done) => done,
                Err(err) => {
                    tracing::error!(branch = label, error = %err, "Report branch panicked");
                    metrics::record_branch("panicked");
                    failed += 1;
                    continue;
                }
            };
            match outcome {
                BranchOutcome::Done(value) => {
                    metrics::record_branch("ok");
                    slots[index] = Some(value);
                }
                BranchOutcome::Failed(error) => {
                    tracing::warn!(
                        branch = label,
                        key = ?keys[index],
                        %error,
                        "Report branch failed"
                    );
                    metrics::record_branch("failed");
                    failed += 1;
                }
                BranchOutcome::TimedOut => {
                    tracing::warn!(
                        branch = label,
                        key = ?keys[index],
                        timeout_secs = self.branch_timeout.as_secs_f64(),
                        "Report branch timed out"
                    );
                    metrics::record_branch("timed_out");
                    failed += 1;
                }
                BranchOutcome::Cancelled => {
                    metrics::record_branch("cancelled");
                    failed += 1;
                }
            }
        }

        tracing::debug!(
            branch = label,
            total = keys.len(),
            failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fan-out finished"
        );

        if cancel.is_cancelled() {
            tracing::info!(branch = label, "Fan-out cancelled by shutdown");
            return Err(EngineError::Cancelled);
        }

        Ok(FanIn { results: keys.into_iter().zip(slots).collect(), failed })
    }
}
