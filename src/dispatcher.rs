//! Parallel dispatch of specialist workers.
//!
//! One tokio task per assignment, a single wall-clock deadline for the whole
//! batch, and strict fault isolation: a failing worker becomes a
//! `success=false` result and never disturbs its siblings. When the deadline
//! elapses, outstanding workers are abandoned (detached, not killed) and the
//! results gathered so far are returned, possibly fewer than requested.
//!
//! Results are returned in completion order. Consumers must index by
//! [`Category`](crate::category::Category), never by position.

use crate::capability::Specialist;
use crate::worker::{WorkerResult, WorkerTask};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Default ceiling for one dispatch batch.
const DEFAULT_DISPATCH_TIMEOUT_SECS: u64 = 600;

/// Fans out worker tasks and joins them at a deadline.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    timeout: Duration,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_DISPATCH_TIMEOUT_SECS),
        }
    }

    /// Override the batch deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run every assignment concurrently and return the results that
    /// completed before the deadline.
    pub async fn dispatch(
        &self,
        assignments: Vec<(Arc<dyn Specialist>, WorkerTask)>,
    ) -> Vec<WorkerResult> {
        if assignments.is_empty() {
            return Vec::new();
        }

        let deadline = tokio::time::Instant::now() + self.timeout;
        let mut workers = JoinSet::new();
        for (specialist, task) in assignments {
            workers.spawn(run_worker(specialist, task));
        }

        let mut results = Vec::new();
        loop {
            match tokio::time::timeout_at(deadline, workers.join_next()).await {
                Ok(Some(Ok(result))) => {
                    debug!(category = %result.category, success = result.success, "worker finished");
                    results.push(result);
                }
                Ok(Some(Err(join_err))) => {
                    // A panicked worker loses its result; isolation still holds.
                    warn!(error = %join_err, "worker task aborted");
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        outstanding = workers.len(),
                        "dispatch deadline elapsed; abandoning outstanding workers"
                    );
                    workers.detach_all();
                    break;
                }
            }
        }

        results
    }
}

/// Run one specialist and fold any failure into its result.
async fn run_worker(specialist: Arc<dyn Specialist>, task: WorkerTask) -> WorkerResult {
    let category = task.category;
    let start = Instant::now();
    match specialist.run(&task).await {
        Ok(output) => WorkerResult::succeeded(
            category,
            output.content,
            output.produced_files,
            start.elapsed(),
        ),
        Err(err) => WorkerResult::failed(category, err.to_string(), start.elapsed()),
    }
}
