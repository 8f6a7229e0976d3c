// Worker Pool - runs dispatched job executions on the tokio runtime

mod panic_guard;

pub use panic_guard::{join_error_message, panic_message};

use crate::application::constants::DEFAULT_MAX_WORKERS;
use crate::port::{JobDispatcher, JobFuture};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// Bounded pool of job executions.
///
/// Every dispatched future is spawned immediately but only starts running
/// once it holds one of `max_workers` permits. Each future runs exactly once;
/// there is no retry.
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    tasks: Mutex<JoinSet<()>>,
    max_workers: usize,
}

impl WorkerPool {
    /// Create a pool. `dispatch` must be called from within a tokio runtime.
    ///
    /// # Arguments
    /// * `max_workers` - Concurrent executions (clamped to at least 1)
    pub fn new(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_workers)),
            tasks: Mutex::new(JoinSet::new()),
            max_workers,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Number of dispatched executions not yet reaped by `drain`
    pub fn pending(&self) -> usize {
        self.tasks.lock().map(|t| t.len()).unwrap_or(0)
    }

    /// Wait for every dispatched execution to finish
    pub async fn drain(&self) {
        let mut tasks = match self.tasks.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };

        info!(pending = tasks.len(), "Draining worker pool");
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %join_error_message(e), "Worker task ended abnormally");
            }
        }
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WORKERS)
    }
}

impl JobDispatcher for WorkerPool {
    fn dispatch(&self, job: JobFuture) {
        let permits = Arc::clone(&self.permits);
        let task = async move {
            // The semaphore is never closed, so acquire only fails if it is
            let Ok(_permit) = permits.acquire_owned().await else {
                error!("Worker pool closed, dropping job");
                return;
            };
            debug!("Worker permit acquired");
            job.await;
        };

        match self.tasks.lock() {
            Ok(mut tasks) => {
                tasks.spawn(task);
            }
            Err(poisoned) => {
                poisoned.into_inner().spawn(task);
            }
        }
    }
}
