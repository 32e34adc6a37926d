//! Background job runner
//!
//! A bounded FIFO queue feeding a fixed worker pool. Enqueue never blocks
//! (the upload endpoint must answer immediately); dequeue blocks the
//! worker. Shutdown closes intake and grants the pool a grace period to
//! drain, then abandons what is left - abandoned jobs stay `running` and
//! the startup reconciler sweeps them to `failed`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{JobError, Result};
use crate::executor::JobExecutor;

/// Runner tuning
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Worker tasks consuming the queue
    pub workers: usize,
    /// Queue capacity; beyond it `enqueue` fails fast
    pub queue_size: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            queue_size: 256,
        }
    }
}

/// Handle to the running pool; shareable, shuts down in place
pub struct JobRunner {
    tx: parking_lot::Mutex<Option<mpsc::Sender<Uuid>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl JobRunner {
    /// Spawn the worker pool
    pub fn start(executor: Arc<JobExecutor>, config: RunnerConfig) -> Self {
        let (tx, rx) = mpsc::channel::<Uuid>(config.queue_size.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..config.workers.max(1))
            .map(|worker_idx| {
                let rx = Arc::clone(&rx);
                let executor = Arc::clone(&executor);
                tokio::spawn(async move {
                    loop {
                        // Hold the lock only while waiting for the next id
                        let job_id = { rx.lock().await.recv().await };
                        let Some(job_id) = job_id else {
                            break;
                        };
                        executor.run_job(job_id).await;
                    }
                    info!(worker = worker_idx, "job worker stopped");
                })
            })
            .collect();

        info!(
            workers = config.workers,
            queue = config.queue_size,
            "job runner started"
        );
        Self {
            tx: parking_lot::Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
        }
    }

    /// Non-blocking enqueue; fails once shutdown has begun
    pub fn enqueue(&self, job_id: Uuid) -> Result<()> {
        let tx = self.tx.lock();
        match tx.as_ref() {
            Some(tx) => tx.try_send(job_id).map_err(|_| JobError::QueueFull),
            None => Err(JobError::QueueFull),
        }
    }

    /// Close intake, wait up to `grace` for the pool to drain, then abandon
    pub async fn shutdown(&self, grace: Duration) {
        drop(self.tx.lock().take());

        let workers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock().await);
        let drain = futures_util::future::join_all(workers);
        match tokio::time::timeout(grace, drain).await {
            Ok(_) => info!("job runner drained"),
            Err(_) => {
                warn!(
                    grace_seconds = grace.as_secs(),
                    "job runner still busy after grace period; abandoning in-flight jobs"
                );
            }
        }
    }
}
