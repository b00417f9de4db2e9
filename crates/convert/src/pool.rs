//! Dispatch pool for kelp
//!
//! A fixed set of long-lived workers sharing one bounded job queue. Each worker
//! pulls one job at a time and runs the synchronous handler on the blocking
//! thread pool, so a worker never has more than one job in flight.
//!
//! Completion is event driven: once every job has been enqueued the sending
//! side is dropped, workers drain what is left, see the queue closed and
//! empty, and exit. `run` returns after every worker has exited, which means
//! every submitted job has been started and finished exactly once.

use crate::concurrency::ConcurrencyPlan;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

/// Pool lifecycle phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolPhase {
    /// Jobs are still being enqueued
    Filling,
    /// All jobs are enqueued; workers are draining the queue
    Draining,
    /// Every worker has stopped
    Done,
}

impl fmt::Display for PoolPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolPhase::Filling => write!(f, "filling"),
            PoolPhase::Draining => write!(f, "draining"),
            PoolPhase::Done => write!(f, "done"),
        }
    }
}

/// What a pool run did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolReport {
    /// Jobs accepted into the queue
    pub submitted: usize,
    /// Handler invocations that returned normally
    pub completed: usize,
    /// Handler invocations that panicked
    pub panicked: usize,
}

impl PoolReport {
    /// Jobs that were picked up by a worker, whatever the handler did
    pub fn processed(&self) -> usize {
        self.completed + self.panicked
    }
}

#[derive(Debug, Default)]
struct WorkerStats {
    completed: usize,
    panicked: usize,
}

type SharedQueue<J> = Arc<Mutex<mpsc::Receiver<J>>>;

/// Bounded pool of conversion workers
#[derive(Debug, Clone)]
pub struct DispatchPool {
    plan: ConcurrencyPlan,
}

impl DispatchPool {
    /// Create a pool sized by `plan`
    pub fn new(plan: ConcurrencyPlan) -> Self {
        Self { plan }
    }

    /// The plan this pool runs with
    pub fn plan(&self) -> ConcurrencyPlan {
        self.plan
    }

    /// Feed every job to `handler` on `plan.workers` workers and wait for all of them.
    ///
    /// The same queue/worker structure is used for any worker count, including one.
    /// No ordering between job completions is guaranteed when there is more
    /// than one worker. A panicking handler is logged and counted in the report;
    /// it never stops the remaining jobs.
    pub async fn run<J, I, F>(&self, jobs: I, handler: F) -> PoolReport
    where
        I: IntoIterator<Item = J>,
        J: Send + 'static,
        F: Fn(J) + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        let (job_tx, job_rx) = mpsc::channel::<J>(self.plan.queue_capacity.max(1));
        let queue: SharedQueue<J> = Arc::new(Mutex::new(job_rx));

        debug!(
            phase = %PoolPhase::Filling,
            workers = self.plan.workers,
            queue_capacity = self.plan.queue_capacity,
            "dispatch pool started"
        );

        let mut workers = JoinSet::new();
        for worker_id in 0..self.plan.workers.max(1) {
            workers.spawn(worker_loop(
                worker_id,
                Arc::clone(&queue),
                Arc::clone(&handler),
            ));
        }
        drop(queue);

        let mut report = PoolReport::default();
        for job in jobs {
            if job_tx.send(job).await.is_err() {
                warn!("every worker has exited; remaining jobs were not dispatched");
                break;
            }
            report.submitted += 1;
        }

        // Closing the sender is the stop signal: workers exit once the queue is empty
        drop(job_tx);
        debug!(phase = %PoolPhase::Draining, submitted = report.submitted, "all jobs enqueued");

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(stats) => {
                    report.completed += stats.completed;
                    report.panicked += stats.panicked;
                }
                Err(e) => error!("dispatch worker terminated abnormally: {}", e),
            }
        }

        debug!(
            phase = %PoolPhase::Done,
            completed = report.completed,
            panicked = report.panicked,
            "dispatch pool finished"
        );
        report
    }
}

/// Worker state machine: Idle (waiting on the queue) -> Processing -> Idle ... -> Stopped
async fn worker_loop<J, F>(
    worker_id: usize,
    queue: SharedQueue<J>,
    handler: Arc<F>,
) -> WorkerStats
where
    J: Send + 'static,
    F: Fn(J) + Send + Sync + 'static,
{
    let mut stats = WorkerStats::default();

    loop {
        // Only the waiting worker holds the lock; it is released before the job runs
        let next = {
            let mut rx = queue.lock().await;
            rx.recv().await
        };

        let Some(job) = next else {
            break;
        };

        let handler = Arc::clone(&handler);
        match tokio::task::spawn_blocking(move || handler(job)).await {
            Ok(()) => stats.completed += 1,
            Err(e) => {
                error!(worker = worker_id, "job handler panicked: {}", e);
                stats.panicked += 1;
            }
        }
    }

    debug!(
        worker = worker_id,
        completed = stats.completed,
        panicked = stats.panicked,
        "worker stopped"
    );
    stats
}
