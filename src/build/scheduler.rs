//! Bounded parallel execution of compile jobs.
//!
//! Jobs are dispatched to a rayon pool all at once. The coordinating thread
//! receives finished jobs over a channel and hands each to the caller as it
//! arrives. The first failure, or the wall-clock deadline, raises a shared
//! cancel flag: queued jobs are skipped and running tools are killed.

use super::job::{BuildJob, JobResult, run_job};
use super::process::POLL_INTERVAL;
use crate::error::BuildError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// Job limits at or below this always compile sequentially.
pub const CPU_COUNT_MIN: usize = 1;

/// Wall-clock budget for one parallel compile.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// How long cancelled workers get to wind down before the coordinator
/// stops waiting for them.
const TEARDOWN_GRACE: Duration = Duration::from_secs(5);

pub fn cpu_count() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    /// Configured job count; `None` or `0` means one per CPU.
    pub jobs: Option<usize>,
    pub timeout: Duration,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            jobs: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl Scheduler {
    pub fn new(jobs: Option<usize>, timeout: Duration) -> Self {
        Self { jobs, timeout }
    }

    /// The concurrency limit: the configured count, else the CPU count.
    pub fn limit(&self) -> usize {
        match self.jobs {
            Some(n) if n > 0 => n,
            _ => cpu_count(),
        }
    }

    /// Whether `pending` jobs would run one after another.
    pub fn is_sequential(&self, pending: usize) -> bool {
        let limit = self.limit();
        limit <= CPU_COUNT_MIN || pending <= limit
    }

    /// Runs every job, handing each result to `on_result` as it completes.
    ///
    /// An error from `on_result` stops the run: no further results are
    /// delivered and outstanding work is torn down.
    pub fn execute<F>(&self, queue: Vec<BuildJob>, mut on_result: F) -> Result<(), BuildError>
    where
        F: FnMut(JobResult) -> Result<(), BuildError>,
    {
        if queue.is_empty() {
            return Ok(());
        }
        if self.is_sequential(queue.len()) {
            tracing::debug!(jobs = queue.len(), "compiling sequentially");
            let cancel = AtomicBool::new(false);
            for job in &queue {
                on_result(run_job(job, &cancel))?;
            }
            return Ok(());
        }
        self.execute_parallel(queue, on_result)
    }

    fn execute_parallel<F>(&self, queue: Vec<BuildJob>, mut on_result: F) -> Result<(), BuildError>
    where
        F: FnMut(JobResult) -> Result<(), BuildError>,
    {
        let workers = self.limit().min(cpu_count()).max(1);
        tracing::debug!(jobs = queue.len(), workers, "compiling in parallel");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("xf-compile-{}", i))
            .build()
            .map_err(|e| BuildError::tool(format!("cannot start compile workers: {}", e), ""))?;

        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel::<JobResult>();
        let total = queue.len();

        for job in queue {
            let tx = tx.clone();
            let cancel = Arc::clone(&cancel);
            pool.spawn(move || {
                if cancel.load(Ordering::SeqCst) {
                    return;
                }
                let result = run_job(&job, &cancel);
                let _ = tx.send(result);
            });
        }
        drop(tx);

        let deadline = Instant::now() + self.timeout;
        let mut received = 0;
        let outcome = loop {
            if received == total {
                break Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                break Err(BuildError::Timeout(self.timeout));
            }
            match rx.recv_timeout((deadline - now).min(POLL_INTERVAL)) {
                Ok(result) => {
                    received += 1;
                    if let Err(e) = on_result(result) {
                        break Err(e);
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    break Err(BuildError::tool(
                        format!("{} compile jobs ended without a result", total - received),
                        "",
                    ));
                }
            }
        };

        if outcome.is_err() {
            cancel.store(true, Ordering::SeqCst);
            let grace = Instant::now() + TEARDOWN_GRACE;
            // Drain until every worker has dropped its sender
            while let Some(left) = grace.checked_duration_since(Instant::now()) {
                match rx.recv_timeout(left.min(POLL_INTERVAL)) {
                    Ok(_) | Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        }
        outcome
    }
}
