//! Deferred execution of speculative work.
//!
//! A [`Job`] is a boxed future that has not been polled yet, so handing one
//! to a scheduler defers all of its work. Jobs return `()`: anything that can
//! fail must be handled inside the job.
//!
//! Three strategies:
//!
//! - [`IdleScheduler`]: one worker drains a FIFO queue and yields to the
//!   runtime before starting each job, so interactive work that is already
//!   queued runs first.
//! - [`DeferredScheduler`]: spawns each job after a single cooperative yield
//!   (next-tick deferral).
//! - [`ManualScheduler`]: holds jobs until [`ManualScheduler::flush`] is
//!   awaited. Deterministic, for tests and embedders that drive their own loop.
//!   Submitting needs no runtime, but flushing must happen inside a Tokio
//!   runtime with the time driver enabled: image prefetch jobs spawn their
//!   fetches and race them against `tokio::time::timeout`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use folio_core::SchedulerMode;
use futures_util::future::BoxFuture;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::trace;

/// A unit of deferred work.
pub type Job = BoxFuture<'static, ()>;

/// Strategy for running background work.
///
/// No latency or priority guarantee beyond "later than now".
pub trait Scheduler: Send + Sync {
    /// Submit work. Never blocks and never fails.
    fn schedule(&self, job: Job);
}

/// Build the scheduler selected by `mode` on the given runtime.
pub fn scheduler_for(mode: SchedulerMode, handle: &Handle) -> Arc<dyn Scheduler> {
    match mode {
        SchedulerMode::Idle => Arc::new(IdleScheduler::new(handle)),
        SchedulerMode::Deferred => Arc::new(DeferredScheduler::new(handle.clone())),
    }
}

// ============================================================================
// IDLE
// ============================================================================

/// FIFO scheduler that starts a job only after yielding to the runtime.
///
/// Jobs are started in submission order but run concurrently once started:
/// a job waiting on the network does not hold up the queue. Each job runs in
/// its own task, so a panicking job never takes the worker down.
#[derive(Debug)]
pub struct IdleScheduler {
    tx: mpsc::UnboundedSender<Job>,
}

impl IdleScheduler {
    /// Start the worker on `handle`. It stops once the scheduler is dropped.
    pub fn new(handle: &Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let spawner = handle.clone();

        handle.spawn(async move {
            while let Some(job) = rx.recv().await {
                tokio::task::yield_now().await;
                spawner.spawn(job);
            }
        });

        Self { tx }
    }
}

impl Scheduler for IdleScheduler {
    fn schedule(&self, job: Job) {
        if self.tx.send(job).is_err() {
            trace!("idle worker gone, dropping job");
        }
    }
}

// ============================================================================
// DEFERRED
// ============================================================================

/// Next-tick scheduler: every job becomes its own task.
#[derive(Debug, Clone)]
pub struct DeferredScheduler {
    handle: Handle,
}

impl DeferredScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is running on.
    ///
    /// Returns `None` outside a Tokio runtime.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Scheduler for DeferredScheduler {
    fn schedule(&self, job: Job) {
        self.handle.spawn(async move {
            tokio::task::yield_now().await;
            job.await;
        });
    }
}

// ============================================================================
// MANUAL
// ============================================================================

/// Scheduler that runs nothing until flushed.
#[derive(Default)]
pub struct ManualScheduler {
    queue: Mutex<VecDeque<Job>>,
    submitted: AtomicU64,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs waiting to run.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Total jobs ever submitted.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::SeqCst)
    }

    /// Run the oldest pending job, if any. Returns false when the queue was empty.
    pub async fn run_next(&self) -> bool {
        // Lock released before polling: the job may schedule more work.
        let job = self.lock().pop_front();
        match job {
            Some(job) => {
                job.await;
                true
            }
            None => false,
        }
    }

    /// Run jobs in FIFO order until the queue is empty, including jobs
    /// submitted by the jobs being run. Returns how many jobs ran.
    ///
    /// Await this inside a Tokio runtime with time enabled; deadline-guarded
    /// jobs panic without one.
    pub async fn flush(&self) -> usize {
        let mut ran = 0;
        while self.run_next().await {
            ran += 1;
        }
        ran
    }

    /// Drop all pending jobs without running them.
    pub fn clear(&self) -> usize {
        let mut queue = self.lock();
        let dropped = queue.len();
        queue.clear();
        dropped
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Job>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, job: Job) {
        self.submitted.fetch_add(1, Ordering::SeqCst);
        self.lock().push_back(job);
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending())
            .field("submitted", &self.submitted())
            .finish()
    }
}
