//! Bounded worker pool for job futures.
//!
//! At most `size` jobs run at once; up to `queue_capacity` more wait for a
//! slot. Admission beyond that is refused with [`PoolError::Busy`].
//!
//! Shutdown closes the pool to new work, cancels jobs that never started,
//! and waits for running jobs. When the drain timeout passes, the remaining
//! job futures are dropped: their child processes are killed and their GPU
//! permits are released on drop.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use crate::error::PoolError;

pub struct WorkerPool {
    slots: Arc<Semaphore>,
    size: usize,
    capacity: usize,
    in_flight: Arc<AtomicUsize>,
    tracker: TaskTracker,
    /// Cancels jobs still waiting for a slot.
    stop_queued: CancellationToken,
    /// Cancels everything, including running jobs.
    abort: CancellationToken,
}

/// A claimed admission slot. Dropping it without spawning frees the slot.
#[derive(Debug)]
pub struct Reservation {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl WorkerPool {
    pub fn new(size: usize, queue_capacity: usize) -> Self {
        let size = size.max(1);
        Self {
            slots: Arc::new(Semaphore::new(size)),
            size,
            capacity: size + queue_capacity,
            in_flight: Arc::new(AtomicUsize::new(0)),
            tracker: TaskTracker::new(),
            stop_queued: CancellationToken::new(),
            abort: CancellationToken::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Jobs running or waiting for a slot.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Jobs currently holding a slot.
    pub fn running(&self) -> usize {
        self.size - self.slots.available_permits()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.tracker.is_closed()
    }

    /// Claim room for one job.
    pub fn reserve(&self) -> Result<Reservation, PoolError> {
        if self.tracker.is_closed() {
            return Err(PoolError::ShuttingDown);
        }
        let claimed = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.capacity).then_some(n + 1)
            });
        match claimed {
            Ok(_) => Ok(Reservation {
                in_flight: Arc::clone(&self.in_flight),
            }),
            Err(_) => Err(PoolError::Busy {
                capacity: self.capacity,
            }),
        }
    }

    /// Run `job` in a slot. Returns immediately.
    ///
    /// `on_cancel` runs instead of (or after interrupting) `job` when the
    /// pool shuts down before the job completes.
    pub fn spawn<F, C>(&self, reservation: Reservation, span: tracing::Span, job: F, on_cancel: C)
    where
        F: Future<Output = ()> + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        let slots = Arc::clone(&self.slots);
        let stop_queued = self.stop_queued.clone();
        let abort = self.abort.clone();

        self.tracker.spawn(
            async move {
                let _reservation = reservation;

                let _slot = tokio::select! {
                    biased;
                    _ = stop_queued.cancelled() => {
                        tracing::warn!("Queued job cancelled by shutdown");
                        on_cancel();
                        return;
                    }
                    slot = slots.acquire_owned() => match slot {
                        Ok(slot) => slot,
                        Err(_) => {
                            on_cancel();
                            return;
                        }
                    },
                };

                tokio::select! {
                    biased;
                    _ = abort.cancelled() => {
                        tracing::warn!("Running job dropped after shutdown timeout");
                        on_cancel();
                    }
                    _ = job => {}
                }
            }
            .instrument(span),
        );
    }

    /// Stop accepting work and wait for running jobs.
    ///
    /// Returns `true` when every job finished within `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.tracker.close();
        self.stop_queued.cancel();
        tracing::info!(running = self.running(), "Draining worker pool");

        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_ok() {
            tracing::info!("Worker pool drained");
            return true;
        }

        tracing::warn!(
            timeout_secs = timeout.as_secs(),
            remaining = self.in_flight(),
            "Worker pool drain timed out, dropping remaining jobs"
        );
        self.abort.cancel();
        self.tracker.wait().await;
        false
    }
}
