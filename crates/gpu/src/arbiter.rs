//! GPU permit and memory headroom arbitration.
//!
//! The analysis tool and the LLM service are independent processes that
//! both allocate accelerator memory. [`GpuArbiter`] is the only point where
//! they are coordinated:
//!
//! - [`GpuArbiter::acquire`] hands out a single-slot [`GpuPermit`], so at
//!   most one job does GPU-class work at a time.
//! - [`GpuArbiter::wait_for_headroom`] evicts cached LLM weights and polls
//!   free memory until the requested amount is available or a deadline
//!   passes.
//!
//! Memory is an external resource with no lock; the headroom loop is a
//! cooperative best effort, not a guarantee.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

use crate::error::GpuError;
use crate::evictor::ModelEvictor;
use crate::probe::{MemoryInfo, MemoryProbe};

/// Timing of the headroom loop.
#[derive(Debug, Clone, Copy)]
pub struct HeadroomConfig {
    /// Interval between free-memory queries.
    pub poll_interval: Duration,
    /// Interval between re-evictions and status reports while waiting.
    pub evict_interval: Duration,
}

impl Default for HeadroomConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            evict_interval: Duration::from_secs(5),
        }
    }
}

/// Exclusive right to use the accelerator.
///
/// Released on drop, so every exit path of the holder gives it back.
#[derive(Debug)]
pub struct GpuPermit {
    _permit: OwnedSemaphorePermit,
    acquired_at: Instant,
}

impl GpuPermit {
    /// How long the permit has been held.
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }

    /// Give the permit back explicitly.
    pub fn release(self) {
        tracing::debug!(held_ms = self.held_for().as_millis() as u64, "GPU permit released");
    }
}

/// Serializes GPU-class work and reclaims accelerator memory.
#[derive(Clone)]
pub struct GpuArbiter {
    permit: Arc<Semaphore>,
    probe: Arc<dyn MemoryProbe>,
    evictor: Arc<dyn ModelEvictor>,
    config: HeadroomConfig,
}

impl GpuArbiter {
    pub fn new(
        probe: Arc<dyn MemoryProbe>,
        evictor: Arc<dyn ModelEvictor>,
        config: HeadroomConfig,
    ) -> Self {
        Self {
            permit: Arc::new(Semaphore::new(1)),
            probe,
            evictor,
            config,
        }
    }

    /// Wait up to `timeout` for the GPU permit.
    pub async fn acquire(&self, timeout: Duration) -> Result<GpuPermit, GpuError> {
        let started = Instant::now();
        match tokio::time::timeout(timeout, Arc::clone(&self.permit).acquire_owned()).await {
            Ok(Ok(permit)) => {
                tracing::debug!(
                    waited_ms = started.elapsed().as_millis() as u64,
                    "GPU permit acquired"
                );
                Ok(GpuPermit {
                    _permit: permit,
                    acquired_at: Instant::now(),
                })
            }
            Ok(Err(_)) => Err(GpuError::Closed),
            Err(_) => Err(GpuError::ResourceTimeout {
                resource: "GPU permit",
                waited: timeout,
            }),
        }
    }

    /// Whether some job currently holds the permit.
    pub fn is_busy(&self) -> bool {
        self.permit.available_permits() == 0
    }

    /// Current accelerator memory.
    pub fn memory_info(&self) -> MemoryInfo {
        self.probe.memory_info()
    }

    /// Ask the LLM service to drop its cached weights.
    pub async fn evict(&self) -> usize {
        self.evictor.evict_models().await
    }

    /// Wait until `required` bytes are free, evicting LLM weights meanwhile.
    ///
    /// Evicts on entry, then polls every `poll_interval`. Every
    /// `evict_interval` of waiting it evicts again (a model may have been
    /// reloaded) and calls `on_wait` with the latest figures. Returns `true`
    /// once enough memory is free or no accelerator can be queried, `false`
    /// when `timeout` elapses.
    pub async fn wait_for_headroom(
        &self,
        required: u64,
        timeout: Duration,
        mut on_wait: impl FnMut(MemoryInfo, Duration),
    ) -> bool {
        self.evict().await;

        let started = Instant::now();
        let deadline = started + timeout;
        let mut last_evict = started;

        loop {
            let info = self.probe.memory_info();
            if info.is_unconstrained() {
                tracing::debug!("No accelerator memory figures, skipping headroom check");
                return true;
            }
            if info.free >= required {
                tracing::debug!(free = info.free, required, "GPU headroom available");
                return true;
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(
                    free = info.free,
                    total = info.total,
                    required,
                    "Timed out waiting for GPU headroom"
                );
                return false;
            }

            if now.duration_since(last_evict) >= self.config.evict_interval {
                self.evict().await;
                on_wait(info, now.duration_since(started));
                last_evict = now;
            }

            let remaining = deadline.saturating_duration_since(now);
            tokio::time::sleep(self.config.poll_interval.min(remaining)).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
