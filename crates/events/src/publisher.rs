use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use yomi_core::job::{JobStatus, LogLevel};
use yomi_core::registry::JobRegistry;
use yomi_core::types::{JobId, Timestamp};

/// Fallback wake-up interval when no change notification arrives.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// One message of a job's event stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JobEvent {
    Log {
        seq: u64,
        timestamp: Timestamp,
        level: LogLevel,
        message: String,
    },
    Progress {
        progress: f32,
        current_page: Option<u32>,
        total_page: Option<u32>,
    },
    /// Final message; nothing follows it.
    Status { status: JobStatus, progress: f32 },
}

impl JobEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobEvent::Status { .. })
    }
}

// ---------------------------------------------------------------------------
// JobEventPublisher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
struct ProgressState {
    progress: f32,
    current_page: Option<u32>,
    total_page: Option<u32>,
}

/// Diffs registry state for one observer of one job.
pub struct JobEventPublisher {
    registry: Arc<JobRegistry>,
    job_id: JobId,
    poll_interval: Duration,
    last_seq: u64,
    last_progress: Option<ProgressState>,
    finished: bool,
}

impl JobEventPublisher {
    /// Start following `job_id`, or `None` if the job is unknown.
    pub fn new(registry: Arc<JobRegistry>, job_id: JobId, poll_interval: Duration) -> Option<Self> {
        if !registry.contains(&job_id) {
            return None;
        }
        Some(Self {
            registry,
            job_id,
            poll_interval,
            last_seq: 0,
            last_progress: None,
            finished: false,
        })
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Everything that changed since the previous call, without waiting.
    ///
    /// Order within a batch: logs, then progress, then the terminal status.
    pub fn poll_events(&mut self) -> Vec<JobEvent> {
        if self.finished {
            return Vec::new();
        }
        let Some(delta) = self.registry.delta(&self.job_id, self.last_seq) else {
            tracing::debug!(job_id = %self.job_id, "Job left the registry, ending event stream");
            self.finished = true;
            return Vec::new();
        };

        let mut events: Vec<JobEvent> = Vec::with_capacity(delta.logs.len() + 2);
        for entry in delta.logs {
            self.last_seq = entry.seq;
            events.push(JobEvent::Log {
                seq: entry.seq,
                timestamp: entry.timestamp,
                level: entry.level,
                message: entry.message,
            });
        }

        let progress = ProgressState {
            progress: delta.progress,
            current_page: delta.current_page,
            total_page: delta.total_page,
        };
        if self.last_progress != Some(progress) {
            self.last_progress = Some(progress);
            events.push(JobEvent::Progress {
                progress: progress.progress,
                current_page: progress.current_page,
                total_page: progress.total_page,
            });
        }

        if delta.status.is_terminal() {
            self.finished = true;
            events.push(JobEvent::Status {
                status: delta.status,
                progress: delta.progress,
            });
        }
        events
    }

    /// Wait for the next non-empty batch.
    ///
    /// Returns `None` once the terminal status has been delivered.
    pub async fn next_batch(&mut self) -> Option<Vec<JobEvent>> {
        loop {
            if self.finished {
                return None;
            }
            let notify = self.registry.watch(&self.job_id)?;
            let notified = notify.notified();
            tokio::pin!(notified);
            // Register interest before diffing so a change in between is not lost.
            notified.as_mut().enable();

            let events = self.poll_events();
            if !events.is_empty() {
                return Some(events);
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Flatten into a stream of single events ending after the status.
    pub fn into_stream(self) -> impl Stream<Item = JobEvent> + Send {
        stream::unfold(self, |mut publisher| async move {
            let batch = publisher.next_batch().await?;
            Some((stream::iter(batch), publisher))
        })
        .flatten()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
