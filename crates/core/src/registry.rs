//! In-memory job registry.
//!
//! [`JobRegistry`] is the single synchronized table of per-job mutable state
//! (logs, progress, pages, status). Every other component goes through its
//! methods; the map itself is never exposed.
//!
//! One coarse lock guards all jobs. Job counts are small and every operation
//! is O(1) amortised (log eviction pops from the front of a ring buffer), so
//! the lock is never held for long. Each job also owns a
//! [`tokio::sync::Notify`] that is signalled after every mutation so stream
//! publishers can wake up without busy-polling.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Notify;

use crate::error::CoreError;
use crate::job::{DeviceClass, JobStatus, LogEntry, LogLevel};
use crate::progress::PageProgress;
use crate::types::{JobId, Timestamp};

/// Default number of log entries retained per job.
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// Static facts about a job, recorded at admission.
#[derive(Debug, Clone, Serialize)]
pub struct JobMeta {
    pub input_files: Vec<String>,
    pub device: DeviceClass,
    pub translate: bool,
}

/// Consistent point-in-time view of one job.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: f32,
    pub current_page: Option<u32>,
    pub total_page: Option<u32>,
    pub logs: Vec<LogEntry>,
    pub input_files: Vec<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Changes since a given log sequence number, taken under one lock.
#[derive(Debug, Clone)]
pub struct JobDelta {
    pub status: JobStatus,
    pub progress: f32,
    pub current_page: Option<u32>,
    pub total_page: Option<u32>,
    /// Entries with `seq` greater than the requested cursor, in order.
    pub logs: Vec<LogEntry>,
}

/// Row used when listing jobs.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: f32,
    pub input_count: usize,
    pub created_at: Timestamp,
}

struct JobRecord {
    meta: JobMeta,
    status: JobStatus,
    progress: f32,
    current_page: Option<u32>,
    total_page: Option<u32>,
    logs: VecDeque<LogEntry>,
    next_seq: u64,
    created_at: Timestamp,
    updated_at: Timestamp,
    changed: Arc<Notify>,
}

impl JobRecord {
    fn new(meta: JobMeta) -> Self {
        let now = Utc::now();
        Self {
            meta,
            status: JobStatus::Running,
            progress: 0.0,
            current_page: None,
            total_page: None,
            logs: VecDeque::new(),
            next_seq: 1,
            created_at: now,
            updated_at: now,
            changed: Arc::new(Notify::new()),
        }
    }

    /// Raise progress; never lowers it and never touches a finished job.
    fn raise_progress(&mut self, progress: f32) {
        if self.status.is_terminal() || !progress.is_finite() {
            return;
        }
        let clamped = progress.clamp(0.0, 100.0);
        if clamped > self.progress {
            self.progress = clamped;
        }
    }
}

/// Thread-safe store of per-job state.
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, JobRecord>>,
    log_capacity: usize,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl JobRegistry {
    /// Create a registry that keeps at most `log_capacity` entries per job.
    pub fn new(log_capacity: usize) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            log_capacity: log_capacity.max(1),
        }
    }

    pub fn log_capacity(&self) -> usize {
        self.log_capacity
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, JobRecord>> {
        // A panic while holding the lock leaves plain data behind; keep serving it.
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against one job's record and signal its observers afterwards.
    fn mutate<T>(
        &self,
        id: &JobId,
        f: impl FnOnce(&mut JobRecord) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let (result, changed) = {
            let mut jobs = self.lock();
            let record = jobs.get_mut(id).ok_or_else(|| CoreError::job_not_found(id))?;
            let result = f(record)?;
            record.updated_at = Utc::now();
            (result, Arc::clone(&record.changed))
        };
        changed.notify_waiters();
        Ok(result)
    }

    /// Register a new job in the `Running` state.
    pub fn create_job(&self, id: JobId, meta: JobMeta) -> Result<(), CoreError> {
        let mut jobs = self.lock();
        if jobs.contains_key(&id) {
            return Err(CoreError::Conflict(format!("Job {id} already exists")));
        }
        jobs.insert(id, JobRecord::new(meta));
        Ok(())
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.lock().contains_key(id)
    }

    /// Append a log entry and optionally raise the job's progress.
    ///
    /// Returns the sequence number assigned to the entry. When the log is
    /// at capacity the oldest entry is evicted.
    pub fn append(
        &self,
        id: &JobId,
        message: impl Into<String>,
        level: LogLevel,
        progress: Option<f32>,
    ) -> Result<u64, CoreError> {
        let message = message.into();
        let capacity = self.log_capacity;
        self.mutate(id, move |record| {
            let seq = record.next_seq;
            record.next_seq += 1;
            while record.logs.len() >= capacity {
                record.logs.pop_front();
            }
            record.logs.push_back(LogEntry {
                seq,
                timestamp: Utc::now(),
                message,
                level,
            });
            if let Some(p) = progress {
                record.raise_progress(p);
            }
            Ok(seq)
        })
    }

    pub fn set_progress(&self, id: &JobId, progress: f32) -> Result<(), CoreError> {
        self.mutate(id, |record| {
            record.raise_progress(progress);
            Ok(())
        })
    }

    /// Record the page counter of the file currently being analysed.
    pub fn set_pages(&self, id: &JobId, page: Option<PageProgress>) -> Result<(), CoreError> {
        self.mutate(id, |record| {
            record.current_page = page.map(|p| p.current);
            record.total_page = page.map(|p| p.total);
            Ok(())
        })
    }

    /// Move a job to a terminal status.
    ///
    /// Only `Running -> Complete` and `Running -> Error` are accepted.
    /// `Complete` pins progress at 100.
    pub fn set_status(&self, id: &JobId, status: JobStatus) -> Result<(), CoreError> {
        self.mutate(id, |record| {
            if !record.status.can_transition_to(status) {
                return Err(CoreError::Conflict(format!(
                    "Job {id} cannot move from {} to {status}",
                    record.status
                )));
            }
            if status == JobStatus::Complete {
                record.progress = 100.0;
            }
            record.status = status;
            Ok(())
        })
    }

    /// Full point-in-time view, or `None` for unknown jobs.
    pub fn snapshot(&self, id: &JobId) -> Option<JobSnapshot> {
        let jobs = self.lock();
        let record = jobs.get(id)?;
        Some(JobSnapshot {
            job_id: id.clone(),
            status: record.status,
            progress: record.progress,
            current_page: record.current_page,
            total_page: record.total_page,
            logs: record.logs.iter().cloned().collect(),
            input_files: record.meta.input_files.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    /// Logs appended after `after_seq` plus the current scalar state.
    pub fn delta(&self, id: &JobId, after_seq: u64) -> Option<JobDelta> {
        let jobs = self.lock();
        let record = jobs.get(id)?;
        // Entries are in seq order, so skip from the front.
        let logs = record
            .logs
            .iter()
            .skip_while(|entry| entry.seq <= after_seq)
            .cloned()
            .collect();
        Some(JobDelta {
            status: record.status,
            progress: record.progress,
            current_page: record.current_page,
            total_page: record.total_page,
            logs,
        })
    }

    /// Change notifier for one job.
    ///
    /// Futures created with [`Notify::notified`] before a mutation are woken
    /// by it, even if they have not been polled yet.
    pub fn watch(&self, id: &JobId) -> Option<Arc<Notify>> {
        self.lock().get(id).map(|record| Arc::clone(&record.changed))
    }

    pub fn meta(&self, id: &JobId) -> Option<JobMeta> {
        self.lock().get(id).map(|record| record.meta.clone())
    }

    /// All jobs, newest first.
    pub fn list(&self) -> Vec<JobSummary> {
        let jobs = self.lock();
        let mut rows: Vec<JobSummary> = jobs
            .iter()
            .map(|(id, record)| JobSummary {
                job_id: id.clone(),
                status: record.status,
                progress: record.progress,
                input_count: record.meta.input_files.len(),
                created_at: record.created_at,
            })
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.job_id.cmp(&b.job_id)));
        rows
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
