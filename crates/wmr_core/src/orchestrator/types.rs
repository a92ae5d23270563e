//! Progress, outcomes and events exchanged between the worker thread and
//! the caller.

use std::path::PathBuf;

use serde::Serialize;

use crate::jobs::{JobId, JobStatus};

use super::errors::JobError;

/// Frame progress of the running job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobProgress {
    pub frames_completed: u64,
    /// Fixed for the lifetime of a job.
    pub frames_total: u64,
}

impl JobProgress {
    pub fn new(frames_completed: u64, frames_total: u64) -> Self {
        Self {
            frames_completed,
            frames_total,
        }
    }

    /// Completion in percent (100 for an empty video).
    pub fn percent(&self) -> f64 {
        if self.frames_total == 0 {
            100.0
        } else {
            self.frames_completed as f64 * 100.0 / self.frames_total as f64
        }
    }
}

/// Terminal result of running one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded { output: PathBuf },
    Failed(JobError),
    Cancelled,
}

impl JobOutcome {
    /// Status the job ends in.
    pub fn status(&self) -> JobStatus {
        match self {
            Self::Succeeded { .. } => JobStatus::Succeeded,
            Self::Failed(error) => JobStatus::Failed(error.to_string()),
            Self::Cancelled => JobStatus::Cancelled,
        }
    }

    pub fn error(&self) -> Option<&JobError> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SchedulerState {
    #[default]
    Idle,
    Running,
    Cancelling,
}

/// Event sent from the scheduler thread.
///
/// For any one job, `JobStarted` comes first, its `JobProgress` values
/// never decrease, and `JobFinished` is the last event mentioning it.
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    JobStarted {
        job_id: JobId,
        name: String,
    },
    JobProgress {
        job_id: JobId,
        progress: JobProgress,
    },
    BatchProgress {
        jobs_completed: usize,
        jobs_total: usize,
        current: Option<JobProgress>,
    },
    JobFinished {
        job_id: JobId,
        status: JobStatus,
        error: Option<JobError>,
    },
    /// A batch-fatal error stopped the batch; remaining jobs stay queued.
    BatchAborted {
        reason: String,
    },
    BatchFinished {
        succeeded: usize,
        failed: usize,
        cancelled: usize,
    },
}
