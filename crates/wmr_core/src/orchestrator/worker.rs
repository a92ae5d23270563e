//! Runs a single job against the inpainting backend.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::backend::{BackendError, BackendRequest, InpaintBackend};
use crate::config::Settings;
use crate::jobs::{Job, JobStatus};
use crate::logging::{JobLogger, LogConfig};
use crate::timeline::FrameZoneMap;

use super::cancel::CancelToken;
use super::errors::JobError;
use super::types::{JobOutcome, JobProgress};

/// Executes jobs one at a time.
///
/// The worker resolves the job's timeline for every frame, hands the whole
/// video to the backend once, and turns whatever comes back into a
/// terminal [`JobOutcome`].
pub struct ProcessingWorker {
    backend: Arc<dyn InpaintBackend>,
    /// Per-job scratch directories are created below this.
    work_root: PathBuf,
    /// Per-job log files go here when set.
    log_dir: Option<PathBuf>,
    log_config: LogConfig,
}

impl ProcessingWorker {
    pub fn new(backend: Arc<dyn InpaintBackend>, work_root: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            work_root: work_root.into(),
            log_dir: None,
            log_config: LogConfig::default(),
        }
    }

    /// Worker using the configured work root and per-job logs.
    pub fn from_settings(backend: Arc<dyn InpaintBackend>, settings: &Settings) -> Self {
        Self::new(backend, &settings.paths.work_root).with_job_logs(
            &settings.paths.logs_folder,
            LogConfig::from_settings(&settings.logging),
        )
    }

    /// Write a `{job_name}.log` per job into `log_dir`.
    pub fn with_job_logs(mut self, log_dir: impl Into<PathBuf>, config: LogConfig) -> Self {
        self.log_dir = Some(log_dir.into());
        self.log_config = config;
        self
    }

    pub fn backend(&self) -> &Arc<dyn InpaintBackend> {
        &self.backend
    }

    /// Run `job` to completion.
    ///
    /// `job.status` is updated along the way and holds the terminal status
    /// on return. `on_progress` sees `(frames_completed, frames_total)`
    /// values that never decrease; nothing is reported after cancellation
    /// is observed.
    pub fn run(
        &self,
        job: &mut Job,
        cancel: &CancelToken,
        on_progress: &mut dyn FnMut(JobProgress),
    ) -> JobOutcome {
        let outcome = self.execute(job, cancel, on_progress);
        job.status = outcome.status();
        outcome
    }

    fn execute(
        &self,
        job: &mut Job,
        cancel: &CancelToken,
        on_progress: &mut dyn FnMut(JobProgress),
    ) -> JobOutcome {
        if cancel.is_cancelled() {
            tracing::info!("Job {} cancelled before start", job.id);
            return JobOutcome::Cancelled;
        }

        if let Err(error) = preflight(job) {
            tracing::warn!("Job {} ({}) failed pre-flight: {}", job.id, job.name(), error);
            return JobOutcome::Failed(error);
        }

        job.status = JobStatus::Running;
        let logger = self.open_logger(job);
        let total = job.video.frame_count as u64;
        if let Some(ref l) = logger {
            l.phase(&format!("Cleaning {}", job.name()));
            l.info(&format!("Source: {}", job.video.path.display()));
            l.info(&format!("Video: {}", job.video.info_string()));
            l.info(&format!("Zones: {}", job.timeline.summary()));
            l.info(&format!("Output: {}", job.destination.display()));
        }

        let map = FrameZoneMap::resolve(&job.timeline, job.video.frame_count);
        let work_dir = self.work_root.join(format!("job_{}", job.id));

        let mut last = 0u64;
        on_progress(JobProgress::new(0, total));
        let mut report = |current: u64, _backend_total: u64| {
            if cancel.is_cancelled() {
                return;
            }
            let current = current.min(total);
            if current <= last {
                return;
            }
            last = current;
            if let Some(ref logger) = logger {
                logger.frame_progress(current, total);
            }
            on_progress(JobProgress::new(current, total));
        };

        if let Some(ref l) = logger {
            l.command(&format!(
                "{} ({} frames, {} with zones)",
                self.backend.name(),
                total,
                map.active_frames()
            ));
        }
        let output = |line: &str| {
            if let Some(ref l) = logger {
                l.output_line(line);
            }
        };
        let existing = FileStamp::of(&job.destination);
        let request = BackendRequest {
            video: &job.video,
            output_path: &job.destination,
            frame_zone_map: &map,
            work_dir: &work_dir,
            cancel,
            output: &output,
        };
        let result = self.backend.process_video(&request, &mut report);

        if work_dir.exists() {
            if let Err(e) = fs::remove_dir_all(&work_dir) {
                tracing::debug!("Could not remove {}: {}", work_dir.display(), e);
            }
        }

        if cancel.is_cancelled() || matches!(result, Err(BackendError::Cancelled)) {
            remove_partial_output(&job.destination, existing.as_ref());
            if let Some(ref l) = logger {
                l.warn("Cancelled");
            }
            tracing::info!("Job {} ({}) cancelled", job.id, job.name());
            return JobOutcome::Cancelled;
        }

        match result {
            Ok(output) if output.is_file() => {
                if last < total {
                    on_progress(JobProgress::new(total, total));
                }
                if let Some(ref l) = logger {
                    l.success(&format!("Wrote {}", output.display()));
                }
                tracing::info!("Job {} ({}) succeeded", job.id, job.name());
                JobOutcome::Succeeded { output }
            }
            Ok(output) => {
                let error = JobError::Inference {
                    message: format!("backend reported success but {} is missing", output.display()),
                };
                if let Some(ref l) = logger {
                    l.error(&error.to_string());
                }
                JobOutcome::Failed(error)
            }
            Err(backend_error) => {
                remove_partial_output(&job.destination, existing.as_ref());
                let error = JobError::from_backend(backend_error).unwrap_or(JobError::Inference {
                    message: "backend stopped without a result".to_string(),
                });
                if let Some(ref l) = logger {
                    l.error(&format!("Job failed: {}", error));
                    l.show_tail(self.backend.name());
                }
                tracing::warn!("Job {} ({}) failed: {}", job.id, job.name(), error);
                JobOutcome::Failed(error)
            }
        }
    }

    fn open_logger(&self, job: &Job) -> Option<JobLogger> {
        let dir = self.log_dir.as_ref()?;
        match JobLogger::new(job.name(), dir, self.log_config.clone()) {
            Ok(logger) => Some(logger),
            Err(e) => {
                tracing::warn!("Failed to create job log in {}: {}", dir.display(), e);
                None
            }
        }
    }
}

/// Checks that need no backend: readable source, creatable destination.
fn preflight(job: &Job) -> Result<(), JobError> {
    let source = &job.video.path;
    if !source.is_file() {
        return Err(JobError::unreadable_video(source, "file does not exist"));
    }
    File::open(source).map_err(|e| JobError::unreadable_video(source, e.to_string()))?;

    if let Some(parent) = job.destination.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| JobError::destination_write(&job.destination, e.to_string()))?;
        }
    }
    Ok(())
}

/// Size and modification time of a file at the destination.
#[derive(Debug, PartialEq, Eq)]
struct FileStamp {
    len: u64,
    modified: Option<SystemTime>,
}

impl FileStamp {
    fn of(path: &Path) -> Option<Self> {
        let meta = fs::metadata(path).ok()?;
        meta.is_file().then(|| Self {
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

/// Delete the destination if the backend created or changed it.
///
/// `before` is the stamp taken before the backend ran; an untouched file
/// from an earlier run is left alone.
fn remove_partial_output(path: &Path, before: Option<&FileStamp>) {
    let Some(after) = FileStamp::of(path) else {
        return;
    };
    if before == Some(&after) {
        tracing::debug!("Keeping {}; not written by this job", path.display());
        return;
    }
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!("Removed partial output {}", path.display()),
        Err(e) => tracing::warn!("Could not remove partial output {}: {}", path.display(), e),
    }
}
