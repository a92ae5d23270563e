//! Job types and data structures.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Video;
use crate::timeline::ZoneTimeline;

/// Unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a fresh random ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell jobs apart in logs.
        let s = self.0.simple().to_string();
        f.write_str(&s[..8])
    }
}

/// Status of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum JobStatus {
    /// Waiting in the queue.
    #[default]
    Queued,
    /// Currently being processed by the worker.
    Running,
    /// Output written and verified.
    Succeeded,
    /// Failed with a reason.
    Failed(String),
    /// Cancelled before or during processing.
    Cancelled,
}

impl JobStatus {
    /// Get display string for UI.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "Queued",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed(_) => "Failed",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Whether the job has reached a final state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_) | Self::Cancelled)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "Failed: {}", reason),
            other => f.write_str(other.as_str()),
        }
    }
}

/// One video's processing request.
///
/// The timeline is a snapshot taken at enqueue time; later edits to the
/// live timeline do not reach a queued or running job.
#[derive(Debug, Clone)]
pub struct Job {
    /// Unique job identifier.
    pub id: JobId,
    /// Source video (shared, read-only).
    pub video: Arc<Video>,
    /// Zone timeline snapshot.
    pub timeline: ZoneTimeline,
    /// Where the cleaned video is written.
    pub destination: PathBuf,
    /// Current status.
    pub status: JobStatus,
}

impl Job {
    /// Create a queued job, copying `timeline`.
    pub fn new(video: Arc<Video>, timeline: &ZoneTimeline, destination: impl Into<PathBuf>) -> Self {
        Self {
            id: JobId::new(),
            video,
            timeline: timeline.clone(),
            destination: destination.into(),
            status: JobStatus::Queued,
        }
    }

    /// Display name (source file name).
    pub fn name(&self) -> String {
        self.video.file_name()
    }

    /// Lightweight record for status tracking.
    pub fn record(&self) -> JobRecord {
        JobRecord {
            id: self.id,
            name: self.name(),
            source: self.video.path.clone(),
            destination: self.destination.clone(),
            status: self.status.clone(),
        }
    }
}

/// Status snapshot of a job kept by the scheduler after it leaves the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub name: String,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub status: JobStatus,
}

/// Output path for a cleaned video: `{output_dir}/clean_{file_name}`.
pub fn clean_output_path(output_dir: &Path, source: &Path) -> PathBuf {
    let file_name = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "output.mp4".to_string());
    output_dir.join(format!("clean_{}", file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Zone;

    #[test]
    fn job_snapshots_timeline() {
        let video = Arc::new(Video::new("/v/a.mp4", 100, 25.0, 320, 240));
        let mut live = ZoneTimeline::for_video(&video);
        live.set(0, vec![Zone::new(0, 0, 10, 10).unwrap()]).unwrap();

        let job = Job::new(video.clone(), &live, "/out/clean_a.mp4");
        live.set(0, vec![]).unwrap();
        live.set(50, vec![Zone::new(5, 5, 20, 20).unwrap()]).unwrap();

        assert_eq!(job.timeline.keyframe_indices(), vec![0]);
        assert_eq!(job.timeline.resolve(60).len(), 1);
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.name(), "a.mp4");
    }

    #[test]
    fn status_display() {
        assert_eq!(JobStatus::Succeeded.to_string(), "Succeeded");
        assert_eq!(
            JobStatus::Failed("out of memory".into()).to_string(),
            "Failed: out of memory"
        );
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }

    #[test]
    fn output_naming() {
        assert_eq!(
            clean_output_path(Path::new("/out"), Path::new("/videos/movie.mp4")),
            PathBuf::from("/out/clean_movie.mp4")
        );
    }

    #[test]
    fn job_ids_are_unique() {
        assert_ne!(JobId::new(), JobId::new());
        assert_eq!(JobId::new().to_string().len(), 8);
    }
}
