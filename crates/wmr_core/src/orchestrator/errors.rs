//! Error types for job execution and scheduling.

use std::path::PathBuf;

use thiserror::Error;

use crate::backend::BackendError;
use crate::video::VideoError;

/// Why a job failed. Recorded on the job and carried by its terminal event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// Source missing or unreadable.
    #[error("Cannot read video {}: {message}", .path.display())]
    UnreadableVideo { path: PathBuf, message: String },

    /// The backend cannot run at all. Aborts the batch.
    #[error("Inpainting backend unavailable: {message}")]
    BackendUnavailable { message: String },

    /// The backend failed on this video.
    #[error("Inference failed: {message}")]
    Inference { message: String },

    /// Destination not writable.
    #[error("Cannot write {}: {message}", .path.display())]
    DestinationWrite { path: PathBuf, message: String },

    /// Another job already wrote this destination.
    #[error("Destination {} was already written by an earlier job", .path.display())]
    DestinationCollision { path: PathBuf },
}

impl JobError {
    /// Create an unreadable-video error.
    pub fn unreadable_video(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::UnreadableVideo {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a destination write error.
    pub fn destination_write(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::DestinationWrite {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether the remaining jobs of the batch should be left unprocessed.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. })
    }

    /// Map a backend error. `Cancelled` has no job error equivalent.
    pub fn from_backend(error: BackendError) -> Option<Self> {
        let mapped = match error {
            BackendError::Unavailable { backend, message } => Self::BackendUnavailable {
                message: format!("{}: {}", backend, message),
            },
            BackendError::Inference { message } => Self::Inference { message },
            BackendError::DestinationWrite { path, message } => {
                Self::DestinationWrite { path, message }
            }
            BackendError::Io { operation, source } => Self::Inference {
                message: format!("I/O error in {}: {}", operation, source),
            },
            BackendError::Cancelled => return None,
        };
        Some(mapped)
    }
}

impl From<VideoError> for JobError {
    fn from(error: VideoError) -> Self {
        match error {
            VideoError::Unreadable { path, message } => Self::UnreadableVideo { path, message },
        }
    }
}

/// Error returned by scheduler control operations.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// `start()` while a batch is already running or cancelling.
    #[error("Scheduler is already running")]
    AlreadyRunning,

    /// The background thread could not be spawned.
    #[error("Failed to start scheduler thread: {0}")]
    Spawn(#[from] std::io::Error),
}
