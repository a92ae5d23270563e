//! Backend error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error raised by an inpainting backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The engine cannot run at all; retrying other videos is pointless.
    #[error("Backend '{backend}' unavailable: {message}")]
    Unavailable { backend: String, message: String },

    /// The engine ran but failed on this video.
    #[error("Inference failed: {message}")]
    Inference { message: String },

    /// Output could not be written.
    #[error("Cannot write {}: {message}", .path.display())]
    DestinationWrite { path: PathBuf, message: String },

    /// Stopped because cancellation was requested.
    #[error("Processing cancelled")]
    Cancelled,

    /// File I/O error.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },
}

impl BackendError {
    /// Create an unavailable error.
    pub fn unavailable(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create an inference error.
    pub fn inference(message: impl Into<String>) -> Self {
        Self::Inference {
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

    /// Create an I/O error.
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
