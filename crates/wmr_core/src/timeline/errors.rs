//! Error types for timeline editing and persistence.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::ZoneError;

/// Errors raised while editing, loading or saving a zone timeline.
#[derive(Error, Debug)]
pub enum TimelineError {
    /// A zone violates the ordering or bounds invariants.
    #[error("Invalid zone at frame {frame}: {source}")]
    InvalidZone {
        frame: u32,
        #[source]
        source: ZoneError,
    },

    /// Persisted timeline data is malformed.
    #[error("Invalid timeline format: {message}")]
    InvalidFormat { message: String },

    /// Reading or writing a keyframe file failed.
    #[error("Failed to {operation} keyframe file {}: {source}", .path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl TimelineError {
    /// Create an invalid zone error.
    pub fn invalid_zone(frame: u32, source: ZoneError) -> Self {
        Self::InvalidZone { frame, source }
    }

    /// Create an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Create an I/O error with context.
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Result type for timeline operations.
pub type TimelineResult<T> = Result<T, TimelineError>;
