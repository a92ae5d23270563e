//! Video metadata and preview frames.
//!
//! Decoding is delegated to a `VideoSource`; the default implementation
//! shells out to ffprobe/ffmpeg.

mod ffprobe;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::Video;

pub use ffprobe::{parse_ffprobe_json, FfprobeSource, DEFAULT_FPS};
pub use image::RgbImage;

/// Error opening or decoding a video.
#[derive(Error, Debug)]
pub enum VideoError {
    /// The file could not be opened or decoded.
    #[error("Cannot read video {}: {message}", .path.display())]
    Unreadable { path: PathBuf, message: String },
}

impl VideoError {
    /// Create an unreadable-video error.
    pub fn unreadable(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Unreadable {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for video operations.
pub type VideoResult<T> = Result<T, VideoError>;

/// Opens videos and decodes single frames for preview.
pub trait VideoSource: Send + Sync {
    /// Read metadata for the video at `path`.
    fn open(&self, path: &Path) -> VideoResult<Video>;

    /// Decode one frame. Indices past the end are clamped to the last frame.
    fn frame_at(&self, video: &Video, index: u32) -> VideoResult<RgbImage>;
}
