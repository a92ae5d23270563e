//! Source video metadata.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::zone::FrameBounds;

/// Read-only metadata for an opened video.
///
/// Owned by whoever opened it and shared with jobs behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    /// Path to the source file.
    pub path: PathBuf,
    /// Total number of frames.
    pub frame_count: u32,
    /// Frames per second.
    pub fps: f64,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
}

impl Video {
    pub fn new(path: impl Into<PathBuf>, frame_count: u32, fps: f64, width: u32, height: u32) -> Self {
        Self {
            path: path.into(),
            frame_count,
            fps,
            width,
            height,
        }
    }

    /// Frame dimensions used to validate zones.
    pub fn bounds(&self) -> FrameBounds {
        FrameBounds::new(self.width, self.height)
    }

    /// Duration in seconds (0 when fps is unknown).
    pub fn duration_secs(&self) -> f64 {
        if self.fps > 0.0 {
            self.frame_count as f64 / self.fps
        } else {
            0.0
        }
    }

    /// Clamp a frame index to the valid range `[0, frame_count - 1]`.
    pub fn clamp_frame(&self, frame: i64) -> u32 {
        let last = self.frame_count.saturating_sub(1) as i64;
        frame.clamp(0, last) as u32
    }

    /// Frame index shown at `seconds` into the video.
    pub fn frame_at_time(&self, seconds: f64) -> u32 {
        self.clamp_frame((seconds * self.fps).floor() as i64)
    }

    /// File name component of the path (e.g. `movie.mp4`).
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// File stem (e.g. `movie` for `movie.mp4`).
    pub fn base_name(&self) -> String {
        base_name(&self.path)
    }

    /// One-line description: `1920x1080 | 29.97 fps | 1800 frames`.
    pub fn info_string(&self) -> String {
        format!(
            "{}x{} | {:.2} fps | {} frames",
            self.width, self.height, self.fps, self.frame_count
        )
    }
}

pub(crate) fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
