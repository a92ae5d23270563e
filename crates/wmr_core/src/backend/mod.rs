//! Inpainting backend contract.
//!
//! The scheduler hands one whole video to a backend per job together with
//! the fully resolved zones for every frame. The backend owns decoding,
//! inference and encoding; this crate only drives it and relays progress.

mod errors;
mod external;

use std::path::{Path, PathBuf};

use crate::models::Video;
use crate::orchestrator::CancelToken;
use crate::timeline::FrameZoneMap;

pub use errors::{BackendError, BackendResult};
pub use external::{find_program, ExternalBackend, DEFAULT_MASK_PADDING, PROGRESS_PREFIX};

/// Everything a backend needs to clean one video.
#[derive(Clone, Copy)]
pub struct BackendRequest<'a> {
    /// Source video.
    pub video: &'a Video,
    /// Where the cleaned video must be written.
    pub output_path: &'a Path,
    /// Zones for frames `0..frame_count`.
    pub frame_zone_map: &'a FrameZoneMap,
    /// Scratch directory private to this job.
    pub work_dir: &'a Path,
    /// Checked periodically; the backend should stop early once set.
    pub cancel: &'a CancelToken,
    /// Receives diagnostic output lines (not progress) as they appear.
    pub output: &'a dyn Fn(&str),
}

/// An inpainting engine.
///
/// Only the scheduler's worker thread calls `process_video`, one job at a
/// time, so implementations need not be reentrant.
pub trait InpaintBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Verify the engine can run at all (program installed, model present).
    fn check_ready(&self) -> BackendResult<()>;

    /// Clean one video.
    ///
    /// `progress` receives `(frames_completed, frames_total)`. Returns the
    /// path of the written output.
    fn process_video(
        &self,
        request: &BackendRequest<'_>,
        progress: &mut dyn FnMut(u64, u64),
    ) -> BackendResult<PathBuf>;
}
