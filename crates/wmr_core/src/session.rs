//! Editor session: the state a front-end drives.
//!
//! The session owns the open video, its live zone timeline and the batch
//! scheduler. Front-ends never hold the timeline themselves; every edit
//! goes through a session method, and enqueuing snapshots the timeline so
//! editing can continue while a batch runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbImage;
use thiserror::Error;

use crate::config::Settings;
use crate::jobs::{clean_output_path, JobId};
use crate::models::{Video, Zone};
use crate::orchestrator::JobScheduler;
use crate::timeline::{self, TimelineError, ZoneTimeline};
use crate::video::{VideoError, VideoSource};

/// Errors from session operations.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No video is open")]
    NoVideo,

    #[error(transparent)]
    Video(#[from] VideoError),

    #[error(transparent)]
    Timeline(#[from] TimelineError),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

struct OpenVideo {
    video: Arc<Video>,
    timeline: ZoneTimeline,
    keyframe_path: PathBuf,
    dirty: bool,
}

/// Front-end facing state: current video, live timeline, scheduler.
pub struct EditorSession {
    source: Arc<dyn VideoSource>,
    scheduler: JobScheduler,
    output_dir: PathBuf,
    keyframe_extension: String,
    current: Option<OpenVideo>,
}

impl EditorSession {
    pub fn new(
        source: Arc<dyn VideoSource>,
        scheduler: JobScheduler,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            scheduler,
            output_dir: output_dir.into(),
            keyframe_extension: timeline::DEFAULT_KEYFRAME_EXTENSION.to_string(),
            current: None,
        }
    }

    /// Session using the configured output folder and keyframe extension.
    pub fn from_settings(
        source: Arc<dyn VideoSource>,
        scheduler: JobScheduler,
        settings: &Settings,
    ) -> Self {
        let mut session = Self::new(source, scheduler, &settings.paths.output_folder);
        session.keyframe_extension = settings.timeline.keyframe_extension.clone();
        session
    }

    /// Write cleaned videos into `output_dir` instead.
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Open a video and load its keyframe file if one exists.
    ///
    /// Replaces the current video; unsaved edits are discarded.
    pub fn open_video(&mut self, path: &Path) -> SessionResult<Arc<Video>> {
        let (video, timeline, keyframe_path) = self.load(path)?;
        tracing::info!(
            "Opened {} ({} keyframes)",
            video.file_name(),
            timeline.len()
        );
        if let Some(previous) = self.current.take() {
            if previous.dirty {
                tracing::warn!(
                    "Discarding unsaved zones for {}",
                    previous.video.file_name()
                );
            }
        }
        self.current = Some(OpenVideo {
            video: Arc::clone(&video),
            timeline,
            keyframe_path,
            dirty: false,
        });
        Ok(video)
    }

    /// Close the current video, saving its keyframes first when `save` is set.
    pub fn close_video(&mut self, save: bool) -> SessionResult<()> {
        if save && self.current.is_some() {
            self.save_keyframes()?;
        }
        self.current = None;
        Ok(())
    }

    pub fn video(&self) -> Option<&Arc<Video>> {
        self.current.as_ref().map(|c| &c.video)
    }

    pub fn timeline(&self) -> Option<&ZoneTimeline> {
        self.current.as_ref().map(|c| &c.timeline)
    }

    /// Keyframe file the current timeline is saved to.
    pub fn keyframe_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|c| c.keyframe_path.as_path())
    }

    /// Whether the timeline changed since it was loaded or saved.
    pub fn is_dirty(&self) -> bool {
        self.current.as_ref().is_some_and(|c| c.dirty)
    }

    /// Zones in effect at `frame`.
    pub fn zones_at(&self, frame: u32) -> &[Zone] {
        self.current
            .as_ref()
            .map(|c| c.timeline.resolve(frame))
            .unwrap_or(&[])
    }

    pub fn set_keyframe(&mut self, frame: u32, zones: Vec<Zone>) -> SessionResult<()> {
        let current = self.current_mut()?;
        current.timeline.set(frame, zones)?;
        current.dirty = true;
        Ok(())
    }

    pub fn add_zone(&mut self, frame: u32, zone: Zone) -> SessionResult<()> {
        let current = self.current_mut()?;
        current.timeline.add_zone(frame, zone)?;
        current.dirty = true;
        Ok(())
    }

    /// Remove one zone from the keyframe at `frame`.
    pub fn remove_zone(&mut self, frame: u32, position: usize) -> SessionResult<bool> {
        let current = self.current_mut()?;
        let removed = current.timeline.remove_zone(frame, position);
        current.dirty |= removed;
        Ok(removed)
    }

    pub fn remove_keyframe(&mut self, frame: u32) -> SessionResult<Option<Vec<Zone>>> {
        let current = self.current_mut()?;
        let removed = current.timeline.remove(frame);
        current.dirty |= removed.is_some();
        Ok(removed)
    }

    pub fn clear_zones(&mut self) -> SessionResult<()> {
        let current = self.current_mut()?;
        if !current.timeline.is_empty() {
            current.timeline.clear();
            current.dirty = true;
        }
        Ok(())
    }

    /// Decode a frame of the current video for display.
    pub fn preview_frame(&self, frame: u32) -> SessionResult<RgbImage> {
        let current = self.current.as_ref().ok_or(SessionError::NoVideo)?;
        Ok(self.source.frame_at(&current.video, frame)?)
    }

    /// Write the timeline to its keyframe file.
    pub fn save_keyframes(&mut self) -> SessionResult<PathBuf> {
        let current = self.current_mut()?;
        timeline::save_to_file(&current.timeline, &current.keyframe_path)?;
        current.dirty = false;
        Ok(current.keyframe_path.clone())
    }

    /// Queue the current video with a snapshot of its timeline.
    pub fn enqueue_current(&self) -> SessionResult<JobId> {
        let current = self.current.as_ref().ok_or(SessionError::NoVideo)?;
        let destination = clean_output_path(&self.output_dir, &current.video.path);
        Ok(self
            .scheduler
            .enqueue(Arc::clone(&current.video), &current.timeline, destination))
    }

    /// Queue another video with whatever keyframe file it has on disk.
    pub fn enqueue_file(&self, path: &Path) -> SessionResult<JobId> {
        let (video, timeline, _) = self.load(path)?;
        if timeline.is_empty() {
            tracing::warn!("{} has no zones; output will match input", video.file_name());
        }
        let destination = clean_output_path(&self.output_dir, &video.path);
        Ok(self.scheduler.enqueue(video, &timeline, destination))
    }

    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn current_mut(&mut self) -> SessionResult<&mut OpenVideo> {
        self.current.as_mut().ok_or(SessionError::NoVideo)
    }

    fn load(&self, path: &Path) -> SessionResult<(Arc<Video>, ZoneTimeline, PathBuf)> {
        let video = Arc::new(self.source.open(path)?);
        let loaded = timeline::load_for_video(&video, &self.keyframe_extension)?;
        let (timeline, keyframe_path) = match loaded {
            Some(found) => found,
            None => (
                ZoneTimeline::for_video(&video),
                timeline::keyframe_path_for(&video.path, &self.keyframe_extension),
            ),
        };
        Ok((video, timeline, keyframe_path))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::jobs::JobStatus;
    use crate::orchestrator::fake_backend::FakeBackend;
    use crate::orchestrator::ProcessingWorker;
    use tempfile::{tempdir, TempDir};

    /// Reports fixed metadata for any existing file.
    struct StubSource;

    impl VideoSource for StubSource {
        fn open(&self, path: &Path) -> Result<Video, VideoError> {
            if !path.is_file() {
                return Err(VideoError::unreadable(path, "missing"));
            }
            Ok(Video::new(path, 100, 25.0, 320, 240))
        }

        fn frame_at(&self, video: &Video, _index: u32) -> Result<RgbImage, VideoError> {
            Ok(RgbImage::new(video.width, video.height))
        }
    }

    fn session(dir: &TempDir) -> EditorSession {
        let worker = ProcessingWorker::new(Arc::new(FakeBackend::new()), dir.path().join("work"));
        let (scheduler, _events) = JobScheduler::new(worker);
        EditorSession::new(Arc::new(StubSource), scheduler, dir.path().join("out"))
    }

    fn video_file(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, b"video").unwrap();
        path
    }

    #[test]
    fn edits_require_open_video() {
        let dir = tempdir().unwrap();
        let mut session = session(&dir);
        let zone = Zone::new(0, 0, 10, 10).unwrap();
        assert!(matches!(session.add_zone(0, zone), Err(SessionError::NoVideo)));
        assert!(matches!(session.enqueue_current(), Err(SessionError::NoVideo)));
        assert!(session.zones_at(5).is_empty());
    }

    #[test]
    fn edit_save_and_reopen() {
        let dir = tempdir().unwrap();
        let path = video_file(&dir, "movie.mp4");
        let mut session = session(&dir);

        session.open_video(&path).unwrap();
        session.add_zone(10, Zone::new(0, 0, 50, 20).unwrap()).unwrap();
        session.add_zone(10, Zone::new(60, 0, 90, 20).unwrap()).unwrap();
        session.set_keyframe(40, vec![]).unwrap();
        assert!(session.is_dirty());
        assert_eq!(session.zones_at(39).len(), 2);
        assert!(session.zones_at(40).is_empty());

        let saved = session.save_keyframes().unwrap();
        assert_eq!(saved, dir.path().join("movie_keyframes.json"));
        assert!(!session.is_dirty());

        session.close_video(false).unwrap();
        assert!(session.video().is_none());

        session.open_video(&path).unwrap();
        assert_eq!(session.timeline().unwrap().keyframe_indices(), vec![10, 40]);
        assert_eq!(session.keyframe_path(), Some(saved.as_path()));
    }

    #[test]
    fn invalid_zone_leaves_timeline_unchanged() {
        let dir = tempdir().unwrap();
        let path = video_file(&dir, "movie.mp4");
        let mut session = session(&dir);
        session.open_video(&path).unwrap();

        let too_wide = Zone::new(0, 0, 321, 10).unwrap();
        let err = session.set_keyframe(0, vec![too_wide]).unwrap_err();
        assert!(matches!(err, SessionError::Timeline(TimelineError::InvalidZone { .. })));
        assert!(session.timeline().unwrap().is_empty());
        assert!(!session.is_dirty());
    }

    #[test]
    fn remove_zone_drops_emptied_keyframe() {
        let dir = tempdir().unwrap();
        let path = video_file(&dir, "movie.mp4");
        let mut session = session(&dir);
        session.open_video(&path).unwrap();

        session.add_zone(0, Zone::new(0, 0, 10, 10).unwrap()).unwrap();
        session.add_zone(50, Zone::new(5, 5, 15, 15).unwrap()).unwrap();
        assert!(session.remove_zone(50, 0).unwrap());
        assert!(!session.remove_zone(50, 0).unwrap());
        assert_eq!(session.zones_at(60)[0], Zone::new(0, 0, 10, 10).unwrap());
    }

    #[test]
    fn enqueue_snapshots_and_names_output() {
        let dir = tempdir().unwrap();
        let path = video_file(&dir, "movie.mp4");
        let other = video_file(&dir, "other.mp4");
        let mut session = session(&dir);
        session.open_video(&path).unwrap();
        session.add_zone(0, Zone::new(0, 0, 10, 10).unwrap()).unwrap();

        let first = session.enqueue_current().unwrap();
        let second = session.enqueue_file(&other).unwrap();
        session.clear_zones().unwrap();

        let records = session.scheduler().statuses();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, first);
        assert_eq!(records[0].destination, dir.path().join("out").join("clean_movie.mp4"));
        assert_eq!(records[1].id, second);
        assert_eq!(records[1].status, JobStatus::Queued);

        session.scheduler().start().unwrap();
        session.scheduler().wait();
        assert_eq!(session.scheduler().status(first), Some(JobStatus::Succeeded));
    }

    #[test]
    fn preview_uses_video_source() {
        let dir = tempdir().unwrap();
        let path = video_file(&dir, "movie.mp4");
        let mut session = session(&dir);
        session.open_video(&path).unwrap();

        let frame = session.preview_frame(5000).unwrap();
        assert_eq!(frame.dimensions(), (320, 240));
    }
}
