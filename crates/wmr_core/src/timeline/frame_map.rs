//! Fully resolved per-frame zone data handed to the inpainting backend.

use serde::Serialize;

use crate::models::{FrameBounds, Zone};

use super::zone_timeline::ZoneTimeline;

/// Zones for every frame of a video, resolved up front.
///
/// Equivalent to calling [`ZoneTimeline::resolve`] for each frame index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameZoneMap {
    bounds: FrameBounds,
    frames: Vec<Vec<Zone>>,
}

impl FrameZoneMap {
    /// Resolve `timeline` for frames `0..frame_count`.
    pub fn resolve(timeline: &ZoneTimeline, frame_count: u32) -> Self {
        let frames = (0..frame_count)
            .map(|frame| timeline.resolve(frame).to_vec())
            .collect();
        Self {
            bounds: timeline.bounds(),
            frames,
        }
    }

    /// Frame dimensions the zones were validated against.
    pub fn bounds(&self) -> FrameBounds {
        self.bounds
    }

    /// Number of frames covered.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Zones for one frame (empty past the end).
    pub fn zones_at(&self, frame: u32) -> &[Zone] {
        self.frames
            .get(frame as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Iterate `(frame_index, zones)` in order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[Zone])> {
        self.frames
            .iter()
            .enumerate()
            .map(|(i, zones)| (i as u32, zones.as_slice()))
    }

    /// Number of frames with at least one zone.
    pub fn active_frames(&self) -> usize {
        self.frames.iter().filter(|z| !z.is_empty()).count()
    }
}
