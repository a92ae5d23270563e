//! Keyframe storage and per-frame zone resolution.

use std::collections::BTreeMap;

use crate::models::{FrameBounds, Video, Zone};

use super::errors::{TimelineError, TimelineResult};

/// Ordered mapping from frame index to the zones marked at that frame.
///
/// Resolution is a step function: a frame gets the zones of the greatest
/// keyframe at or before it, or nothing if it precedes every keyframe.
/// An empty keyframe explicitly clears all zones from that frame onward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneTimeline {
    /// Frame dimensions zones are validated against.
    bounds: FrameBounds,
    /// Keyframes by frame index.
    keyframes: BTreeMap<u32, Vec<Zone>>,
}

impl ZoneTimeline {
    /// Create an empty timeline for frames of the given size.
    pub fn new(bounds: FrameBounds) -> Self {
        Self {
            bounds,
            keyframes: BTreeMap::new(),
        }
    }

    /// Create an empty timeline for a loaded video.
    pub fn for_video(video: &Video) -> Self {
        Self::new(video.bounds())
    }

    /// Frame dimensions this timeline validates against.
    pub fn bounds(&self) -> FrameBounds {
        self.bounds
    }

    /// Insert or replace the keyframe at `frame`.
    ///
    /// An empty `zones` list is an explicit clear. If any zone is out of
    /// bounds nothing is changed.
    pub fn set(&mut self, frame: u32, zones: Vec<Zone>) -> TimelineResult<()> {
        for zone in &zones {
            self.check(frame, zone)?;
        }
        self.keyframes.insert(frame, zones);
        Ok(())
    }

    /// Append a single zone to the keyframe at `frame`, creating it if needed.
    pub fn add_zone(&mut self, frame: u32, zone: Zone) -> TimelineResult<()> {
        self.check(frame, &zone)?;
        self.keyframes.entry(frame).or_default().push(zone);
        Ok(())
    }

    /// Delete the keyframe at exactly `frame`. Absent keyframes are ignored.
    pub fn remove(&mut self, frame: u32) -> Option<Vec<Zone>> {
        self.keyframes.remove(&frame)
    }

    /// Remove one zone of the keyframe at `frame` by position.
    ///
    /// A keyframe left without zones is deleted, so the previous keyframe
    /// applies again. Returns false if there was nothing to remove.
    pub fn remove_zone(&mut self, frame: u32, position: usize) -> bool {
        let Some(zones) = self.keyframes.get_mut(&frame) else {
            return false;
        };
        if position >= zones.len() {
            return false;
        }
        zones.remove(position);
        if zones.is_empty() {
            self.keyframes.remove(&frame);
        }
        true
    }

    /// Zones that apply at `frame`.
    pub fn resolve(&self, frame: u32) -> &[Zone] {
        self.keyframes
            .range(..=frame)
            .next_back()
            .map(|(_, zones)| zones.as_slice())
            .unwrap_or(&[])
    }

    /// Zones stored at exactly `frame`, if it is a keyframe.
    pub fn get(&self, frame: u32) -> Option<&[Zone]> {
        self.keyframes.get(&frame).map(Vec::as_slice)
    }

    /// Sorted keyframe indices.
    pub fn keyframe_indices(&self) -> Vec<u32> {
        self.keyframes.keys().copied().collect()
    }

    /// Iterate keyframes in ascending frame order.
    pub fn keyframes(&self) -> impl Iterator<Item = (u32, &[Zone])> {
        self.keyframes
            .iter()
            .map(|(frame, zones)| (*frame, zones.as_slice()))
    }

    /// Number of keyframes.
    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    /// Total number of stored zones across all keyframes.
    pub fn zone_count(&self) -> usize {
        self.keyframes.values().map(Vec::len).sum()
    }

    /// Number of zones that apply at `frame`.
    pub fn zone_count_at(&self, frame: u32) -> usize {
        self.resolve(frame).len()
    }

    /// Remove every keyframe.
    pub fn clear(&mut self) {
        self.keyframes.clear();
    }

    /// Human-readable listing of all keyframes.
    pub fn summary(&self) -> String {
        if self.keyframes.is_empty() {
            return "No zones defined".to_string();
        }

        let mut lines = Vec::new();
        for (frame, zones) in &self.keyframes {
            lines.push(format!("Frame {}:", frame));
            if zones.is_empty() {
                lines.push("  (cleared)".to_string());
            }
            for (i, zone) in zones.iter().enumerate() {
                lines.push(format!("  Zone {}: {}", i + 1, zone));
            }
        }
        lines.join("\n")
    }

    fn check(&self, frame: u32, zone: &Zone) -> TimelineResult<()> {
        zone.validate_within(self.bounds)
            .map_err(|source| TimelineError::invalid_zone(frame, source))
    }
}
