//! Zone timelines: keyframe storage, per-frame resolution and persistence.
//!
//! A timeline stores sparse "zones at frame N" keyframes and resolves any
//! frame to the zone list of the nearest keyframe at or before it. Zones are
//! held until superseded; coordinates are never blended between keyframes.
//!
//! # Example
//!
//! ```
//! use wmr_core::models::{FrameBounds, Zone};
//! use wmr_core::timeline::ZoneTimeline;
//!
//! let mut timeline = ZoneTimeline::new(FrameBounds::new(640, 360));
//! timeline.set(0, vec![Zone::new(100, 100, 300, 200).unwrap()]).unwrap();
//! timeline.set(300, Vec::new()).unwrap();
//!
//! assert_eq!(timeline.resolve(299).len(), 1);
//! assert!(timeline.resolve(300).is_empty());
//! ```

mod errors;
mod frame_map;
mod persistence;
mod zone_timeline;

pub use errors::{TimelineError, TimelineResult};
pub use frame_map::FrameZoneMap;
pub use persistence::{
    keyframe_path_for, legacy_keyframe_path_for, load, load_for_video, load_from_file,
    load_with_bounds, save, save_pretty, save_to_file, DEFAULT_KEYFRAME_EXTENSION,
};
pub use zone_timeline::ZoneTimeline;
