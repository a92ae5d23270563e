//! Keyframe file persistence.
//!
//! Format: a JSON object whose keys are decimal frame indices and whose
//! values are lists of `[x1, y1, x2, y2]` arrays:
//!
//! ```text
//! {"0": [[100,100,300,200]], "150": [[110,105,310,205]], "300": []}
//! ```
//!
//! Key order carries no meaning; ordering is rebuilt on load.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde_json::{Map, Value};

use crate::models::{FrameBounds, Video, Zone};

use super::errors::{TimelineError, TimelineResult};
use super::zone_timeline::ZoneTimeline;

/// Default keyframe file extension.
pub const DEFAULT_KEYFRAME_EXTENSION: &str = "json";

/// Serialize a timeline to compact JSON.
pub fn save(timeline: &ZoneTimeline) -> String {
    to_value(timeline).to_string()
}

/// Serialize a timeline to indented JSON.
pub fn save_pretty(timeline: &ZoneTimeline) -> String {
    format!("{:#}", to_value(timeline))
}

/// Parse a timeline and validate it against `video`'s resolution.
pub fn load(text: &str, video: &Video) -> TimelineResult<ZoneTimeline> {
    load_with_bounds(text, video.bounds())
}

/// Parse a timeline and validate it against explicit frame bounds.
///
/// The whole document is rejected on the first error.
pub fn load_with_bounds(text: &str, bounds: FrameBounds) -> TimelineResult<ZoneTimeline> {
    let RawDocument(entries) = serde_json::from_str(text)
        .map_err(|e| TimelineError::invalid_format(e.to_string()))?;

    let mut timeline = ZoneTimeline::new(bounds);
    for (key, zones_value) in &entries {
        let frame = parse_frame_key(key)?;
        if timeline.get(frame).is_some() {
            return Err(TimelineError::invalid_format(format!(
                "frame {} appears more than once",
                frame
            )));
        }
        let zones = parse_zone_list(frame, zones_value)?;
        timeline.set(frame, zones)?;
    }

    Ok(timeline)
}

/// Default keyframe file for a video: `{base}_keyframes.{ext}` next to it.
pub fn keyframe_path_for(video_path: &Path, extension: &str) -> PathBuf {
    let base = crate::models::base_name(video_path);
    let file_name = format!("{}_keyframes.{}", base, extension);
    match video_path.parent() {
        Some(parent) => parent.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Keyframe file name used by earlier releases: `{video_path}.zones.json`.
pub fn legacy_keyframe_path_for(video_path: &Path) -> PathBuf {
    let mut name = OsString::from(video_path.as_os_str());
    name.push(".zones.json");
    PathBuf::from(name)
}

/// Write a timeline to `path` atomically (temp file, then rename).
pub fn save_to_file(timeline: &ZoneTimeline, path: &Path) -> TimelineResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| TimelineError::io("write", path, e))?;
        }
    }

    let mut temp_name = OsString::from(path.as_os_str());
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    let content = save_pretty(timeline);
    {
        let mut file =
            fs::File::create(&temp_path).map_err(|e| TimelineError::io("write", path, e))?;
        file.write_all(content.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| TimelineError::io("write", path, e))?;
    }
    fs::rename(&temp_path, path).map_err(|e| TimelineError::io("write", path, e))?;

    tracing::debug!(
        "Saved {} keyframes to {}",
        timeline.len(),
        path.display()
    );
    Ok(())
}

/// Read and validate a keyframe file.
pub fn load_from_file(path: &Path, video: &Video) -> TimelineResult<ZoneTimeline> {
    let content = fs::read_to_string(path).map_err(|e| TimelineError::io("read", path, e))?;
    let timeline = load(&content, video)?;
    tracing::debug!(
        "Loaded {} keyframes from {}",
        timeline.len(),
        path.display()
    );
    Ok(timeline)
}

/// Load the keyframe file belonging to `video`, if one exists.
///
/// Looks for the default name first, then the legacy name. Returns the
/// timeline together with the file it came from.
pub fn load_for_video(
    video: &Video,
    extension: &str,
) -> TimelineResult<Option<(ZoneTimeline, PathBuf)>> {
    let candidates = [
        keyframe_path_for(&video.path, extension),
        legacy_keyframe_path_for(&video.path),
    ];

    for path in candidates {
        if path.is_file() {
            let timeline = load_from_file(&path, video)?;
            return Ok(Some((timeline, path)));
        }
    }
    Ok(None)
}

fn to_value(timeline: &ZoneTimeline) -> Value {
    let mut entries = Map::new();
    for (frame, zones) in timeline.keyframes() {
        let list = zones
            .iter()
            .map(|zone| Value::from(zone.to_array().to_vec()))
            .collect();
        entries.insert(frame.to_string(), Value::Array(list));
    }
    Value::Object(entries)
}

/// Top-level object with every entry kept, including repeated keys.
struct RawDocument(Vec<(String, Value)>);

impl<'de> Deserialize<'de> for RawDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = RawDocument;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping frame indices to zone lists")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RawDocument, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, Value>()? {
                    entries.push(entry);
                }
                Ok(RawDocument(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// Frame keys must be canonical decimal integers ("0", "150"; not "07" or "+1").
fn parse_frame_key(key: &str) -> TimelineResult<u32> {
    let canonical = !key.is_empty()
        && key.bytes().all(|b| b.is_ascii_digit())
        && (key == "0" || !key.starts_with('0'));
    if !canonical {
        return Err(TimelineError::invalid_format(format!(
            "frame key {:?} is not a non-negative integer",
            key
        )));
    }
    key.parse::<u32>().map_err(|_| {
        TimelineError::invalid_format(format!("frame key {:?} is out of range", key))
    })
}

fn parse_zone_list(frame: u32, value: &Value) -> TimelineResult<Vec<Zone>> {
    let Value::Array(items) = value else {
        return Err(TimelineError::invalid_format(format!(
            "frame {}: expected a list of zones",
            frame
        )));
    };

    items
        .iter()
        .map(|item| parse_zone(frame, item))
        .collect()
}

fn parse_zone(frame: u32, value: &Value) -> TimelineResult<Zone> {
    let Value::Array(coords) = value else {
        return Err(TimelineError::invalid_format(format!(
            "frame {}: zone must be an [x1, y1, x2, y2] array",
            frame
        )));
    };
    if coords.len() != 4 {
        return Err(TimelineError::invalid_format(format!(
            "frame {}: zone has {} coordinates, expected 4",
            frame,
            coords.len()
        )));
    }

    let mut parsed = [0i64; 4];
    for (slot, coord) in parsed.iter_mut().zip(coords) {
        *slot = coord.as_i64().ok_or_else(|| {
            TimelineError::invalid_format(format!(
                "frame {}: coordinate {} is not an integer",
                frame, coord
            ))
        })?;
    }

    Zone::from_signed(parsed).map_err(|source| TimelineError::invalid_zone(frame, source))
}
