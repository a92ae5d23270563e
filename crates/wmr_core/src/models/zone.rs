//! Zone rectangles and frame bounds.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pixel dimensions of a video frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameBounds {
    pub width: u32,
    pub height: u32,
}

impl FrameBounds {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for FrameBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Reasons a zone is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ZoneError {
    /// Coordinates are not strictly ordered.
    #[error("zone ({x1}, {y1}, {x2}, {y2}) is empty or inverted: expected x1 < x2 and y1 < y2")]
    Inverted { x1: u32, y1: u32, x2: u32, y2: u32 },

    /// Zone extends past the right or bottom edge of the frame.
    #[error("zone {zone} exceeds frame bounds {bounds}")]
    OutOfBounds { zone: Zone, bounds: FrameBounds },

    /// A coordinate cannot be represented as a pixel position.
    #[error("zone coordinate {value} is outside the valid pixel range")]
    CoordinateOutOfRange { value: i64 },
}

/// Axis-aligned rectangle in frame pixel coordinates.
///
/// `(x1, y1)` is the top-left corner and `(x2, y2)` the exclusive
/// bottom-right corner. Zones are immutable; editing produces a new zone.
/// Serialized as a 4-element array `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[u32; 4]", into = "[u32; 4]")]
pub struct Zone {
    x1: u32,
    y1: u32,
    x2: u32,
    y2: u32,
}

impl Zone {
    /// Create a zone, checking that `x1 < x2` and `y1 < y2`.
    ///
    /// Bounds against a frame are checked separately with
    /// [`Zone::validate_within`] since a zone does not know its video.
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Result<Self, ZoneError> {
        if x1 >= x2 || y1 >= y2 {
            return Err(ZoneError::Inverted { x1, y1, x2, y2 });
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    /// Create a zone from signed coordinates (as read from a file).
    pub fn from_signed(coords: [i64; 4]) -> Result<Self, ZoneError> {
        let mut out = [0u32; 4];
        for (slot, value) in out.iter_mut().zip(coords) {
            *slot = u32::try_from(value).map_err(|_| ZoneError::CoordinateOutOfRange { value })?;
        }
        Self::new(out[0], out[1], out[2], out[3])
    }

    pub fn x1(&self) -> u32 {
        self.x1
    }

    pub fn y1(&self) -> u32 {
        self.y1
    }

    pub fn x2(&self) -> u32 {
        self.x2
    }

    pub fn y2(&self) -> u32 {
        self.y2
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    /// Area in pixels.
    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Coordinates as `[x1, y1, x2, y2]`.
    pub fn to_array(&self) -> [u32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// Check that the zone lies within `[0, width] x [0, height]`.
    pub fn validate_within(&self, bounds: FrameBounds) -> Result<(), ZoneError> {
        if self.x2 > bounds.width || self.y2 > bounds.height {
            return Err(ZoneError::OutOfBounds {
                zone: *self,
                bounds,
            });
        }
        Ok(())
    }

    /// Grow the zone by `padding` pixels on every side, clamped to the frame.
    pub fn expanded(&self, padding: u32, bounds: FrameBounds) -> Zone {
        let x2 = self.x2.saturating_add(padding).min(bounds.width).max(self.x2);
        let y2 = self.y2.saturating_add(padding).min(bounds.height).max(self.y2);
        Zone {
            x1: self.x1.saturating_sub(padding),
            y1: self.y1.saturating_sub(padding),
            x2,
            y2,
        }
    }
}

impl TryFrom<[u32; 4]> for Zone {
    type Error = ZoneError;

    fn try_from(value: [u32; 4]) -> Result<Self, Self::Error> {
        Zone::new(value[0], value[1], value[2], value[3])
    }
}

impl From<Zone> for [u32; 4] {
    fn from(zone: Zone) -> Self {
        zone.to_array()
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x1, self.y1, self.x2, self.y2)
    }
}
