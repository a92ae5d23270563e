//! Data models for Watermark Remover.
//!
//! This module contains the leaf value types used throughout the crate:
//! - `Zone`: an immutable rectangle marked for inpainting
//! - `FrameBounds`: the pixel dimensions zones are validated against
//! - `Video`: read-only metadata of an opened source video

mod video;
mod zone;

pub(crate) use video::base_name;
pub use video::Video;
pub use zone::{FrameBounds, Zone, ZoneError};
