//! ffprobe/ffmpeg backed video source.

use std::io::Cursor;
use std::path::Path;
use std::process::Command;

use image::RgbImage;
use serde_json::Value;

use crate::models::Video;

use super::{VideoError, VideoResult, VideoSource};

/// Frame rate assumed when ffprobe reports none.
pub const DEFAULT_FPS: f64 = 30.0;

/// Video source using the `ffprobe` and `ffmpeg` executables.
#[derive(Debug, Clone)]
pub struct FfprobeSource {
    ffprobe: String,
    ffmpeg: String,
}

impl Default for FfprobeSource {
    fn default() -> Self {
        Self {
            ffprobe: "ffprobe".to_string(),
            ffmpeg: "ffmpeg".to_string(),
        }
    }
}

impl FfprobeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use specific executables instead of the ones on PATH.
    pub fn with_tools(ffprobe: impl Into<String>, ffmpeg: impl Into<String>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
            ffmpeg: ffmpeg.into(),
        }
    }
}

impl VideoSource for FfprobeSource {
    fn open(&self, path: &Path) -> VideoResult<Video> {
        if !path.is_file() {
            return Err(VideoError::unreadable(path, "file does not exist"));
        }

        tracing::debug!("Probing video: {}", path.display());

        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "quiet",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,r_frame_rate,nb_frames,duration",
                "-show_entries",
                "format=duration",
                "-of",
                "json",
            ])
            .arg(path)
            .output()
            .map_err(|e| VideoError::unreadable(path, format!("ffprobe execution failed: {}", e)))?;

        if !output.status.success() {
            return Err(VideoError::unreadable(
                path,
                format!("ffprobe exited with code {:?}", output.status.code()),
            ));
        }

        let data: Value = serde_json::from_slice(&output.stdout).map_err(|e| {
            VideoError::unreadable(path, format!("Failed to parse ffprobe JSON: {}", e))
        })?;

        let video = parse_ffprobe_json(&data, path)?;
        tracing::info!("Opened {}: {}", video.file_name(), video.info_string());
        Ok(video)
    }

    fn frame_at(&self, video: &Video, index: u32) -> VideoResult<RgbImage> {
        let index = video.clamp_frame(index as i64);
        let fps = if video.fps > 0.0 { video.fps } else { DEFAULT_FPS };
        let time_secs = index as f64 / fps;

        tracing::trace!("Extracting frame {} at {:.3}s", index, time_secs);

        let output = Command::new(&self.ffmpeg)
            .arg("-v")
            .arg("error")
            .arg("-ss")
            .arg(format!("{:.3}", time_secs))
            .arg("-i")
            .arg(&video.path)
            .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "-"])
            .output()
            .map_err(|e| {
                VideoError::unreadable(&video.path, format!("ffmpeg execution failed: {}", e))
            })?;

        if !output.status.success() || output.stdout.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VideoError::unreadable(
                &video.path,
                format!(
                    "no frame at index {}: {}",
                    index,
                    stderr.lines().last().unwrap_or("ffmpeg produced no output")
                ),
            ));
        }

        let img = image::load(Cursor::new(output.stdout), image::ImageFormat::Png).map_err(|e| {
            VideoError::unreadable(&video.path, format!("Failed to decode PNG: {}", e))
        })?;
        Ok(img.to_rgb8())
    }
}

/// Build a `Video` from `ffprobe -of json` output.
///
/// Frame rate comes from `r_frame_rate` ([`DEFAULT_FPS`] when missing).
/// Frame count comes from `nb_frames` or is estimated from the stream or
/// container duration.
pub fn parse_ffprobe_json(data: &Value, path: &Path) -> VideoResult<Video> {
    let stream = data
        .get("streams")
        .and_then(|s| s.as_array())
        .and_then(|s| s.first())
        .ok_or_else(|| VideoError::unreadable(path, "no video stream found"))?;

    let width = stream.get("width").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    let height = stream.get("height").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    if width == 0 || height == 0 {
        return Err(VideoError::unreadable(path, "video stream has no dimensions"));
    }

    let fps = stream
        .get("r_frame_rate")
        .and_then(|v| v.as_str())
        .and_then(parse_frame_rate)
        .unwrap_or(DEFAULT_FPS);

    // MKV often only has a container duration.
    let duration = number_field(stream, "duration").or_else(|| {
        data.get("format")
            .and_then(|f| number_field(f, "duration"))
    });

    let frame_count = number_field(stream, "nb_frames")
        .map(|n| n as u32)
        .filter(|&n| n > 0)
        .or_else(|| duration.map(|d| (d * fps).round() as u32))
        .unwrap_or(0);

    Ok(Video::new(path, frame_count, fps, width, height))
}

/// Parse `"30000/1001"` or `"25"`.
fn parse_frame_rate(text: &str) -> Option<f64> {
    let fps = match text.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => text.trim().parse().ok()?,
    };
    (fps > 0.0).then_some(fps)
}

/// ffprobe reports numbers as strings, with "N/A" for unknown.
fn number_field(obj: &Value, key: &str) -> Option<f64> {
    match obj.get(key)? {
        Value::String(s) if s != "N/A" => s.parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_probe() {
        let data = json!({
            "streams": [{
                "width": 1920,
                "height": 1080,
                "r_frame_rate": "30000/1001",
                "nb_frames": "1800",
                "duration": "60.060000"
            }],
            "format": {"duration": "60.100000"}
        });
        let video = parse_ffprobe_json(&data, Path::new("/v/a.mp4")).unwrap();
        assert_eq!(video.width, 1920);
        assert_eq!(video.frame_count, 1800);
        assert!((video.fps - 29.97).abs() < 0.01);
        assert_eq!(video.info_string(), "1920x1080 | 29.97 fps | 1800 frames");
    }

    #[test]
    fn estimates_frame_count_from_container_duration() {
        let data = json!({
            "streams": [{"width": 640, "height": 360, "r_frame_rate": "25/1", "nb_frames": "N/A"}],
            "format": {"duration": "10.0"}
        });
        let video = parse_ffprobe_json(&data, Path::new("/v/a.mkv")).unwrap();
        assert_eq!(video.frame_count, 250);
    }

    #[test]
    fn missing_frame_rate_falls_back() {
        let data = json!({
            "streams": [{"width": 640, "height": 360, "r_frame_rate": "0/0", "duration": "2.0"}]
        });
        let video = parse_ffprobe_json(&data, Path::new("/v/a.mp4")).unwrap();
        assert_eq!(video.fps, DEFAULT_FPS);
        assert_eq!(video.frame_count, 60);
    }

    #[test]
    fn rejects_files_without_video() {
        let path = Path::new("/v/audio.m4a");
        assert!(parse_ffprobe_json(&json!({"streams": []}), path).is_err());
        assert!(parse_ffprobe_json(&json!({}), path).is_err());
        let err = parse_ffprobe_json(&json!({"streams": [{"codec_type": "video"}]}), path)
            .unwrap_err();
        assert!(err.to_string().contains("audio.m4a"));
    }

    #[test]
    fn open_missing_file_is_unreadable() {
        let source = FfprobeSource::new();
        let err = source.open(Path::new("/definitely/not/here.mp4")).unwrap_err();
        assert!(matches!(err, VideoError::Unreadable { .. }));
    }
}
