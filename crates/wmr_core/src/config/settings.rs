//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use serde::{Deserialize, Serialize};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Path-related settings.
    #[serde(default)]
    pub paths: PathSettings,

    /// Inpainting backend.
    #[serde(default)]
    pub backend: BackendSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Keyframe file handling.
    #[serde(default)]
    pub timeline: TimelineSettings,
}

/// Path configuration for output, work files, and logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSettings {
    /// Folder cleaned videos are written to.
    #[serde(default = "default_output_folder")]
    pub output_folder: String,

    /// Root folder for per-job work directories.
    #[serde(default = "default_work_root")]
    pub work_root: String,

    /// Folder for log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,
}

fn default_output_folder() -> String {
    "clean_output".to_string()
}

fn default_work_root() -> String {
    ".temp".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            output_folder: default_output_folder(),
            work_root: default_work_root(),
            logs_folder: default_logs_folder(),
        }
    }
}

/// External inpainting program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Program name or path.
    #[serde(default = "default_program")]
    pub program: String,

    /// Model checkpoint passed with `--model` (empty = none).
    #[serde(default)]
    pub model_path: String,

    /// Pixels added around every zone before inpainting.
    #[serde(default = "default_mask_padding")]
    pub mask_padding: u32,

    /// Extra arguments placed before the standard flags.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_program() -> String {
    "inpaint-video".to_string()
}

fn default_mask_padding() -> u32 {
    crate::backend::DEFAULT_MASK_PADDING
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            program: default_program(),
            model_path: String::new(),
            mask_padding: default_mask_padding(),
            extra_args: Vec::new(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Minimum level (trace, debug, info, warn, error).
    #[serde(default = "default_level")]
    pub level: String,

    /// Use compact log format.
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Progress update step percentage.
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,

    /// Number of error lines to show in tail.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_progress_step() -> u32 {
    20
}

fn default_error_tail() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            compact: true,
            progress_step: default_progress_step(),
            error_tail: default_error_tail(),
        }
    }
}

/// Keyframe file settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineSettings {
    /// Extension of `{base}_keyframes.<ext>` files.
    #[serde(default = "default_keyframe_extension")]
    pub keyframe_extension: String,
}

fn default_keyframe_extension() -> String {
    crate::timeline::DEFAULT_KEYFRAME_EXTENSION.to_string()
}

impl Default for TimelineSettings {
    fn default() -> Self {
        Self {
            keyframe_extension: default_keyframe_extension(),
        }
    }
}

/// Config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSection {
    Paths,
    Backend,
    Logging,
    Timeline,
}

impl ConfigSection {
    /// All sections, in file order.
    pub const ALL: [ConfigSection; 4] = [
        ConfigSection::Paths,
        ConfigSection::Backend,
        ConfigSection::Logging,
        ConfigSection::Timeline,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Backend => "backend",
            ConfigSection::Logging => "logging",
            ConfigSection::Timeline => "timeline",
        }
    }

    /// Comment written above the section.
    pub fn description(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "Output and working directories",
            ConfigSection::Backend => "Inpainting program",
            ConfigSection::Logging => "Logging configuration",
            ConfigSection::Timeline => "Keyframe files",
        }
    }
}
