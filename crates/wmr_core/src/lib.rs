//! WMR Core - Backend logic for Watermark Remover
//!
//! This crate contains all business logic with zero UI dependencies:
//! zone timelines, the batch job queue and the inpainting scheduler.
//! It can be used by the GUI application or the CLI tool.

pub mod backend;
pub mod config;
pub mod jobs;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod session;
pub mod timeline;
pub mod video;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_returns_value() {
        assert!(!version().is_empty());
    }
}
