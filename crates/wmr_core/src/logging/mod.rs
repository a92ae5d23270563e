//! Logging infrastructure for Watermark Remover.
//!
//! This module provides:
//! - Application-wide `tracing` setup (stderr, optionally a rolling file)
//! - Per-job loggers with compact progress filtering
//! - Tail buffer of backend output for error diagnosis
//!
//! # Example
//!
//! ```no_run
//! use wmr_core::logging::{JobLogger, LogConfig};
//!
//! let logger = JobLogger::new("movie.mp4", ".logs", LogConfig::default()).unwrap();
//! logger.phase("Inpainting");
//! logger.frame_progress(120, 400);
//! logger.success("Wrote clean_movie.mp4");
//! ```

mod job_logger;
mod types;

use std::path::Path;

pub use job_logger::JobLogger;
pub use tracing_appender::non_blocking::WorkerGuard;
pub use types::{LogConfig, LogLevel, MessagePrefix};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// File name prefix of the application log under the logs folder.
pub const APP_LOG_PREFIX: &str = "wmr.log";

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` overrides `default_level`. Output goes to stderr.
/// Should be called once at application startup.
pub fn init_tracing(default_level: LogLevel) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(env_filter(default_level))
        .init();
}

/// Like [`init_tracing`], plus a daily-rolling log file in `logs_dir`.
///
/// Keep the returned guard alive for the life of the program; dropping it
/// flushes and stops the file writer.
pub fn init_tracing_with_file(default_level: LogLevel, logs_dir: &Path) -> WorkerGuard {
    let appender = tracing_appender::rolling::daily(logs_dir, APP_LOG_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(env_filter(default_level))
        .init();

    guard
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

fn env_filter(default_level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level.as_str()))
}
