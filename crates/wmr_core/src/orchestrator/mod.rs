//! Batch processing: one worker, one background thread, typed events.
//!
//! The flow for a batch:
//! 1. Jobs are enqueued on the [`JobScheduler`], each with a timeline snapshot
//! 2. `start()` spawns the scheduler thread
//! 3. The thread hands one job at a time to the [`ProcessingWorker`]
//! 4. Progress and results arrive as [`SchedulerEvent`]s on a channel
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wmr_core::backend::ExternalBackend;
//! use wmr_core::models::Video;
//! use wmr_core::orchestrator::{JobScheduler, ProcessingWorker, SchedulerEvent};
//! use wmr_core::timeline::ZoneTimeline;
//!
//! let backend = Arc::new(ExternalBackend::new("inpaint-video"));
//! let (scheduler, events) = JobScheduler::new(ProcessingWorker::new(backend, ".temp"));
//!
//! let video = Arc::new(Video::new("movie.mp4", 400, 30.0, 1920, 1080));
//! let timeline = ZoneTimeline::for_video(&video);
//! scheduler.enqueue(video, &timeline, "clean_output/clean_movie.mp4");
//! scheduler.start().unwrap();
//!
//! for event in events.iter() {
//!     if let SchedulerEvent::BatchFinished { .. } = event {
//!         break;
//!     }
//! }
//! ```

mod cancel;
mod errors;
#[cfg(test)]
pub(crate) mod fake_backend;
mod scheduler;
mod types;
mod worker;

pub use cancel::CancelToken;
pub use errors::{JobError, SchedulerError};
pub use scheduler::JobScheduler;
pub use types::{JobOutcome, JobProgress, SchedulerEvent, SchedulerState};
pub use worker::ProcessingWorker;
