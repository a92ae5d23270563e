//! Jobs and the batch queue.
//!
//! This module provides:
//! - `Job`: one video's processing request with its own timeline snapshot
//! - `JobStatus`: lifecycle state of a job
//! - `BatchQueue`: FIFO of jobs awaiting the scheduler
//! - `clean_output_path`: output naming convention for cleaned videos

mod queue;
mod types;

pub use queue::BatchQueue;
pub use types::{clean_output_path, Job, JobId, JobRecord, JobStatus};
