//! Scriptable backend for worker and scheduler tests.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::Sender;

use crate::backend::{BackendError, BackendRequest, BackendResult, InpaintBackend};

/// What the fake does for a given source file name.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Report every frame, then write the output.
    Succeed,
    /// Report out-of-order and overshooting progress, then succeed.
    Jittery,
    /// Report one frame, print the message, then fail with it.
    Fail(String),
    /// Refuse to run.
    Unavailable,
    /// Write a partial output and spin until cancelled.
    BlockUntilCancelled,
    /// Claim success without writing anything.
    SkipOutput,
}

pub struct FakeBackend {
    behaviors: HashMap<String, Behavior>,
    started: Option<Sender<String>>,
    calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            behaviors: HashMap::new(),
            started: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with(mut self, file_name: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(file_name.to_string(), behavior);
        self
    }

    /// Send the file name of every video as it reaches the backend.
    pub fn notify_started(mut self, tx: Sender<String>) -> Self {
        self.started = Some(tx);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl InpaintBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    fn check_ready(&self) -> BackendResult<()> {
        Ok(())
    }

    fn process_video(
        &self,
        request: &BackendRequest<'_>,
        progress: &mut dyn FnMut(u64, u64),
    ) -> BackendResult<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = request.video.file_name();
        if let Some(ref tx) = self.started {
            let _ = tx.send(name.clone());
        }

        let total = request.frame_zone_map.len() as u64;
        let write_output = || {
            fs::write(request.output_path, b"cleaned")
                .map_err(|e| BackendError::destination_write(request.output_path, e.to_string()))
        };

        match self.behaviors.get(&name).cloned().unwrap_or(Behavior::Succeed) {
            Behavior::Succeed => {
                for frame in 1..=total {
                    progress(frame, total);
                }
                write_output()?;
            }
            Behavior::Jittery => {
                progress(total / 2, total);
                progress(1, total);
                progress(total + 10, total);
                write_output()?;
            }
            Behavior::Fail(message) => {
                progress(1, total);
                (request.output)(&format!("error: {}", message));
                return Err(BackendError::inference(message));
            }
            Behavior::Unavailable => {
                return Err(BackendError::unavailable("fake", "model not loaded"));
            }
            Behavior::BlockUntilCancelled => {
                write_output()?;
                progress(1, total);
                let deadline = Instant::now() + Duration::from_secs(10);
                while !request.cancel.is_cancelled() {
                    if Instant::now() > deadline {
                        return Err(BackendError::inference("never cancelled"));
                    }
                    thread::sleep(Duration::from_millis(5));
                }
                return Err(BackendError::Cancelled);
            }
            Behavior::SkipOutput => {}
        }

        Ok(request.output_path.to_path_buf())
    }
}
