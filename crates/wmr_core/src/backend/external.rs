//! Inpainting through an external program.
//!
//! The program is invoked as
//!
//! ```text
//! <program> [extra_args...] --input <video> --output <path> --zones <zones.json> [--model <path>]
//! ```
//!
//! and reports progress on stdout with lines of the form
//! `PROGRESS <current>/<total>`. Other stdout lines, and the stderr tail once
//! the program exits, go to the request's output sink; the stderr tail is
//! also folded into error messages.

use std::collections::VecDeque;
use std::env;
use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError};
use serde_json::{json, Value};

use crate::config::BackendSettings;
use crate::timeline::FrameZoneMap;

use super::errors::{BackendError, BackendResult};
use super::{BackendRequest, InpaintBackend};

/// Prefix of progress lines on the program's stdout.
pub const PROGRESS_PREFIX: &str = "PROGRESS ";

/// Zone file written into the job's work directory.
const ZONES_FILE_NAME: &str = "zones.json";

/// Pixels added around every zone unless configured otherwise.
pub const DEFAULT_MASK_PADDING: u32 = 8;

/// How often the cancel token is checked while the program is silent.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Backend that shells out to an inpainting program.
#[derive(Debug, Clone)]
pub struct ExternalBackend {
    program: String,
    model_path: Option<PathBuf>,
    mask_padding: u32,
    extra_args: Vec<String>,
    error_tail: usize,
}

impl ExternalBackend {
    /// Create a backend running `program` with default options.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            model_path: None,
            mask_padding: DEFAULT_MASK_PADDING,
            extra_args: Vec::new(),
            error_tail: 20,
        }
    }

    /// Create a backend from the `[backend]` settings section.
    pub fn from_settings(settings: &BackendSettings) -> Self {
        let model_path = if settings.model_path.trim().is_empty() {
            None
        } else {
            Some(PathBuf::from(&settings.model_path))
        };
        Self {
            program: settings.program.clone(),
            model_path,
            mask_padding: settings.mask_padding,
            extra_args: settings.extra_args.clone(),
            error_tail: 20,
        }
    }

    /// Set the model file passed with `--model`.
    pub fn with_model(mut self, model_path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(model_path.into());
        self
    }

    /// Grow every zone by this many pixels (clamped to the frame).
    pub fn with_mask_padding(mut self, padding: u32) -> Self {
        self.mask_padding = padding;
        self
    }

    /// Arguments placed before the standard flags.
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    /// Number of stderr lines kept for error messages.
    pub fn with_error_tail(mut self, lines: usize) -> Self {
        self.error_tail = lines.max(1);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn build_command(&self, request: &BackendRequest<'_>, zones_path: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.extra_args)
            .arg("--input")
            .arg(&request.video.path)
            .arg("--output")
            .arg(request.output_path)
            .arg("--zones")
            .arg(zones_path);
        if let Some(ref model) = self.model_path {
            cmd.arg("--model").arg(model);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    fn spawn(&self, cmd: &mut Command) -> BackendResult<Child> {
        cmd.spawn().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                BackendError::unavailable(&self.program, format!("program not found: {}", e))
            } else {
                BackendError::io(format!("starting {}", self.program), e)
            }
        })
    }
}

impl InpaintBackend for ExternalBackend {
    fn name(&self) -> &str {
        &self.program
    }

    fn check_ready(&self) -> BackendResult<()> {
        if find_program(&self.program).is_none() {
            return Err(BackendError::unavailable(
                &self.program,
                "program not found on PATH",
            ));
        }
        if let Some(ref model) = self.model_path {
            if !model.is_file() {
                return Err(BackendError::unavailable(
                    &self.program,
                    format!("model file not found: {}", model.display()),
                ));
            }
        }
        Ok(())
    }

    fn process_video(
        &self,
        request: &BackendRequest<'_>,
        progress: &mut dyn FnMut(u64, u64),
    ) -> BackendResult<PathBuf> {
        if request.cancel.is_cancelled() {
            return Err(BackendError::Cancelled);
        }
        self.check_ready()?;

        fs::create_dir_all(request.work_dir)
            .map_err(|e| BackendError::io("creating work directory", e))?;
        let zones_path = request.work_dir.join(ZONES_FILE_NAME);
        let document = zones_document(request.frame_zone_map, self.mask_padding);
        fs::write(&zones_path, document.to_string())
            .map_err(|e| BackendError::io("writing zone file", e))?;

        if let Some(parent) = request.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    BackendError::destination_write(request.output_path, e.to_string())
                })?;
            }
        }

        let mut cmd = self.build_command(request, &zones_path);
        tracing::debug!("Running inpainting backend: {:?}", cmd);
        let mut child = self.spawn(&mut cmd)?;

        let stderr_tail = child
            .stderr
            .take()
            .map(|stderr| collect_tail(stderr, self.error_tail));
        let stdout = child.stdout.take().ok_or_else(|| {
            BackendError::io(
                "reading backend output",
                io::Error::other("stdout not captured"),
            )
        })?;

        let (tx, rx) = channel::unbounded::<String>();
        let reader = thread::spawn(move || {
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        loop {
            if request.cancel.is_cancelled() {
                tracing::info!("Cancelling inpainting backend (pid {})", child.id());
                let _ = child.kill();
                let _ = child.wait();
                return Err(BackendError::Cancelled);
            }
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(line) => match parse_progress_line(&line) {
                    Some((current, total)) => progress(current, total),
                    None => {
                        tracing::trace!("[{}] {}", self.program, line);
                        (request.output)(&line);
                    }
                },
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let status = child
            .wait()
            .map_err(|e| BackendError::io("waiting for backend", e))?;
        let _ = reader.join();
        let tail = stderr_tail
            .map(|handle| handle.join().unwrap_or_default())
            .unwrap_or_default();
        for line in &tail {
            (request.output)(line);
        }

        if request.cancel.is_cancelled() {
            return Err(BackendError::Cancelled);
        }

        if !status.success() {
            let code = status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            let mut message = format!("{} exited with code {}", self.program, code);
            if !tail.is_empty() {
                message.push_str(": ");
                message.push_str(&Vec::from(tail).join("\n"));
            }
            return Err(BackendError::inference(message));
        }

        if !request.output_path.is_file() {
            return Err(BackendError::inference(format!(
                "{} finished but wrote no output to {}",
                self.program,
                request.output_path.display()
            )));
        }

        Ok(request.output_path.to_path_buf())
    }
}

/// Locate `program` the way the OS would when spawning it.
///
/// Names containing a path separator are checked directly; bare names are
/// searched on `PATH`.
pub fn find_program(program: &str) -> Option<PathBuf> {
    let path = Path::new(program);
    if path.components().count() > 1 {
        return path.is_file().then(|| path.to_path_buf());
    }

    let search = env::var_os("PATH")?;
    env::split_paths(&search).find_map(|dir| {
        let candidate = dir.join(program);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = candidate.with_extension("exe");
            if exe.is_file() {
                return Some(exe);
            }
        }
        None
    })
}

/// Parse `PROGRESS <current>/<total>`.
fn parse_progress_line(line: &str) -> Option<(u64, u64)> {
    let rest = line.trim().strip_prefix(PROGRESS_PREFIX)?;
    let (current, total) = rest.split_once('/')?;
    Some((current.trim().parse().ok()?, total.trim().parse().ok()?))
}

/// Zone document handed to the program, with mask padding applied.
fn zones_document(map: &FrameZoneMap, padding: u32) -> Value {
    let bounds = map.bounds();
    let frames: Vec<Value> = map
        .iter()
        .map(|(_, zones)| {
            zones
                .iter()
                .map(|zone| json!(zone.expanded(padding, bounds).to_array()))
                .collect()
        })
        .collect();

    json!({
        "width": bounds.width,
        "height": bounds.height,
        "frames": frames,
    })
}

/// Keep the last `limit` lines of a stream on a background thread.
fn collect_tail<R: Read + Send + 'static>(source: R, limit: usize) -> JoinHandle<VecDeque<String>> {
    thread::spawn(move || {
        let mut tail = VecDeque::with_capacity(limit);
        for line in BufReader::new(source).lines().map_while(Result::ok) {
            if line.trim().is_empty() {
                continue;
            }
            if tail.len() == limit {
                tail.pop_front();
            }
            tail.push_back(line);
        }
        tail
    })
}
