//! Watermark remover CLI
//!
//! Edit per-video zone keyframes and run batch inpainting from the terminal.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use wmr_core::backend::{ExternalBackend, InpaintBackend};
use wmr_core::config::{ConfigManager, DEFAULT_CONFIG_PATH};
use wmr_core::jobs::JobId;
use wmr_core::logging::{self, LogLevel};
use wmr_core::models::Zone;
use wmr_core::orchestrator::{JobScheduler, ProcessingWorker, SchedulerEvent};
use wmr_core::session::EditorSession;
use wmr_core::video::{FfprobeSource, VideoSource};

#[derive(Parser)]
#[command(name = "wmr")]
#[command(about = "Watermark remover - keyframed zones and batch inpainting")]
#[command(version)]
struct Cli {
    /// Settings file (created with defaults if missing)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the frame count, frame rate and resolution of a video
    Probe {
        /// Input video file path
        video: PathBuf,
    },

    /// Inspect or edit a video's zone keyframes
    Zones {
        #[command(subcommand)]
        action: ZoneAction,
    },

    /// Inpaint the zones of one or more videos
    Process {
        /// Input video file paths
        #[arg(required = true)]
        videos: Vec<PathBuf>,

        /// Override the configured output folder
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ZoneAction {
    /// Show all keyframes, or the zones in effect at one frame
    Show {
        video: PathBuf,

        #[arg(long)]
        frame: Option<i64>,
    },

    /// Replace the zones at a frame (no --zone clears it)
    Set {
        video: PathBuf,

        #[arg(long)]
        frame: i64,

        /// Rectangle as x1,y1,x2,y2
        #[arg(long = "zone", value_parser = parse_zone)]
        zones: Vec<Zone>,
    },

    /// Append one zone to a frame
    Add {
        video: PathBuf,

        #[arg(long)]
        frame: i64,

        /// Rectangle as x1,y1,x2,y2
        #[arg(long, value_parser = parse_zone)]
        zone: Zone,
    },

    /// Remove a keyframe, or one zone of it with --index
    Remove {
        video: PathBuf,

        #[arg(long)]
        frame: i64,

        /// 1-based zone position within the keyframe
        #[arg(long)]
        index: Option<usize>,
    },
}

fn parse_zone(value: &str) -> std::result::Result<Zone, String> {
    let coords: Vec<i64> = value
        .split(',')
        .map(|part| part.trim().parse::<i64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| format!("invalid coordinate in '{}': {}", value, e))?;
    let coords: [i64; 4] = coords
        .try_into()
        .map_err(|_| format!("expected x1,y1,x2,y2, got '{}'", value))?;
    Zone::from_signed(coords).map_err(|e| e.to_string())
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = ConfigManager::new(&cli.config);
    config
        .load_or_create()
        .with_context(|| format!("Failed to load settings from {}", cli.config.display()))?;
    config.ensure_dirs_exist()?;

    let level = config
        .settings()
        .logging
        .level
        .parse::<LogLevel>()
        .unwrap_or(LogLevel::Info);
    let _log_guard = logging::init_tracing_with_file(level, &config.logs_folder());

    let settings = config.settings();
    let backend = Arc::new(
        ExternalBackend::from_settings(&settings.backend)
            .with_error_tail(settings.logging.error_tail as usize),
    );
    let worker = ProcessingWorker::from_settings(backend.clone(), settings);
    let (scheduler, events) = JobScheduler::new(worker);
    let source: Arc<dyn VideoSource> = Arc::new(FfprobeSource::new());
    let mut session = EditorSession::from_settings(Arc::clone(&source), scheduler, settings);

    match cli.command {
        Commands::Probe { video } => {
            let video = source
                .open(&video)
                .with_context(|| format!("Failed to probe {}", video.display()))?;
            println!("{}", video.info_string());
            println!("Duration: {:.2}s", video.duration_secs());
            Ok(ExitCode::SUCCESS)
        }

        Commands::Zones { action } => {
            run_zones(&mut session, action)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Process { videos, output_dir } => {
            if let Err(e) = backend.check_ready() {
                bail!("{}", e);
            }
            if let Some(dir) = output_dir {
                session = session.with_output_dir(dir);
            }
            std::fs::create_dir_all(session.output_dir()).with_context(|| {
                format!("Failed to create {}", session.output_dir().display())
            })?;

            let QueuedBatch { names, rejected } = queue_videos(&session, &videos);
            for (path, error) in &rejected {
                println!("Failed: {} {:#}", display_name(path), error);
            }
            let mut failed = !rejected.is_empty();
            if names.is_empty() {
                eprintln!("No videos could be queued");
                return Ok(ExitCode::FAILURE);
            }

            tracing::info!("Queued {} job(s), {} rejected", names.len(), rejected.len());
            println!(
                "Processing {} video(s) into {}",
                names.len(),
                session.output_dir().display()
            );
            session.scheduler().start()?;

            let mut last_decile: HashMap<JobId, u32> = HashMap::new();
            for event in events.iter() {
                match event {
                    SchedulerEvent::JobStarted { name, .. } => {
                        println!("Started: {}", name);
                    }
                    SchedulerEvent::JobProgress { job_id, progress } => {
                        let decile = (progress.percent() / 10.0).floor() as u32;
                        let last = last_decile.entry(job_id).or_insert(0);
                        if decile > *last {
                            *last = decile;
                            let name = names.get(&job_id).map(String::as_str).unwrap_or("?");
                            println!(
                                "  {} {:>3.0}% ({}/{})",
                                name,
                                progress.percent(),
                                progress.frames_completed,
                                progress.frames_total
                            );
                        }
                    }
                    SchedulerEvent::JobFinished { job_id, status, error } => {
                        let name = names.get(&job_id).map(String::as_str).unwrap_or("?");
                        match error {
                            Some(error) => {
                                failed = true;
                                println!("Finished: {} [{}] {}", name, status.as_str(), error);
                            }
                            None => println!("Finished: {} [{}]", name, status.as_str()),
                        }
                    }
                    SchedulerEvent::BatchAborted { reason } => {
                        failed = true;
                        eprintln!("Batch aborted: {}", reason);
                    }
                    SchedulerEvent::BatchFinished {
                        succeeded,
                        failed: failures,
                        cancelled,
                    } => {
                        println!(
                            "Done: {} succeeded, {} failed, {} cancelled",
                            succeeded, failures, cancelled
                        );
                        if failures > 0 {
                            failed = true;
                        }
                        break;
                    }
                    SchedulerEvent::BatchProgress { .. } => {}
                }
            }
            session.scheduler().wait();

            Ok(if failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}

/// Jobs queued for `process`, plus the videos that could not be queued.
struct QueuedBatch {
    names: HashMap<JobId, String>,
    rejected: Vec<(PathBuf, anyhow::Error)>,
}

/// Queue every video; an unreadable video or keyframe file only rejects
/// that one video.
fn queue_videos(session: &EditorSession, videos: &[PathBuf]) -> QueuedBatch {
    let mut names = HashMap::new();
    let mut rejected = Vec::new();
    for path in videos {
        match session
            .enqueue_file(path)
            .with_context(|| format!("Failed to queue {}", path.display()))
        {
            Ok(id) => {
                names.insert(id, display_name(path));
            }
            Err(e) => {
                tracing::warn!("{:#}", e);
                rejected.push((path.clone(), e));
            }
        }
    }
    QueuedBatch { names, rejected }
}

fn run_zones(session: &mut EditorSession, action: ZoneAction) -> Result<()> {
    match action {
        ZoneAction::Show { video, frame } => {
            let opened = open(session, &video)?;
            match frame {
                Some(frame) => {
                    let frame = opened.clamp_frame(frame);
                    let zones = session.zones_at(frame);
                    println!("Frame {}: {} zone(s)", frame, zones.len());
                    for (i, zone) in zones.iter().enumerate() {
                        println!("  Zone {}: {}", i + 1, zone);
                    }
                }
                None => {
                    if let Some(timeline) = session.timeline() {
                        println!("{}", timeline.summary());
                    }
                }
            }
        }

        ZoneAction::Set { video, frame, zones } => {
            let opened = open(session, &video)?;
            let frame = opened.clamp_frame(frame);
            let count = zones.len();
            session.set_keyframe(frame, zones)?;
            let path = session.save_keyframes()?;
            println!("Frame {}: {} zone(s), saved to {}", frame, count, path.display());
        }

        ZoneAction::Add { video, frame, zone } => {
            let opened = open(session, &video)?;
            let frame = opened.clamp_frame(frame);
            session.add_zone(frame, zone)?;
            let path = session.save_keyframes()?;
            println!("Frame {}: added {}, saved to {}", frame, zone, path.display());
        }

        ZoneAction::Remove { video, frame, index } => {
            let opened = open(session, &video)?;
            let frame = opened.clamp_frame(frame);
            let removed = match index {
                Some(0) => bail!("--index is 1-based"),
                Some(index) => session.remove_zone(frame, index - 1)?,
                None => session.remove_keyframe(frame)?.is_some(),
            };
            if !removed {
                bail!("Nothing to remove at frame {}", frame);
            }
            let path = session.save_keyframes()?;
            println!("Frame {}: removed, saved to {}", frame, path.display());
        }
    }
    Ok(())
}

fn open(session: &mut EditorSession, path: &Path) -> Result<Arc<wmr_core::models::Video>> {
    session
        .open_video(path)
        .with_context(|| format!("Failed to open {}", path.display()))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use wmr_core::models::Video;
    use wmr_core::video::{RgbImage, VideoError, VideoResult};

    /// Fixed metadata for any existing file.
    struct StubSource;

    impl VideoSource for StubSource {
        fn open(&self, path: &Path) -> VideoResult<Video> {
            if !path.is_file() {
                return Err(VideoError::unreadable(path, "file does not exist"));
            }
            Ok(Video::new(path, 50, 25.0, 320, 240))
        }

        fn frame_at(&self, video: &Video, _index: u32) -> VideoResult<RgbImage> {
            Ok(RgbImage::new(video.width, video.height))
        }
    }

    fn session(output_dir: &Path) -> EditorSession {
        let backend = Arc::new(ExternalBackend::new("inpaint-video"));
        let worker = ProcessingWorker::new(backend, output_dir.join("work"));
        let (scheduler, _events) = JobScheduler::new(worker);
        EditorSession::new(Arc::new(StubSource), scheduler, output_dir)
    }

    #[test]
    fn parses_zone_arguments() {
        let zone = parse_zone("10, 20,110,220").unwrap();
        assert_eq!(zone.to_array(), [10, 20, 110, 220]);
        assert!(parse_zone("1,2,3").is_err());
        assert!(parse_zone("5,5,1,1").is_err());
        assert!(parse_zone("-1,0,4,4").is_err());
    }

    #[test]
    fn bad_videos_do_not_block_the_rest() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.mp4");
        let missing = dir.path().join("missing.mp4");
        let broken = dir.path().join("broken.mp4");
        let good2 = dir.path().join("good2.mp4");
        for path in [&good, &broken, &good2] {
            fs::write(path, b"video").unwrap();
        }
        fs::write(dir.path().join("broken_keyframes.json"), "not json").unwrap();

        let session = session(&dir.path().join("out"));
        let videos = vec![good, missing.clone(), broken.clone(), good2];
        let QueuedBatch { names, rejected } = queue_videos(&session, &videos);

        let mut queued: Vec<&str> = names.values().map(String::as_str).collect();
        queued.sort();
        assert_eq!(queued, vec!["good.mp4", "good2.mp4"]);
        assert_eq!(session.scheduler().queued(), 2);

        let rejected_paths: Vec<&PathBuf> = rejected.iter().map(|(p, _)| p).collect();
        assert_eq!(rejected_paths, vec![&missing, &broken]);
        assert!(format!("{:#}", rejected[0].1).contains("file does not exist"));
    }
}
