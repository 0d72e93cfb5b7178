//! qfollow - person following from detector output and a single-object tracker
//!
//! `detect` writes per-image detection records for a list of images.
//! `follow` runs one tracking session over a frame source and emits gait commands.
//! `follow-all` runs a fresh session for every entry of a list file.

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use qfollow::detector::ReplayDetector;
use qfollow::session::{DecisionLog, DecisionObserver};
use qfollow::sink::{ActuatorSink, JsonLinesSink, LogSink};
use qfollow::source::{ImageSequence, PollingFile, Source};
use qfollow::session::SessionStats;
use qfollow::{FollowConfig, MotionTracker, Regime, Session};

#[derive(Parser)]
#[command(
    name = "qfollow",
    version,
    about = "Follow a person with detector + tracker arbitration"
)]
struct Cli {
    /// TOML config file (falls back to QFOLLOW_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write `file label score xmin ymin xmax ymax` for every image in a list file
    Detect {
        /// Whitespace separated list of image paths
        list: PathBuf,

        /// Recorded detections, keyed by position in the list
        #[arg(long)]
        detections: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Run a following session
    Follow {
        #[command(flatten)]
        source: SourceArgs,

        /// Recorded detections, keyed by frame index
        #[arg(long)]
        detections: PathBuf,

        /// Write commands as JSON lines instead of logging them
        #[arg(long)]
        commands_out: Option<PathBuf>,

        /// Write per-frame decisions as JSON lines
        #[arg(long)]
        decisions_out: Option<PathBuf>,
    },

    /// Run one session per line of `<frames dir> <detections dump>` in a list file
    FollowAll {
        list: PathBuf,

        /// Write commands as JSON lines instead of logging them
        #[arg(long)]
        commands_out: Option<PathBuf>,

        /// Write per-frame decisions as JSON lines
        #[arg(long)]
        decisions_out: Option<PathBuf>,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct SourceArgs {
    /// Directory of frames, processed in file name order
    #[arg(long)]
    images: Option<PathBuf>,

    /// Single image path that is overwritten by a capture process
    #[arg(long)]
    poll: Option<PathBuf>,

    /// Video file
    #[cfg(feature = "video")]
    #[arg(long)]
    video: Option<String>,

    /// Camera device id
    #[cfg(feature = "video")]
    #[arg(long)]
    camera: Option<i32>,
}

impl SourceArgs {
    fn open(self, config: &FollowConfig) -> Result<Source> {
        if let Some(dir) = self.images {
            return Ok(Source::Images(ImageSequence::from_dir(&dir)?));
        }

        if let Some(path) = self.poll {
            return Ok(Source::Polling(PollingFile::new(
                path,
                config.polling.clone(),
            )));
        }

        #[cfg(feature = "video")]
        {
            if let Some(path) = self.video {
                return Ok(Source::Video(qfollow::source::VideoSource::open_file(
                    &path,
                )?));
            }

            if let Some(id) = self.camera {
                return Ok(Source::Video(qfollow::source::VideoSource::open_camera(
                    id,
                )?));
            }
        }

        Err(anyhow!("no frame source given"))
    }
}

fn open_sink(path: Option<PathBuf>) -> Result<Box<dyn ActuatorSink>> {
    Ok(match path {
        Some(path) => Box::new(JsonLinesSink::new(BufWriter::new(File::create(path)?))),
        None => Box::new(LogSink),
    })
}

fn open_observer(path: Option<PathBuf>) -> Result<Box<dyn DecisionObserver>> {
    Ok(match path {
        Some(path) => Box::new(DecisionLog::new(BufWriter::new(File::create(path)?))),
        None => Box::new(()),
    })
}

/// Reads `<frames dir> <detections dump>` pairs, one per line. `#` starts a comment.
fn read_session_list(path: &Path) -> Result<Vec<(PathBuf, PathBuf)>> {
    let text = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();

    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next(), fields.next()) {
            (Some(frames), Some(dets), None) => {
                entries.push((PathBuf::from(frames), PathBuf::from(dets)))
            }
            _ => {
                return Err(anyhow!(
                    "{}:{}: expected `<frames dir> <detections dump>`",
                    path.display(),
                    lineno + 1
                ))
            }
        }
    }

    Ok(entries)
}

fn log_stats(stats: &SessionStats) {
    for regime in [
        Regime::Initializing,
        Regime::Tracking,
        Regime::Degraded,
        Regime::Idle,
    ] {
        log::info!("{:?}: {} frames", regime, stats.count(regime));
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = FollowConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Detect {
            list,
            detections,
            out,
        } => {
            let text = std::fs::read_to_string(&list)?;
            let paths = text.split_whitespace().map(PathBuf::from).collect();
            let detector = ReplayDetector::open(&detections)?;

            let mut out: Box<dyn Write> = match out {
                Some(path) => Box::new(BufWriter::new(File::create(path)?)),
                None => Box::new(std::io::stdout().lock()),
            };

            qfollow::batch::run(
                ImageSequence::new(paths),
                detector,
                &mut out,
                config.arbitration.confidence_threshold,
            )?;
            out.flush()?;
        }

        Command::Follow {
            source,
            detections,
            commands_out,
            decisions_out,
        } => {
            let source = source.open(&config)?;
            let detector = ReplayDetector::open(&detections)?;

            let mut sink = open_sink(commands_out)?;
            let mut observer = open_observer(decisions_out)?;

            let arbiter = qfollow::new_arbiter(MotionTracker::default(), &config);
            let mut session = Session::new(arbiter);
            let stats = session.run(source, detector, &mut *sink, &mut *observer)?;

            sink.flush()?;
            observer.flush()?;
            log_stats(&stats);
        }

        Command::FollowAll {
            list,
            commands_out,
            decisions_out,
        } => {
            let mut inputs = Vec::new();
            for (frames, dets) in read_session_list(&list)? {
                inputs.push((
                    ImageSequence::from_dir(&frames)?,
                    ReplayDetector::open(&dets)?,
                ));
            }

            let mut sink = open_sink(commands_out)?;
            let mut observer = open_observer(decisions_out)?;

            let arbiter = qfollow::new_arbiter(MotionTracker::default(), &config);
            let mut session = Session::new(arbiter);
            let all = session.run_all(inputs, &mut *sink, &mut *observer)?;

            sink.flush()?;
            observer.flush()?;
            for (n, stats) in all.iter().enumerate() {
                log::info!("input #{}: {} frames", n, stats.frames);
                log_stats(stats);
            }
        }
    }

    Ok(())
}
