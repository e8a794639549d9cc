//! Red-light violation service - main entry point.
//!
//! One binary serves the violation API and runs the offline detection
//! pipeline over recorded intersection footage.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Vision**: OpenCV video I/O, image/imageproc for frames, OCR through a remote service or tesseract
//! - **Ingest**: HMAC-SHA256 signed violation reports
//!
//! # Subcommands
//!
//! - `serve`: run migrations and start the HTTP API
//! - `init-db`: run migrations and exit
//! - `process-video`: detect violations in a video file or frame directory and report them
//! - `annotate-sample`: `process-video` with the bundled sample settings
//! - `merge-clips`: concatenate evidence clips

mod app;
mod config;
mod db;
mod detection;
mod error;
mod handlers;
mod middleware;
mod models;
mod ocr;
mod pipeline;
mod services;
mod signal;
mod video;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::detection::geometry::StopLine;
use crate::pipeline::PipelineOptions;
use crate::video::evidence::EvidenceDirs;

const SAMPLE_VIDEO: &str = "sample_data/sample_video.mp4";
const SAMPLE_FRAMES: &str = "sample_data/sample_frames";
const SAMPLE_STOP_LINE: &str = "300,600,980,600";
const DEFAULT_SIGNAL_JSON: &str = "sample_data/signal_timestamps.json";

#[derive(Debug, Parser)]
#[command(name = "redlight", version, about = "Red-light violation detection and records service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run migrations and serve the HTTP API
    Serve,

    /// Create the database schema and exit
    InitDb,

    /// Detect red-light violations in a video file or a directory of frames
    ProcessVideo(ProcessVideoArgs),

    /// Process the bundled sample footage
    AnnotateSample,

    /// Concatenate evidence clips into one GIF or video
    MergeClips(MergeClipsArgs),
}

#[derive(Debug, clap::Args)]
struct ProcessVideoArgs {
    /// Video file, or directory of extracted frames (jpg/png, lexical order)
    #[arg(long)]
    video: PathBuf,

    /// Red light intervals JSON
    #[arg(long, default_value = DEFAULT_SIGNAL_JSON)]
    signal_json: PathBuf,

    /// Stop line as "x1,y1,x2,y2"
    #[arg(long)]
    stop_line: StopLine,

    /// Directory for annotated frames or the annotated video
    #[arg(long, default_value = "output/annotated")]
    output: PathBuf,

    /// Treat every frame as red
    #[arg(long)]
    force_red: bool,

    /// JSON-lines vehicle tracks [default: <VIDEO>/tracks.jsonl, or <VIDEO stem>.tracks.jsonl for a file]
    #[arg(long)]
    tracks: Option<PathBuf>,

    /// Frame rate of the footage [default: the video's own rate, else 30]
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    fps: Option<u32>,

    /// RFC 3339 wall-clock time of the first frame [default: now]
    #[arg(long)]
    video_start: Option<DateTime<Utc>>,
}

#[derive(Debug, clap::Args)]
struct MergeClipsArgs {
    /// Directory that relative clip names are resolved against
    #[arg(long, default_value = "output/clips")]
    clip_dir: PathBuf,

    /// Merged clip path; `.gif` writes a GIF, anything else a video
    #[arg(long, default_value = "output/videos/merged_evidence.gif")]
    output: PathBuf,

    /// Clips to merge, in order
    #[arg(long, num_args(1..), required = true)]
    clips: Vec<PathBuf>,
}

impl ProcessVideoArgs {
    fn into_options(self) -> PipelineOptions {
        PipelineOptions {
            video: self.video,
            signal_json: self.signal_json,
            stop_line: self.stop_line,
            output_dir: self.output,
            force_red: self.force_red,
            tracks: self.tracks,
            fps: self.fps,
            video_start: self.video_start.unwrap_or_else(Utc::now),
            evidence: EvidenceDirs::default(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG, defaults to "info"
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded (location {})", config.location_id);

    match cli.command {
        Command::Serve => serve(&config).await,
        Command::InitDb => init_db(&config).await,
        Command::ProcessVideo(args) => process_video(&config, args.into_options()).await,
        Command::AnnotateSample => annotate_sample(&config).await,
        Command::MergeClips(args) => {
            let clips = video::merge::resolve_clips(&args.clip_dir, &args.clips);
            video::merge::merge_clips(&clips, &args.output)?;
            Ok(())
        }
    }
}

async fn connect(config: &config::Config) -> anyhow::Result<db::DbPool> {
    let pool = db::create_pool(config.require_database_url()?).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    Ok(pool)
}

async fn serve(config: &config::Config) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    let router = app::router(app::AppState::new(pool, config));

    if config.ingest_secret.is_none() {
        tracing::warn!("INGEST_SECRET is not set; violation reports are accepted unsigned");
    }

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router).await?;

    Ok(())
}

async fn init_db(config: &config::Config) -> anyhow::Result<()> {
    connect(config).await?;
    tracing::info!("Database initialized");
    Ok(())
}

async fn process_video(config: &config::Config, options: PipelineOptions) -> anyhow::Result<()> {
    let summary = pipeline::process_video(config, options).await?;
    tracing::info!(
        "Done: {} violations logged out of {} detected",
        summary.violations_logged,
        summary.violations_detected
    );
    Ok(())
}

async fn annotate_sample(config: &config::Config) -> anyhow::Result<()> {
    let Some(footage) = [SAMPLE_VIDEO, SAMPLE_FRAMES]
        .into_iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
    else {
        tracing::error!(
            "Sample footage not found. Place a video at {} or extracted frames in {}",
            SAMPLE_VIDEO,
            SAMPLE_FRAMES
        );
        return Ok(());
    };

    tracing::info!("Starting sample annotation of {}", footage.display());
    let options = PipelineOptions {
        video: footage,
        signal_json: PathBuf::from(DEFAULT_SIGNAL_JSON),
        stop_line: SAMPLE_STOP_LINE.parse()?,
        output_dir: PathBuf::from("output/annotated_demo"),
        force_red: false,
        tracks: None,
        fps: None,
        video_start: Utc::now(),
        evidence: EvidenceDirs::default(),
    };

    process_video(config, options).await?;
    tracing::info!("Sample annotation complete. Check output/annotated_demo and the API for results");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn process_video_defaults() {
        let cli = Cli::try_parse_from([
            "redlight",
            "process-video",
            "--video",
            "frames",
            "--stop-line",
            "0,500,1280,500",
        ])
        .unwrap();

        let Command::ProcessVideo(args) = cli.command else {
            panic!("expected process-video");
        };
        let options = args.into_options();
        assert_eq!(options.signal_json, PathBuf::from(DEFAULT_SIGNAL_JSON));
        assert_eq!(options.output_dir, PathBuf::from("output/annotated"));
        assert_eq!(options.fps, None);
        assert_eq!(options.fps(), 30);
        assert!(!options.force_red);
        assert_eq!(options.stop_line.y1, 500);
        assert_eq!(options.tracks_path(), PathBuf::from("frames/tracks.jsonl"));
    }

    #[test]
    fn fps_override_must_be_positive() {
        let parse = |fps: &str| {
            Cli::try_parse_from([
                "redlight",
                "process-video",
                "--video",
                "cam1.mp4",
                "--stop-line",
                "0,500,1280,500",
                "--fps",
                fps,
            ])
        };
        assert!(parse("0").is_err());

        let Command::ProcessVideo(args) = parse("25").unwrap().command else {
            panic!("expected process-video");
        };
        let options = args.into_options();
        assert_eq!(options.fps(), 25);
        assert_eq!(options.tracks_path(), PathBuf::from("cam1.tracks.jsonl"));
    }

    #[test]
    fn bad_stop_line_is_rejected() {
        let result = Cli::try_parse_from([
            "redlight",
            "process-video",
            "--video",
            "frames",
            "--stop-line",
            "1,2,3",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn video_start_accepts_rfc3339() {
        let cli = Cli::try_parse_from([
            "redlight",
            "process-video",
            "--video",
            "frames",
            "--stop-line",
            "0,1,2,3",
            "--video-start",
            "2025-01-01T08:00:00Z",
            "--force-red",
        ])
        .unwrap();

        let Command::ProcessVideo(args) = cli.command else {
            panic!("expected process-video");
        };
        assert_eq!(
            args.video_start.map(|t| t.to_rfc3339()),
            Some("2025-01-01T08:00:00+00:00".to_string())
        );
        assert!(args.force_red);
    }

    #[test]
    fn merge_clips_needs_clips() {
        assert!(Cli::try_parse_from(["redlight", "merge-clips"]).is_err());

        let cli = Cli::try_parse_from(["redlight", "merge-clips", "--clips", "a.gif", "b.gif"])
            .unwrap();
        let Command::MergeClips(args) = cli.command else {
            panic!("expected merge-clips");
        };
        assert_eq!(args.clips.len(), 2);
        assert_eq!(args.clip_dir, PathBuf::from("output/clips"));
        assert_eq!(args.output, PathBuf::from("output/videos/merged_evidence.gif"));
    }
}
