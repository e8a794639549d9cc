//! Offline violation detection over recorded footage.
//!
//! # Flow
//!
//! For every frame:
//! 1. Look up tracked vehicles and whether the signal was red
//! 2. Update track histories and check for stop-line crossings
//! 3. On a new violation: read the plate, price the fine, save a snapshot
//!    and start a clip
//! 4. Write the annotated frame (or video frame) and feed the clip recorder
//! 5. Report each violation to the API once its clip is written

pub mod client;

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Local, Utc};
use image::RgbImage;

use crate::config::Config;
use crate::detection::detector::{RedLightDetector, ViolationEvent};
use crate::detection::geometry::StopLine;
use crate::detection::tracker::{TrackFile, VehicleTracker};
use crate::error::PipelineError;
use crate::models::violation::CreateViolationRequest;
use crate::ocr::LicensePlateOcr;
use crate::services::profiler::{FinePolicy, LocationFactors, calculate_smart_fine};
use crate::signal::{RedInterval, is_within_red_interval, load_signal_intervals};
use crate::video::container::{DEFAULT_FPS, VideoFileWriter};
use crate::video::evidence::{ClipRecorder, EvidenceDirs, FinishedClip, clip_path, save_snapshot};
use crate::video::frames::FrameSource;

pub use client::{ApiClient, ViolationApi};

/// Image path recorded when the snapshot could not be written.
pub const FAILED_SNAPSHOT: &str = "Failed to save image";

const PROGRESS_EVERY: usize = 100;

/// File stem of the annotated video written for video input. The extension
/// follows the input, `mp4` when it has none.
pub const ANNOTATED_VIDEO: &str = "annotated_video";

/// Inputs of one `process-video` run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Video file or directory of extracted frames
    pub video: PathBuf,
    pub signal_json: PathBuf,
    pub stop_line: StopLine,
    /// Where annotated frames, or the annotated video, are written
    pub output_dir: PathBuf,
    /// Treat every frame as red
    pub force_red: bool,
    /// JSON-lines track file, defaults to `<video>/tracks.jsonl` for a
    /// directory and `<video stem>.tracks.jsonl` for a file
    pub tracks: Option<PathBuf>,
    /// Frame rate override. Falls back to the container rate, then 30.
    pub fps: Option<u32>,
    /// Wall-clock time of frame 0
    pub video_start: DateTime<Utc>,
    pub evidence: EvidenceDirs,
}

impl PipelineOptions {
    pub fn tracks_path(&self) -> PathBuf {
        if let Some(ref tracks) = self.tracks {
            return tracks.clone();
        }
        if self.video.extension().is_some() && !self.video.is_dir() {
            self.video.with_extension("tracks.jsonl")
        } else {
            self.video.join("tracks.jsonl")
        }
    }

    pub fn fps(&self) -> u32 {
        self.fps.unwrap_or(DEFAULT_FPS).max(1)
    }

    /// Wall-clock time of `frame_index`.
    pub fn frame_time(&self, frame_index: usize) -> DateTime<Utc> {
        let micros = frame_index as i64 * 1_000_000 / i64::from(self.fps());
        self.video_start + Duration::microseconds(micros)
    }
}

/// Counts reported at the end of a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSummary {
    pub frames: usize,
    pub violations_detected: usize,
    pub violations_logged: usize,
}

/// A violation waiting for its clip before being reported.
#[derive(Debug)]
struct PendingReport {
    track_id: i64,
    report: CreateViolationRequest,
}

/// Where annotated frames go: numbered JPEGs for a frame directory, one
/// video for video input.
enum AnnotatedOutput {
    Frames(PathBuf),
    Video {
        path: PathBuf,
        fps: u32,
        writer: Option<VideoFileWriter>,
    },
}

impl AnnotatedOutput {
    fn new(output_dir: &Path, input: &Path, frames: &FrameSource, fps: u32) -> Self {
        if frames.is_video() {
            let extension = input.extension().unwrap_or(OsStr::new("mp4"));
            Self::Video {
                path: output_dir.join(ANNOTATED_VIDEO).with_extension(extension),
                fps,
                writer: None,
            }
        } else {
            Self::Frames(output_dir.to_path_buf())
        }
    }

    fn write(&mut self, index: usize, frame: &RgbImage) -> Result<(), PipelineError> {
        match self {
            Self::Frames(dir) => frame.save(dir.join(format!("frame_{:06}.jpg", index)))?,
            Self::Video { path, fps, writer } => {
                // sized by the first frame
                if writer.is_none() {
                    *writer = Some(VideoFileWriter::create(
                        path,
                        f64::from(*fps),
                        frame.width(),
                        frame.height(),
                    )?);
                }
                if let Some(writer) = writer.as_mut() {
                    writer.write(frame)?;
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<(), PipelineError> {
        if let Self::Video {
            path,
            writer: Some(writer),
            ..
        } = self
        {
            let frames = writer.finish()?;
            tracing::info!("Annotated video saved to {} ({} frames)", path.display(), frames);
        }
        Ok(())
    }
}

/// Red-light detection over a frame sequence.
pub struct Pipeline<T, A> {
    options: PipelineOptions,
    intervals: Vec<RedInterval>,
    fines: FinePolicy,
    location: LocationFactors,
    detector: RedLightDetector,
    tracker: T,
    ocr: LicensePlateOcr,
    api: A,
    reported: HashSet<i64>,
    summary: PipelineSummary,
}

impl<T: VehicleTracker, A: ViolationApi> Pipeline<T, A> {
    pub fn new(
        options: PipelineOptions,
        fines: FinePolicy,
        location: LocationFactors,
        tracker: T,
        ocr: LicensePlateOcr,
        api: A,
    ) -> Self {
        let intervals = if options.force_red {
            Vec::new()
        } else {
            load_signal_intervals(&options.signal_json)
        };
        Self {
            options,
            intervals,
            fines,
            location,
            detector: RedLightDetector::new(),
            tracker,
            ocr,
            api,
            reported: HashSet::new(),
            summary: PipelineSummary::default(),
        }
    }

    /// Process every frame of `frames`.
    pub async fn run(mut self, frames: &mut FrameSource) -> Result<PipelineSummary, PipelineError> {
        let output_dir = self.options.output_dir.clone();
        std::fs::create_dir_all(&output_dir).map_err(|e| PipelineError::io(&output_dir, e))?;

        let total = frames.len();
        let fps = self.options.fps();
        let mut recorder = ClipRecorder::new(fps);
        let mut output = AnnotatedOutput::new(&output_dir, &self.options.video, frames, fps);

        while let Some((index, frame)) = frames.next_frame()? {
            let annotated = self.process_frame(index, &frame, &mut recorder).await;
            output.write(index, &annotated)?;

            for clip in recorder.push(index, annotated) {
                self.report(clip).await;
            }

            self.summary.frames += 1;
            if (index + 1) % PROGRESS_EVERY == 0 {
                tracing::info!("Processed {}/{} frames", index + 1, total);
            }
        }

        for clip in recorder.finish() {
            self.report(clip).await;
        }
        output.finish()?;

        tracing::info!(
            "Processing complete: {} frames, {} violations detected, {} logged",
            self.summary.frames,
            self.summary.violations_detected,
            self.summary.violations_logged
        );
        Ok(self.summary)
    }

    async fn process_frame(
        &mut self,
        index: usize,
        frame: &RgbImage,
        recorder: &mut ClipRecorder<PendingReport>,
    ) -> RgbImage {
        let at = self.options.frame_time(index);
        let is_red = self.options.force_red || is_within_red_interval(at, &self.intervals);
        let vehicles = self.tracker.track(index);

        let outcome =
            self.detector
                .process_frame(frame, index, &self.options.stop_line, is_red, &vehicles);

        if let Some(event) = outcome.violation {
            if self.reported.insert(event.track_id) {
                self.summary.violations_detected += 1;
                let report = self.build_report(&event, at, &outcome.annotated).await;
                let path = clip_path(
                    &self.options.evidence.clips,
                    report.vehicle_plate.as_deref().unwrap_or_default(),
                    at,
                );
                recorder.schedule(
                    index,
                    path,
                    PendingReport {
                        track_id: event.track_id,
                        report,
                    },
                );
            }
        }

        outcome.annotated
    }

    /// Read the plate, price the fine and save the snapshot.
    async fn build_report(
        &mut self,
        event: &ViolationEvent,
        at: DateTime<Utc>,
        annotated: &RgbImage,
    ) -> CreateViolationRequest {
        let (plate, confidence) = self.ocr.run_ocr(&event.roi).await;

        let prior_violations = match self.api.fetch_profile(&plate).await {
            Ok(Some(profile)) => profile.total_violations,
            Ok(None) => 0,
            Err(e) => {
                tracing::error!("Could not fetch driver profile for {}: {}", plate, e);
                0
            }
        };
        let fine = calculate_smart_fine(
            &self.fines,
            prior_violations,
            &self.location,
            at.with_timezone(&Local).time(),
        );

        tracing::warn!(
            "VIOLATION track {} frame {} at {:?} box {:?}: plate {} (conf {:.2}), {} prior, fine {:.2}",
            event.track_id,
            event.frame_index,
            event.anchor,
            event.bbox,
            plate,
            confidence,
            prior_violations,
            fine
        );

        let image_path = match save_snapshot(&self.options.evidence.images, &plate, at, annotated) {
            Ok(path) => path.display().to_string(),
            Err(e) => {
                tracing::error!("Failed to save snapshot for {}: {}", plate, e);
                FAILED_SNAPSHOT.to_string()
            }
        };

        CreateViolationRequest {
            vehicle_plate: Some(plate),
            fine_amount: Some(fine),
            image_path: Some(image_path),
            video_clip_path: None,
            ocr_confidence: Some(confidence),
        }
    }

    async fn report(&mut self, clip: FinishedClip<PendingReport>) {
        let FinishedClip {
            ticket: PendingReport {
                track_id,
                mut report,
            },
            clip_path,
            ..
        } = clip;
        report.video_clip_path = Some(clip_path);

        match self.api.submit_violation(&report).await {
            Ok(created) => {
                self.summary.violations_logged += 1;
                tracing::info!(
                    "Violation {} logged for track {} ({})",
                    created.violation_id,
                    track_id,
                    report.vehicle_plate.as_deref().unwrap_or_default()
                );
            }
            Err(e) => tracing::error!("Failed to log violation for track {}: {}", track_id, e),
        }
    }
}

/// Run the pipeline with the configured OCR engines, the track file and the
/// HTTP API.
pub async fn process_video(
    config: &Config,
    mut options: PipelineOptions,
) -> Result<PipelineSummary, PipelineError> {
    let mut frames = FrameSource::open(&options.video)?;
    if options.fps.is_none() {
        options.fps = frames.fps();
    }
    let tracker = TrackFile::open(&options.tracks_path())?;
    let ocr = LicensePlateOcr::from_config(config).await;
    let api = ApiClient::from_config(config)?;

    tracing::info!(
        "Processing {} frames from {} at {} fps (OCR backend: {:?})",
        frames.len(),
        options.video.display(),
        options.fps(),
        ocr.backend()
    );

    let location = LocationFactors {
        is_school_zone: config.location_is_school_zone,
    };
    Pipeline::new(options, config.fine_policy(), location, tracker, ocr, api)
        .run(&mut frames)
        .await
}
