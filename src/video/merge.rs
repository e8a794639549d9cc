//! Concatenate evidence clips into one GIF or video.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, Delay, DynamicImage, Frame, RgbImage};

use super::container::{DEFAULT_FPS, VideoFile, VideoFileWriter};
use super::evidence::encode_gif;
use crate::error::PipelineError;

/// Resolve clip names against `clip_dir`. Absolute paths and paths that
/// already exist as given are kept.
pub fn resolve_clips(clip_dir: &Path, clips: &[PathBuf]) -> Vec<PathBuf> {
    clips
        .iter()
        .map(|clip| {
            if clip.is_absolute() || clip.exists() {
                clip.clone()
            } else {
                clip_dir.join(clip)
            }
        })
        .collect()
}

fn is_gif(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gif"))
}

/// Decoded frames of one clip and its frame rate, when known.
struct Clip {
    frames: Vec<RgbImage>,
    fps: Option<f64>,
}

fn load_gif(path: &Path) -> Result<Clip, PipelineError> {
    let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
    let decoder = GifDecoder::new(BufReader::new(file))?;
    let frames = decoder.into_frames().collect_frames()?;

    let fps = frames.first().and_then(|frame| {
        let (numer, denom) = frame.delay().numer_denom_ms();
        (numer > 0).then(|| f64::from(denom) * 1000.0 / f64::from(numer))
    });
    let frames = frames
        .into_iter()
        .map(|frame| DynamicImage::ImageRgba8(frame.into_buffer()).into_rgb8())
        .collect();
    Ok(Clip { frames, fps })
}

fn load_video(path: &Path) -> Result<Clip, PipelineError> {
    let mut video = VideoFile::open(path)?;
    let mut frames = Vec::new();
    while let Some(frame) = video.read()? {
        frames.push(frame);
    }
    Ok(Clip {
        frames,
        fps: video.fps(),
    })
}

fn load_clip(path: &Path) -> Result<Clip, PipelineError> {
    if is_gif(path) { load_gif(path) } else { load_video(path) }
}

fn write_merged(output: &Path, frames: Vec<RgbImage>, fps: f64) -> Result<usize, PipelineError> {
    if is_gif(output) {
        let delay = Delay::from_numer_denom_ms(1000, fps.round().max(1.0) as u32);
        let frames = frames.into_iter().map(|frame| {
            Frame::from_parts(DynamicImage::ImageRgb8(frame).into_rgba8(), 0, 0, delay)
        });
        return encode_gif(output, frames);
    }

    let (width, height) = frames[0].dimensions();
    let mut writer = VideoFileWriter::create(output, fps, width, height)?;
    for frame in &frames {
        writer.write(frame)?;
    }
    writer.finish()
}

/// Append the frames of every clip in `clips`, in order, into `output`.
///
/// Clips may be GIFs or video files. The output is a GIF when `output` ends
/// in `.gif` and a video otherwise, at the frame rate of the first clip.
/// Clips that are missing or cannot be decoded are skipped with a warning.
/// Returns the number of frames written.
pub fn merge_clips(clips: &[PathBuf], output: &Path) -> Result<usize, PipelineError> {
    let mut frames = Vec::new();
    let mut fps = None;
    let mut merged = 0;

    for clip in clips {
        if !clip.exists() {
            tracing::warn!("Clip {} not found, skipping", clip.display());
            continue;
        }
        match load_clip(clip) {
            Ok(loaded) if loaded.frames.is_empty() => {
                tracing::warn!("Clip {} has no frames, skipping", clip.display());
            }
            Ok(loaded) => {
                tracing::debug!("Loaded {} frames from {}", loaded.frames.len(), clip.display());
                fps = fps.or(loaded.fps);
                frames.extend(loaded.frames);
                merged += 1;
            }
            Err(e) => tracing::warn!("Could not read clip {}: {}", clip.display(), e),
        }
    }

    if frames.is_empty() {
        return Err(PipelineError::NoClips);
    }

    let written = write_merged(output, frames, fps.unwrap_or(f64::from(DEFAULT_FPS)))?;
    tracing::info!(
        "Merged {} clips ({} frames) into {}",
        merged,
        written,
        output.display()
    );
    Ok(written)
}
