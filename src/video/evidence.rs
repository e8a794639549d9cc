//! Violation evidence: snapshot images and short GIF clips.

use std::collections::VecDeque;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, DynamicImage, Frame, RgbImage};

use crate::error::PipelineError;

/// Clip path recorded when a clip could not be written.
pub const FAILED_CLIP: &str = "Failed to save clip";

/// Length of an evidence clip.
pub const CLIP_SECONDS: usize = 3;

/// Where snapshots and clips are written.
#[derive(Debug, Clone)]
pub struct EvidenceDirs {
    pub images: PathBuf,
    pub clips: PathBuf,
}

impl Default for EvidenceDirs {
    fn default() -> Self {
        Self::under(Path::new("output"))
    }
}

impl EvidenceDirs {
    /// `images/` and `clips/` below `root`.
    pub fn under(root: &Path) -> Self {
        Self {
            images: root.join("images"),
            clips: root.join("clips"),
        }
    }
}

pub fn snapshot_path(dir: &Path, plate: &str, at: DateTime<Utc>) -> PathBuf {
    dir.join(format!("{}_{}.jpg", plate, at.format("%Y%m%d_%H%M%S_%3f")))
}

pub fn clip_path(dir: &Path, plate: &str, at: DateTime<Utc>) -> PathBuf {
    dir.join(format!("{}_{}.gif", plate, at.format("%Y%m%d_%H%M%S")))
}

/// Save the violation frame as a JPEG under `dir`.
pub fn save_snapshot(
    dir: &Path,
    plate: &str,
    at: DateTime<Utc>,
    frame: &RgbImage,
) -> Result<PathBuf, PipelineError> {
    std::fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e))?;
    let path = snapshot_path(dir, plate, at);
    frame.save(&path)?;
    Ok(path)
}

/// Write `frames` as a looping GIF, creating parent directories.
/// Returns the number of frames written.
pub fn encode_gif<I>(path: &Path, frames: I) -> Result<usize, PipelineError>
where
    I: IntoIterator<Item = Frame>,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;

    let mut encoder = GifEncoder::new(BufWriter::new(file));
    encoder.set_repeat(Repeat::Infinite)?;

    let mut written = 0;
    for frame in frames {
        encoder.encode_frame(frame)?;
        written += 1;
    }
    Ok(written)
}

fn to_gif_frame(frame: RgbImage, delay: Delay) -> Frame {
    Frame::from_parts(DynamicImage::ImageRgb8(frame).into_rgba8(), 0, 0, delay)
}

struct PendingClip<T> {
    end_frame: usize,
    path: PathBuf,
    frames: Vec<RgbImage>,
    ticket: T,
}

/// A clip that has been written, or failed to be.
#[derive(Debug)]
pub struct FinishedClip<T> {
    pub ticket: T,
    /// Path of the GIF, or [`FAILED_CLIP`]
    pub clip_path: String,
    pub frame_count: usize,
}

/// Collects frames around violations and writes each clip once its window
/// is complete.
///
/// A clip covers `fps * 1.5` frames either side of the violation frame.
/// Earlier frames come from a rolling buffer holding at most that many
/// frames. `T` is carried through untouched so the caller can pair the
/// finished clip with its violation.
pub struct ClipRecorder<T> {
    fps: u32,
    half_window: usize,
    buffer: VecDeque<RgbImage>,
    pending: Vec<PendingClip<T>>,
}

impl<T> ClipRecorder<T> {
    pub fn new(fps: u32) -> Self {
        let fps = fps.max(1);
        Self {
            fps,
            half_window: fps as usize * CLIP_SECONDS / 2,
            buffer: VecDeque::new(),
            pending: Vec::new(),
        }
    }

    /// Frames kept either side of a violation.
    #[cfg(test)]
    pub fn half_window(&self) -> usize {
        self.half_window
    }

    /// Clips still waiting for frames.
    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Start a clip for a violation at `frame_index`.
    ///
    /// Call before pushing that frame, so the buffer holds only earlier ones.
    pub fn schedule(&mut self, frame_index: usize, path: PathBuf, ticket: T) {
        self.pending.push(PendingClip {
            end_frame: frame_index + self.half_window,
            path,
            frames: self.buffer.iter().cloned().collect(),
            ticket,
        });
    }

    /// Add a frame, returning clips whose window ends here.
    pub fn push(&mut self, frame_index: usize, frame: RgbImage) -> Vec<FinishedClip<T>> {
        for clip in &mut self.pending {
            clip.frames.push(frame.clone());
        }

        self.buffer.push_back(frame);
        while self.buffer.len() > self.half_window {
            self.buffer.pop_front();
        }

        let (done, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|clip| clip.end_frame <= frame_index);
        self.pending = waiting;

        done.into_iter().map(|clip| self.write(clip)).collect()
    }

    /// Write every pending clip with the frames collected so far.
    pub fn finish(&mut self) -> Vec<FinishedClip<T>> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|clip| self.write(clip))
            .collect()
    }

    fn write(&self, clip: PendingClip<T>) -> FinishedClip<T> {
        let delay = Delay::from_numer_denom_ms(1000, self.fps);
        let frame_count = clip.frames.len();
        let frames = clip
            .frames
            .into_iter()
            .map(|frame| to_gif_frame(frame, delay));

        let clip_path = match encode_gif(&clip.path, frames) {
            Ok(_) => {
                tracing::info!(
                    "Saved clip {} ({} frames)",
                    clip.path.display(),
                    frame_count
                );
                clip.path.display().to_string()
            }
            Err(e) => {
                tracing::error!("Failed to write clip {}: {}", clip.path.display(), e);
                FAILED_CLIP.to_string()
            }
        };

        FinishedClip {
            ticket: clip.ticket,
            clip_path,
            frame_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::frames::tests::scratch_dir;
    use chrono::TimeZone;
    use image::AnimationDecoder;
    use image::codecs::gif::GifDecoder;
    use std::io::BufReader;

    fn shade(n: usize) -> RgbImage {
        let v = (n * 20) as u8;
        RgbImage::from_pixel(8, 6, image::Rgb([v, 255 - v, v / 2]))
    }

    fn count_gif_frames(path: &Path) -> usize {
        let reader = BufReader::new(File::open(path).unwrap());
        GifDecoder::new(reader)
            .unwrap()
            .into_frames()
            .collect_frames()
            .unwrap()
            .len()
    }

    #[test]
    fn evidence_names_carry_plate_and_time() {
        let at = Utc
            .with_ymd_and_hms(2025, 1, 1, 8, 0, 12)
            .unwrap()
            .checked_add_signed(chrono::Duration::milliseconds(345))
            .unwrap();
        let dir = Path::new("output/images");

        assert_eq!(
            snapshot_path(dir, "ABC1234", at),
            Path::new("output/images/ABC1234_20250101_080012_345.jpg")
        );
        assert_eq!(
            clip_path(Path::new("output/clips"), "ABC1234", at),
            Path::new("output/clips/ABC1234_20250101_080012.gif")
        );
    }

    #[test]
    fn snapshot_is_written() {
        let dir = scratch_dir("snapshot").join("images");
        let path = save_snapshot(&dir, "XY123", Utc::now(), &shade(1)).unwrap();

        assert!(path.exists());
        assert_eq!(image::open(&path).unwrap().width(), 8);

        std::fs::remove_dir_all(dir.parent().unwrap()).unwrap();
    }

    #[test]
    fn clip_spans_window_around_violation() {
        let dir = scratch_dir("clip");
        let path = dir.join("clips").join("clip.gif");
        let mut recorder = ClipRecorder::new(2);
        assert_eq!(recorder.half_window(), 3);

        let mut finished = Vec::new();
        for i in 0..12 {
            if i == 5 {
                recorder.schedule(i, path.clone(), "violation-5");
            }
            finished.extend(recorder.push(i, shade(i)));
            if (5..8).contains(&i) {
                assert_eq!(recorder.pending(), 1, "clip closed early at frame {i}");
            }
        }

        assert_eq!(finished.len(), 1);
        let clip = &finished[0];
        assert_eq!(clip.ticket, "violation-5");
        assert_eq!(clip.frame_count, 7);
        assert_eq!(clip.clip_path, path.display().to_string());
        assert_eq!(count_gif_frames(&path), 7);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn early_violation_uses_available_history() {
        let dir = scratch_dir("clip-early");
        let mut recorder = ClipRecorder::new(2);

        recorder.push(0, shade(0));
        recorder.schedule(1, dir.join("a.gif"), 1);
        let mut finished = Vec::new();
        for i in 1..6 {
            finished.extend(recorder.push(i, shade(i)));
        }

        // frames 0 to 4: one frame of history plus the violation and three after
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].frame_count, 5);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn stream_end_flushes_partial_clips() {
        let dir = scratch_dir("clip-flush");
        let mut recorder = ClipRecorder::new(30);

        for i in 0..10 {
            if i == 8 {
                recorder.schedule(i, dir.join("late.gif"), ());
            }
            assert!(recorder.push(i, shade(i)).is_empty());
        }

        let finished = recorder.finish();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].frame_count, 10);
        assert_eq!(recorder.pending(), 0);
        assert_eq!(count_gif_frames(&dir.join("late.gif")), 10);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn unwritable_clip_is_marked_failed() {
        let dir = scratch_dir("clip-fail");
        // a file where the clips directory should be
        let blocker = dir.join("clips");
        std::fs::write(&blocker, "not a directory").unwrap();

        let mut recorder = ClipRecorder::new(2);
        recorder.schedule(0, blocker.join("x.gif"), ());
        recorder.push(0, shade(0));
        let finished = recorder.finish();

        assert_eq!(finished[0].clip_path, FAILED_CLIP);

        std::fs::remove_dir_all(dir).unwrap();
    }
}
