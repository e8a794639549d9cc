//! Frame input: a video file or a directory of extracted images.

use std::path::{Path, PathBuf};

use image::RgbImage;

use super::container::VideoFile;
use crate::error::PipelineError;

const FRAME_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Frames in playback order.
///
/// Directory frames are taken in lexical order, so names should be
/// zero-padded (`000001.jpg`, `000002.jpg`, ...).
pub enum FrameSource {
    Directory { paths: Vec<PathBuf>, next: usize },
    Video { video: VideoFile, next: usize },
}

impl FrameSource {
    /// Open `path` as a video file, or list the frames in it when it is a
    /// directory. A missing path or a directory without any image files is
    /// an error.
    pub fn open(path: &Path) -> Result<Self, PipelineError> {
        if path.is_file() {
            let video = VideoFile::open(path)?;
            return Ok(Self::Video { video, next: 0 });
        }

        let entries = std::fs::read_dir(path).map_err(|e| PipelineError::io(path, e))?;

        let mut paths = Vec::new();
        for entry in entries {
            let file = entry.map_err(|e| PipelineError::io(path, e))?.path();
            if file.is_file() && is_frame_file(&file) {
                paths.push(file);
            }
        }

        if paths.is_empty() {
            return Err(PipelineError::NoFrames(path.display().to_string()));
        }
        paths.sort();

        tracing::info!("Found {} frames in {}", paths.len(), path.display());
        Ok(Self::Directory { paths, next: 0 })
    }

    /// Number of frames. For video files this is the container's count.
    pub fn len(&self) -> usize {
        match self {
            Self::Directory { paths, .. } => paths.len(),
            Self::Video { video, .. } => video.frame_count(),
        }
    }

    /// Frame rate of a video container, rounded. Directories carry none.
    pub fn fps(&self) -> Option<u32> {
        match self {
            Self::Directory { .. } => None,
            Self::Video { video, .. } => video.fps().map(|fps| fps.round().max(1.0) as u32),
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Self::Video { .. })
    }

    /// Decode the next frame, paired with its index. `None` once every frame
    /// has been read.
    pub fn next_frame(&mut self) -> Result<Option<(usize, RgbImage)>, PipelineError> {
        match self {
            Self::Directory { paths, next } => {
                let Some(path) = paths.get(*next) else {
                    return Ok(None);
                };
                let frame = image::open(path)?.into_rgb8();
                *next += 1;
                Ok(Some((*next - 1, frame)))
            }
            Self::Video { video, next } => match video.read()? {
                Some(frame) => {
                    *next += 1;
                    Ok(Some((*next - 1, frame)))
                }
                None => Ok(None),
            },
        }
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}
