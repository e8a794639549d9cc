//! Video files read and written through OpenCV.

use std::path::Path;

use image::RgbImage;
use opencv::core::{self, Mat, Scalar, Size};
use opencv::imgproc::{self, COLOR_BGR2RGB, COLOR_RGB2BGR};
use opencv::prelude::*;
use opencv::videoio::{
    CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_COUNT, VideoCapture, VideoWriter,
};

use crate::error::PipelineError;

/// Frame rate assumed when neither the container nor the caller gives one.
pub const DEFAULT_FPS: u32 = 30;

fn path_str(path: &Path) -> Result<&str, PipelineError> {
    path.to_str().ok_or_else(|| {
        PipelineError::Video(opencv::Error::new(
            core::StsBadArg,
            format!("non UTF-8 path {}", path.display()),
        ))
    })
}

/// Decoded video file, read front to back.
pub struct VideoFile {
    capture: VideoCapture,
    fps: Option<f64>,
    frame_count: usize,
}

impl VideoFile {
    pub fn open(path: &Path) -> Result<Self, PipelineError> {
        let capture = VideoCapture::from_file(path_str(path)?, CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(PipelineError::NoFrames(path.display().to_string()));
        }

        let fps = Some(capture.get(CAP_PROP_FPS)?).filter(|fps| fps.is_finite() && *fps > 0.0);
        let frame_count = capture.get(CAP_PROP_FRAME_COUNT)?.max(0.0) as usize;

        tracing::info!(
            "Opened video {} ({} frames, {:?} fps)",
            path.display(),
            frame_count,
            fps
        );
        Ok(Self {
            capture,
            fps,
            frame_count,
        })
    }

    /// Frame rate stored in the container, if it carries one.
    pub fn fps(&self) -> Option<f64> {
        self.fps
    }

    /// Frame count reported by the container. Some formats only estimate it.
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Next frame as RGB, `None` at the end of the stream.
    pub fn read(&mut self) -> Result<Option<RgbImage>, PipelineError> {
        let mut bgr = Mat::default();
        if !self.capture.read(&mut bgr)? || bgr.empty() {
            return Ok(None);
        }
        mat_to_rgb(&bgr).map(Some)
    }
}

fn mat_to_rgb(bgr: &Mat) -> Result<RgbImage, PipelineError> {
    let mut rgb = Mat::default();
    imgproc::cvt_color(bgr, &mut rgb, COLOR_BGR2RGB, 0)?;

    let size = rgb.size()?;
    let bytes = rgb.data_bytes()?.to_vec();
    RgbImage::from_raw(size.width as u32, size.height as u32, bytes).ok_or_else(|| {
        PipelineError::Video(opencv::Error::new(
            core::StsUnmatchedSizes,
            format!("frame is not 8-bit RGB ({}x{})", size.width, size.height),
        ))
    })
}

fn rgb_to_mat(frame: &RgbImage) -> Result<Mat, PipelineError> {
    let mut rgb = Mat::new_rows_cols_with_default(
        frame.height() as i32,
        frame.width() as i32,
        core::CV_8UC3,
        Scalar::all(0.0),
    )?;
    rgb.data_bytes_mut()?.copy_from_slice(frame.as_raw());

    let mut bgr = Mat::default();
    imgproc::cvt_color(&rgb, &mut bgr, COLOR_RGB2BGR, 0)?;
    Ok(bgr)
}

/// FourCC for `path`: Motion JPEG for `.avi`, MPEG-4 otherwise.
fn fourcc_for(path: &Path) -> Result<i32, PipelineError> {
    let avi = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("avi"));
    let code = if avi {
        VideoWriter::fourcc('M', 'J', 'P', 'G')?
    } else {
        VideoWriter::fourcc('m', 'p', '4', 'v')?
    };
    Ok(code)
}

/// Video file written frame by frame.
///
/// The frame size is fixed by the first frame. Frames of another size are
/// resized to it.
pub struct VideoFileWriter {
    writer: VideoWriter,
    size: Size,
    frames: usize,
}

impl VideoFileWriter {
    pub fn create(path: &Path, fps: f64, width: u32, height: u32) -> Result<Self, PipelineError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }

        let size = Size::new(width as i32, height as i32);
        let writer = VideoWriter::new(path_str(path)?, fourcc_for(path)?, fps, size, true)?;
        if !writer.is_opened()? {
            return Err(PipelineError::Video(opencv::Error::new(
                core::StsError,
                format!("could not open video writer for {}", path.display()),
            )));
        }

        tracing::info!(
            "Writing video {} ({}x{} at {:.2} fps)",
            path.display(),
            width,
            height,
            fps
        );
        Ok(Self {
            writer,
            size,
            frames: 0,
        })
    }

    pub fn write(&mut self, frame: &RgbImage) -> Result<(), PipelineError> {
        let bgr = rgb_to_mat(frame)?;
        if bgr.size()? == self.size {
            self.writer.write(&bgr)?;
        } else {
            let mut resized = Mat::default();
            imgproc::resize(&bgr, &mut resized, self.size, 0.0, 0.0, imgproc::INTER_LINEAR)?;
            self.writer.write(&resized)?;
        }
        self.frames += 1;
        Ok(())
    }

    /// Flush and close the file. Returns the number of frames written.
    pub fn finish(mut self) -> Result<usize, PipelineError> {
        self.writer.release()?;
        Ok(self.frames)
    }
}
