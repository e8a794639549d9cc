//! Plate crop preprocessing ahead of OCR.

use image::{GrayImage, Luma, RgbImage};
use imageproc::filter::gaussian_blur_f32;

/// Sigma matching a 5x5 Gaussian kernel.
const BLUR_SIGMA: f32 = 1.1;
/// Sigma matching the 11x11 neighbourhood used for the local threshold.
const THRESHOLD_SIGMA: f32 = 2.0;
/// Offset subtracted from the local mean.
const THRESHOLD_C: f32 = 2.0;

/// Grayscale, denoise and binarize a vehicle or plate crop.
///
/// Output is inverted: dark strokes on a light plate come out white.
/// Returns `None` for an empty crop.
pub fn preprocess_roi(roi: &RgbImage) -> Option<GrayImage> {
    if roi.width() == 0 || roi.height() == 0 {
        return None;
    }

    let gray = image::imageops::grayscale(roi);
    let blurred = gaussian_blur_f32(&gray, BLUR_SIGMA);
    Some(adaptive_threshold_inv(&blurred))
}

/// Inverse binary threshold against a Gaussian-weighted local mean.
fn adaptive_threshold_inv(image: &GrayImage) -> GrayImage {
    let local_mean = gaussian_blur_f32(image, THRESHOLD_SIGMA);

    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let value = image.get_pixel(x, y).0[0] as f32;
        let threshold = local_mean.get_pixel(x, y).0[0] as f32 - THRESHOLD_C;
        if value > threshold { Luma([0]) } else { Luma([255]) }
    })
}
