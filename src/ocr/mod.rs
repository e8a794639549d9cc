//! Licence plate recognition.
//!
//! A primary engine (an HTTP OCR service) is tried first. When it is not
//! configured, or fails at runtime, recognition falls back to tesseract,
//! linked through `leptess`. Results are normalized into a canonical plate
//! string.

pub mod preprocess;
pub mod remote;
pub mod tesseract;

use std::io::Cursor;

use async_trait::async_trait;
use image::{GrayImage, ImageFormat, RgbImage};

use crate::config::{Config, OcrBackend};
use preprocess::preprocess_roi;
use remote::RemoteOcr;
use tesseract::TesseractOcr;

/// Plate text reported when nothing could be read.
pub const UNKNOWN_PLATE: &str = "UNKNOWN";

/// Characters a plate may contain.
pub const PLATE_ALPHABET: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// One text hypothesis from an engine.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct OcrCandidate {
    pub text: String,
    pub confidence: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("failed to encode image: {0}")]
    Encode(#[from] image::ImageError),

    #[error("OCR engine failed: {0}")]
    Engine(String),

    #[error("OCR service request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// A text recognition backend.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Read text from a preprocessed plate image.
    async fn recognize(&self, image: &GrayImage) -> Result<Vec<OcrCandidate>, OcrError>;
}

/// Encode a grayscale image as PNG bytes.
pub(crate) fn encode_png(image: &GrayImage) -> Result<Vec<u8>, OcrError> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// Clean raw OCR output into a canonical plate string.
///
/// Non-alphanumerics are dropped, letters upper-cased, and the usual
/// confusions mapped to digits: `O -> 0`, `I -> 1`, `Z -> 2`.
pub fn normalize_plate(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_uppercase)
        .map(|c| match c {
            'O' => '0',
            'I' => '1',
            'Z' => '2',
            other => other,
        })
        .collect()
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Plate reader arbitrating between the primary engine and tesseract.
pub struct LicensePlateOcr {
    backend: OcrBackend,
    primary: Option<Box<dyn OcrEngine>>,
    fallback: Option<Box<dyn OcrEngine>>,
}

impl LicensePlateOcr {
    /// Build a reader from whichever engines are available.
    ///
    /// A configured backend whose engine is missing degrades to tesseract,
    /// and then to no OCR at all.
    pub fn new(
        configured: OcrBackend,
        primary: Option<Box<dyn OcrEngine>>,
        fallback: Option<Box<dyn OcrEngine>>,
    ) -> Self {
        let mut backend = configured;

        if backend == OcrBackend::Remote && primary.is_none() {
            tracing::warn!("Configured OCR service not available, switching to tesseract");
            backend = OcrBackend::Tesseract;
        }
        if backend == OcrBackend::Tesseract && fallback.is_none() {
            tracing::error!("Neither the OCR service nor tesseract is available. OCR will fail");
            backend = OcrBackend::None;
        }

        Self {
            backend,
            primary,
            fallback,
        }
    }

    /// Set up the engines named by the configuration.
    pub async fn from_config(config: &Config) -> Self {
        let primary = config
            .ocr_service_url
            .as_ref()
            .map(|url| Box::new(RemoteOcr::new(url.clone())) as Box<dyn OcrEngine>);

        let fallback = match TesseractOcr::load(
            config.tesseract_data.clone(),
            config.tesseract_lang.clone(),
        )
        .await
        {
            Ok(tesseract) => {
                tracing::info!("tesseract loaded with language '{}'", config.tesseract_lang);
                Some(Box::new(tesseract) as Box<dyn OcrEngine>)
            }
            Err(e) => {
                tracing::warn!("tesseract not available: {}", e);
                None
            }
        };

        Self::new(config.ocr_backend, primary, fallback)
    }

    /// Backend currently in use.
    pub fn backend(&self) -> OcrBackend {
        self.backend
    }

    /// Read the plate from a vehicle crop.
    ///
    /// Returns the normalized plate and a confidence rounded to three
    /// decimals. A primary engine failure switches this reader to tesseract
    /// for the rest of its life.
    pub async fn run_ocr(&mut self, roi: &RgbImage) -> (String, f64) {
        let processed = match (self.backend, preprocess_roi(roi)) {
            (OcrBackend::None, _) | (_, None) => {
                tracing::warn!("OCR backend is not available or input image is empty");
                return (UNKNOWN_PLATE.to_string(), 0.0);
            }
            (_, Some(processed)) => processed,
        };

        let mut text: Option<String> = None;
        let mut confidence = 0.0;

        if self.backend == OcrBackend::Remote {
            if let Some(ref primary) = self.primary {
                match primary.recognize(&processed).await {
                    Ok(candidates) => {
                        if let Some(best) = candidates
                            .into_iter()
                            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
                        {
                            tracing::debug!(
                                "{} result: {} (conf {:.2})",
                                primary.name(),
                                best.text,
                                best.confidence
                            );
                            text = Some(best.text);
                            confidence = best.confidence;
                        }
                    }
                    Err(e) => {
                        tracing::error!(
                            "{} failed: {}. Falling back to tesseract",
                            primary.name(),
                            e
                        );
                        self.backend = OcrBackend::Tesseract;
                    }
                }
            }
        }

        if self.backend == OcrBackend::Tesseract {
            if let Some(ref fallback) = self.fallback {
                match fallback.recognize(&processed).await {
                    Ok(candidates) => {
                        if let Some(first) = candidates
                            .into_iter()
                            .find(|c| !c.text.trim().is_empty())
                        {
                            tracing::debug!(
                                "{} fallback result: {} (conf {:.2})",
                                fallback.name(),
                                first.text,
                                first.confidence
                            );
                            text = Some(first.text.trim().to_string());
                            confidence = first.confidence;
                        }
                    }
                    Err(e) => tracing::error!("{} fallback failed: {}", fallback.name(), e),
                }
            }
        }

        match text.map(|t| normalize_plate(&t)).filter(|p| !p.is_empty()) {
            Some(plate) => (plate, round3(confidence)),
            None => (UNKNOWN_PLATE.to_string(), 0.0),
        }
    }
}
