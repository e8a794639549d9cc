//! Local tesseract fallback engine, through `leptess`.

use std::ffi::CString;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::GrayImage;
use leptess::tesseract::TessApi;

use super::{OcrCandidate, OcrEngine, OcrError, PLATE_ALPHABET};

/// Tesseract does not report a usable line confidence in this mode.
pub const TESSERACT_CONFIDENCE: f64 = 0.7;

/// Single text line.
const PAGESEG_SINGLE_LINE: &str = "7";

/// A tesseract handle. Only ever reached through the mutex in
/// [`TesseractOcr`], so tesseract sees one caller at a time.
struct Engine(TessApi);

// SAFETY: TessApi owns its tesseract instance and has no thread affinity.
// Access is serialized by the surrounding Mutex.
unsafe impl Send for Engine {}

fn engine_error(e: impl std::fmt::Display) -> OcrError {
    OcrError::Engine(e.to_string())
}

fn set_variable(api: &mut TessApi, name: &str, value: &str) -> Result<(), OcrError> {
    let name = CString::new(name).map_err(engine_error)?;
    let value = CString::new(value).map_err(engine_error)?;
    api.raw.set_variable(&name, &value).map_err(engine_error)
}

impl Engine {
    fn init(data_path: Option<&str>, lang: &str) -> Result<Self, OcrError> {
        let mut api = TessApi::new(data_path, lang).map_err(engine_error)?;
        set_variable(&mut api, "tessedit_char_whitelist", PLATE_ALPHABET)?;
        set_variable(&mut api, "tessedit_pageseg_mode", PAGESEG_SINGLE_LINE)?;
        Ok(Self(api))
    }

    fn read_line(&mut self, image: &GrayImage) -> Result<String, OcrError> {
        let (width, height) = (image.width() as i32, image.height() as i32);
        // 8-bit gray, rows packed
        self.0
            .raw
            .set_image(image.as_raw(), width, height, 1, width)
            .map_err(engine_error)?;
        let text = self.0.get_utf8_text().map_err(engine_error)?;
        Ok(text.trim().to_string())
    }
}

/// Tesseract in single-line mode with a plate character whitelist.
#[derive(Clone)]
pub struct TesseractOcr {
    engine: Arc<Mutex<Engine>>,
}

impl TesseractOcr {
    /// Initialise tesseract with the `lang` model from `data_path`
    /// (tesseract's own default location when `None`). Fails when the
    /// library or the language data cannot be loaded.
    pub async fn load(data_path: Option<String>, lang: String) -> Result<Self, OcrError> {
        let engine = tokio::task::spawn_blocking(move || Engine::init(data_path.as_deref(), &lang))
            .await
            .map_err(engine_error)??;

        Ok(Self {
            engine: Arc::new(Mutex::new(engine)),
        })
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    async fn recognize(&self, image: &GrayImage) -> Result<Vec<OcrCandidate>, OcrError> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(Vec::new());
        }

        let engine = Arc::clone(&self.engine);
        let image = image.clone();
        let text = tokio::task::spawn_blocking(move || {
            let mut engine = engine
                .lock()
                .map_err(|_| OcrError::Engine("tesseract engine poisoned".to_string()))?;
            engine.read_line(&image)
        })
        .await
        .map_err(engine_error)??;

        if text.is_empty() {
            return Ok(Vec::new());
        }

        Ok(vec![OcrCandidate {
            text,
            confidence: TESSERACT_CONFIDENCE,
        }])
    }
}
