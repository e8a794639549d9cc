//! HTTP OCR service client, the primary engine.
//!
//! The service receives a PNG body and answers with candidate readings:
//!
//! ```json
//! [{"text": "ABC 123", "confidence": 0.85}]
//! ```

use async_trait::async_trait;
use image::GrayImage;

use super::{OcrCandidate, OcrEngine, OcrError, PLATE_ALPHABET, encode_png};

/// Client for an OCR model served over HTTP (for example EasyOCR behind a small web wrapper).
#[derive(Debug, Clone)]
pub struct RemoteOcr {
    url: String,
    client: reqwest::Client,
}

impl RemoteOcr {
    pub fn new(url: String) -> Self {
        // 10 s per plate read
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { url, client }
    }
}

#[async_trait]
impl OcrEngine for RemoteOcr {
    fn name(&self) -> &'static str {
        "ocr-service"
    }

    async fn recognize(&self, image: &GrayImage) -> Result<Vec<OcrCandidate>, OcrError> {
        let png = encode_png(image)?;

        let response = self
            .client
            .post(&self.url)
            .query(&[("allowlist", PLATE_ALPHABET)])
            .header("Content-Type", "image/png")
            .body(png)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<Vec<OcrCandidate>>().await?)
    }
}
