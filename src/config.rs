//! Application configuration management.
//!
//! Configuration is read from environment variables with the `envy` crate
//! after an optional `.env` file has been loaded by `dotenvy`. The same
//! struct serves the HTTP server and the offline processing commands; only
//! the server needs `DATABASE_URL`.

use std::str::FromStr;

use serde::{Deserialize, Deserializer};

use crate::services::profiler::FinePolicy;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required by `serve` and `init-db`)
/// - `SERVER_PORT`: HTTP server port, defaults to 5000
/// - `LOCATION_ID`: camera site identifier stamped on every violation
/// - `LOCATION_IS_SCHOOL_ZONE`: whether the school zone fine factor applies
/// - `OCR_BACKEND`: `remote` (alias `easyocr`), `tesseract` or `none`
/// - `OCR_SERVICE_URL`: endpoint of the remote OCR engine
/// - `TESSERACT_DATA`: tessdata directory, tesseract's default when unset
/// - `TESSERACT_LANG`: tesseract language model, defaults to `eng`
/// - `BASE_FINE`, `REPEAT_OFFENDER_MULTIPLIER`, `SCHOOL_ZONE_FACTOR`,
///   `NIGHT_HOUR_START`, `NIGHT_HOUR_END`, `NIGHT_FACTOR`: fine policy
/// - `API_BASE_URL`: where `process-video` reports violations
/// - `INGEST_SECRET`: shared HMAC secret for signed violation reports
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: Option<String>,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_location_id")]
    pub location_id: String,

    #[serde(default)]
    pub location_is_school_zone: bool,

    #[serde(default, deserialize_with = "deserialize_backend")]
    pub ocr_backend: OcrBackend,

    pub ocr_service_url: Option<String>,

    pub tesseract_data: Option<String>,

    #[serde(default = "default_tesseract_lang")]
    pub tesseract_lang: String,

    #[serde(default = "default_base_fine")]
    pub base_fine: f64,

    #[serde(default = "default_repeat_offender_multiplier")]
    pub repeat_offender_multiplier: f64,

    #[serde(default = "default_school_zone_factor")]
    pub school_zone_factor: f64,

    #[serde(default = "default_night_hour_start")]
    pub night_hour_start: u32,

    #[serde(default = "default_night_hour_end")]
    pub night_hour_end: u32,

    #[serde(default = "default_night_factor")]
    pub night_factor: f64,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    pub ingest_secret: Option<String>,
}

/// OCR engine selected through `OCR_BACKEND`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OcrBackend {
    /// HTTP OCR service, tried first with tesseract as fallback
    #[default]
    Remote,
    Tesseract,
    None,
}

impl FromStr for OcrBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "remote" | "easyocr" => Ok(Self::Remote),
            "tesseract" => Ok(Self::Tesseract),
            "none" => Ok(Self::None),
            other => Err(format!("unknown OCR backend '{other}'")),
        }
    }
}

fn deserialize_backend<'de, D>(deserializer: D) -> Result<OcrBackend, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment error: {0}")]
    Env(#[from] envy::Error),

    #[error("{var} is not a valid URL: {source}")]
    InvalidUrl {
        var: &'static str,
        source: url::ParseError,
    },

    #[error("{var} must be an hour between 0 and 23, got {value}")]
    InvalidHour { var: &'static str, value: u32 },

    #[error("DATABASE_URL must be set")]
    MissingDatabaseUrl,
}

fn default_port() -> u16 {
    5000
}

fn default_location_id() -> String {
    "DEFAULT_LOCATION_000".to_string()
}

fn default_tesseract_lang() -> String {
    "eng".to_string()
}

fn default_base_fine() -> f64 {
    100.0
}

fn default_repeat_offender_multiplier() -> f64 {
    1.5
}

fn default_school_zone_factor() -> f64 {
    2.0
}

fn default_night_hour_start() -> u32 {
    22
}

fn default_night_hour_end() -> u32 {
    6
}

fn default_night_factor() -> f64 {
    1.2
}

fn default_api_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// A missing `.env` file is not fatal: a warning is logged and the
    /// process environment is used as-is.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::warn!("No .env file loaded ({}); using process environment", e);
        }

        Self::from_vars(std::env::vars())
    }

    /// Build a configuration from explicit key/value pairs.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        // Field names are converted automatically: location_id -> LOCATION_ID
        let config = envy::from_iter::<_, Config>(vars)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.api_base_url).map_err(|source| ConfigError::InvalidUrl {
            var: "API_BASE_URL",
            source,
        })?;

        if let Some(ref service) = self.ocr_service_url {
            url::Url::parse(service).map_err(|source| ConfigError::InvalidUrl {
                var: "OCR_SERVICE_URL",
                source,
            })?;
        }

        for (var, value) in [
            ("NIGHT_HOUR_START", self.night_hour_start),
            ("NIGHT_HOUR_END", self.night_hour_end),
        ] {
            if value > 23 {
                return Err(ConfigError::InvalidHour { var, value });
            }
        }

        Ok(())
    }

    /// Connection string for commands that touch the database.
    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::MissingDatabaseUrl)
    }

    /// Fine calculation parameters.
    pub fn fine_policy(&self) -> FinePolicy {
        FinePolicy {
            base_fine: self.base_fine,
            repeat_offender_multiplier: self.repeat_offender_multiplier,
            school_zone_factor: self.school_zone_factor,
            night_hour_start: self.night_hour_start,
            night_hour_end: self.night_hour_end,
            night_factor: self.night_factor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_vars(Vec::new()).unwrap();

        assert!(config.database_url.is_none());
        assert_eq!(config.server_port, 5000);
        assert_eq!(config.location_id, "DEFAULT_LOCATION_000");
        assert_eq!(config.ocr_backend, OcrBackend::Remote);
        assert!(config.tesseract_data.is_none());
        assert_eq!(config.tesseract_lang, "eng");
        assert_eq!(config.base_fine, 100.0);
        assert_eq!(config.repeat_offender_multiplier, 1.5);
        assert_eq!(config.night_hour_start, 22);
        assert_eq!(config.night_hour_end, 6);
        assert!(config.ingest_secret.is_none());
        assert!(!config.location_is_school_zone);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_vars(vars(&[
            ("DATABASE_URL", "postgres://localhost/redlight"),
            ("SERVER_PORT", "8080"),
            ("OCR_BACKEND", "EasyOCR"),
            ("BASE_FINE", "250.5"),
            ("NIGHT_HOUR_START", "20"),
            ("LOCATION_IS_SCHOOL_ZONE", "true"),
        ]))
        .unwrap();

        assert_eq!(
            config.require_database_url().unwrap(),
            "postgres://localhost/redlight"
        );
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.ocr_backend, OcrBackend::Remote);
        assert_eq!(config.fine_policy().base_fine, 250.5);
        assert_eq!(config.fine_policy().night_hour_start, 20);
        assert!(config.location_is_school_zone);
    }

    #[test]
    fn tesseract_backend_is_case_insensitive() {
        let config = Config::from_vars(vars(&[("OCR_BACKEND", "Tesseract")])).unwrap();
        assert_eq!(config.ocr_backend, OcrBackend::Tesseract);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(Config::from_vars(vars(&[("OCR_BACKEND", "paddle")])).is_err());
    }

    #[test]
    fn invalid_api_url_is_rejected() {
        let err = Config::from_vars(vars(&[("API_BASE_URL", "not a url")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidUrl {
                var: "API_BASE_URL",
                ..
            }
        ));
    }

    #[test]
    fn out_of_range_hour_is_rejected() {
        let err = Config::from_vars(vars(&[("NIGHT_HOUR_END", "24")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidHour { value: 24, .. }));
    }

    #[test]
    fn missing_database_url_is_reported() {
        let config = Config::from_vars(Vec::new()).unwrap();
        assert!(matches!(
            config.require_database_url(),
            Err(ConfigError::MissingDatabaseUrl)
        ));
    }
}
