//! Violation data models and API request/response types.
//!
//! This module defines:
//! - `Violation`: Database entity for a recorded red-light crossing
//! - `CreateViolationRequest`: Request body submitted by the processing pipeline
//! - `NewViolation`: A validated request, ready to persist
//! - `ViolationDetail`: Violation plus the offender's profile

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, FieldError};
use crate::models::driver_profile::DriverProfile;

/// Violation type recorded for stop-line crossings on red.
pub const RED_LIGHT_CROSSING: &str = "Red_Light_Crossing";

/// Represents a violation record from the database.
///
/// # Database Table
///
/// Maps to the `violations` table. Each violation:
/// - Belongs to one plate (joined to `driver_profiles` by `vehicle_plate`)
/// - Carries the camera site it was observed at
/// - Points at its evidence (snapshot image and clip)
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Violation {
    pub id: i64,

    /// Normalized licence plate, or `UNKNOWN` when OCR failed
    pub vehicle_plate: String,

    /// When the violation was stored
    pub timestamp: DateTime<Utc>,

    /// Camera site identifier (`LOCATION_ID`)
    pub location_id: String,

    pub video_clip_path: Option<String>,

    pub image_path: Option<String>,

    pub violation_type: String,

    /// Fine in currency units, already adjusted for repeat offences, zone and time
    pub fine_amount: f64,

    /// Set once a reviewer has handled the violation
    pub processed_flag: bool,

    /// OCR confidence of the plate reading, 0.0 to 1.0
    pub ocr_confidence: f64,
}

/// Request body for logging a violation.
///
/// # JSON Example
///
/// ```json
/// {
///   "vehicle_plate": "ABC1234",
///   "fine_amount": 150.0,
///   "image_path": "output/images/ABC1234_20250101_080012_345.jpg",
///   "video_clip_path": "output/clips/ABC1234_20250101_080012.gif",
///   "ocr_confidence": 0.95
/// }
/// ```
///
/// # Validation
///
/// - `vehicle_plate`: required, 2 to 10 characters
/// - `fine_amount`: required, >= 0
/// - `image_path`, `video_clip_path`: required
/// - `ocr_confidence`: optional, defaults to 0.0
///
/// Fields are optional at the type level so every missing field can be
/// reported in one response.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct CreateViolationRequest {
    pub vehicle_plate: Option<String>,
    pub fine_amount: Option<f64>,
    pub image_path: Option<String>,
    pub video_clip_path: Option<String>,
    pub ocr_confidence: Option<f64>,
}

/// A validated violation, ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewViolation {
    pub vehicle_plate: String,
    pub fine_amount: f64,
    pub image_path: String,
    pub video_clip_path: String,
    pub ocr_confidence: f64,
}

/// Request fields in the order their errors are reported.
const FIELD_ORDER: [&str; 5] = [
    "vehicle_plate",
    "fine_amount",
    "image_path",
    "video_clip_path",
    "ocr_confidence",
];

const REQUIRED: &str = "Missing data for required field.";

fn string_field(
    map: &Map<String, Value>,
    field: &'static str,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    match map.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => {
            errors.push(FieldError::new(field, "Field may not be null."));
            None
        }
        _ => {
            errors.push(FieldError::new(field, "Not a valid string."));
            None
        }
    }
}

/// Numbers and numeric strings (`"150"`) are both accepted.
fn number_field(
    map: &Map<String, Value>,
    field: &'static str,
    errors: &mut Vec<FieldError>,
) -> Option<f64> {
    let parsed = match map.get(field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Null => {
            errors.push(FieldError::new(field, "Field may not be null."));
            return None;
        }
        _ => None,
    };
    if parsed.is_none() {
        errors.push(FieldError::new(field, "Not a valid number."));
    }
    parsed
}

impl CreateViolationRequest {
    /// Read a request out of a decoded JSON object, one field at a time.
    ///
    /// Type mismatches come back next to the partially filled request so
    /// [`validate_with`](Self::validate_with) can report them together with
    /// missing and out-of-range fields. Unknown keys are ignored and a null
    /// `ocr_confidence` counts as absent.
    pub fn from_json(map: &Map<String, Value>) -> (Self, Vec<FieldError>) {
        let mut errors = Vec::new();
        let request = Self {
            vehicle_plate: string_field(map, "vehicle_plate", &mut errors),
            fine_amount: number_field(map, "fine_amount", &mut errors),
            image_path: string_field(map, "image_path", &mut errors),
            video_clip_path: string_field(map, "video_clip_path", &mut errors),
            ocr_confidence: match map.get("ocr_confidence") {
                Some(Value::Null) => None,
                _ => number_field(map, "ocr_confidence", &mut errors),
            },
        };
        (request, errors)
    }

    /// Check every field, collecting all failures.
    pub fn validate(self) -> Result<NewViolation, AppError> {
        self.validate_with(Vec::new())
    }

    /// [`validate`](Self::validate), starting from errors found while
    /// decoding. Fields that already failed are not checked again.
    pub fn validate_with(self, mut errors: Vec<FieldError>) -> Result<NewViolation, AppError> {
        let failed: Vec<&'static str> = errors.iter().map(|e| e.field).collect();
        let unchecked = |field: &str| !failed.iter().any(|f| *f == field);

        if unchecked("vehicle_plate") {
            match self.vehicle_plate.as_deref() {
                None => errors.push(FieldError::new("vehicle_plate", REQUIRED)),
                Some(plate) if !(2..=10).contains(&plate.chars().count()) => errors.push(
                    FieldError::new("vehicle_plate", "Length must be between 2 and 10."),
                ),
                Some(_) => {}
            }
        }

        if unchecked("fine_amount") {
            match self.fine_amount {
                None => errors.push(FieldError::new("fine_amount", REQUIRED)),
                Some(fine) if !fine.is_finite() || fine < 0.0 => errors.push(FieldError::new(
                    "fine_amount",
                    "Must be greater than or equal to 0.",
                )),
                Some(_) => {}
            }
        }

        if unchecked("image_path") && self.image_path.is_none() {
            errors.push(FieldError::new("image_path", REQUIRED));
        }
        if unchecked("video_clip_path") && self.video_clip_path.is_none() {
            errors.push(FieldError::new("video_clip_path", REQUIRED));
        }

        errors.sort_by_key(|e| FIELD_ORDER.iter().position(|f| *f == e.field));

        match (
            errors.is_empty(),
            self.vehicle_plate,
            self.fine_amount,
            self.image_path,
            self.video_clip_path,
        ) {
            (true, Some(vehicle_plate), Some(fine_amount), Some(image_path), Some(video_clip_path)) => {
                Ok(NewViolation {
                    vehicle_plate,
                    fine_amount,
                    image_path,
                    video_clip_path,
                    ocr_confidence: self.ocr_confidence.unwrap_or(0.0),
                })
            }
            _ => Err(AppError::Validation(errors)),
        }
    }
}

/// Response for a newly logged violation (HTTP 201).
#[derive(Debug, Serialize, Deserialize)]
pub struct ViolationCreatedResponse {
    pub message: String,
    pub violation_id: i64,
}

/// A violation together with its offender's profile.
///
/// `timestamp` is preformatted as `%Y-%m-%d %H:%M:%S UTC` for display.
#[derive(Debug, Serialize)]
pub struct ViolationDetail {
    pub violation: Violation,
    pub profile: Option<DriverProfile>,
    pub plate: String,
    pub timestamp: String,
}

impl ViolationDetail {
    pub fn new(violation: Violation, profile: Option<DriverProfile>) -> Self {
        Self {
            plate: violation.vehicle_plate.clone(),
            timestamp: violation.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            violation,
            profile,
        }
    }
}
