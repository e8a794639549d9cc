//! Violation HTTP handlers.
//!
//! This module implements the violation endpoints:
//! - POST /api/v1/violations - Log a violation reported by the pipeline
//! - GET /api/v1/violations/{id} - Violation detail with the offender profile

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::Value;

use crate::{
    app::AppState,
    error::{AppError, FieldError},
    models::violation::{
        CreateViolationRequest, NewViolation, ViolationCreatedResponse, ViolationDetail,
    },
    services::violation_service,
};

/// Decode and validate a report body, distinguishing "nothing sent" from
/// "bad fields".
///
/// Empty and falsy JSON values (`{}`, `[]`, `""`, `0`, `false`, `null`) count
/// as no input.
fn parse_report(body: &[u8]) -> Result<NewViolation, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::NoInput);
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidRequest(format!("Malformed JSON: {}", e)))?;

    match value {
        Value::Object(map) if !map.is_empty() => {
            let (request, errors) = CreateViolationRequest::from_json(&map);
            request.validate_with(errors)
        }
        Value::Object(_) | Value::Null | Value::Bool(false) => Err(AppError::NoInput),
        Value::Array(ref items) if items.is_empty() => Err(AppError::NoInput),
        Value::String(ref s) if s.is_empty() => Err(AppError::NoInput),
        Value::Number(ref n) if n.as_f64() == Some(0.0) => Err(AppError::NoInput),
        _ => Err(AppError::Validation(vec![FieldError::new(
            "body",
            "Expected a JSON object.",
        )])),
    }
}

/// Log a new red-light violation.
///
/// # Endpoint
///
/// `POST /api/v1/violations`
///
/// # Request Body
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
/// # Response
///
/// - **201 Created**: `{"message": "Violation logged successfully", "violation_id": 42}`
/// - **400**: Empty or malformed body
/// - **401**: Bad signature (when `INGEST_SECRET` is set)
/// - **422**: Validation failed
/// - **500**: Database error
pub async fn create_violation(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<ViolationCreatedResponse>), AppError> {
    let new = parse_report(&body)?;

    let violation = violation_service::log_violation(&state.pool, &state.location_id, &new)
        .await
        .inspect_err(|e| {
            tracing::error!("Error logging violation for plate {}: {}", new.vehicle_plate, e)
        })?;

    tracing::info!(
        "Violation {} logged for plate {}",
        violation.id,
        violation.vehicle_plate
    );

    Ok((
        StatusCode::CREATED,
        Json(ViolationCreatedResponse {
            message: "Violation logged successfully".to_string(),
            violation_id: violation.id,
        }),
    ))
}

/// Get a violation with its offender's profile.
///
/// # Endpoint
///
/// `GET /api/v1/violations/{id}`
///
/// # Response
///
/// - **200 OK**: `{"violation": {...}, "profile": {...}, "plate": "...", "timestamp": "2025-01-01 08:00:12 UTC"}`
/// - **404**: No such violation
pub async fn get_violation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ViolationDetail>, AppError> {
    let violation = violation_service::get_violation(&state.pool, id)
        .await?
        .ok_or(AppError::ViolationNotFound)?;

    let profile =
        violation_service::get_driver_profile(&state.pool, &violation.vehicle_plate).await?;

    Ok(Json(ViolationDetail::new(violation, profile)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_names(result: Result<NewViolation, AppError>) -> Vec<&'static str> {
        match result {
            Err(AppError::Validation(errors)) => errors.into_iter().map(|e| e.field).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn blank_body_is_no_input() {
        assert!(matches!(parse_report(b""), Err(AppError::NoInput)));
        assert!(matches!(parse_report(b"  \n"), Err(AppError::NoInput)));
        assert!(matches!(parse_report(b"{}"), Err(AppError::NoInput)));
        assert!(matches!(parse_report(b"null"), Err(AppError::NoInput)));
    }

    #[test]
    fn falsy_json_is_no_input() {
        for body in [&b"[]"[..], b"\"\"", b"0", b"0.0", b"false"] {
            assert!(
                matches!(parse_report(body), Err(AppError::NoInput)),
                "{}",
                String::from_utf8_lossy(body)
            );
        }
    }

    #[test]
    fn malformed_json_is_bad_request() {
        assert!(matches!(
            parse_report(b"{not json"),
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[test]
    fn non_object_bodies_are_validation_errors() {
        assert_eq!(field_names(parse_report(b"[1, 2]")), vec!["body"]);
        assert_eq!(field_names(parse_report(b"true")), vec!["body"]);
        assert_eq!(field_names(parse_report(b"\"report\"")), vec!["body"]);
    }

    #[test]
    fn type_and_range_errors_come_back_together() {
        let result =
            parse_report(br#"{"vehicle_plate":"A","fine_amount":"lots","image_path":"a.jpg"}"#);
        assert_eq!(
            field_names(result),
            vec!["vehicle_plate", "fine_amount", "video_clip_path"]
        );
    }

    #[test]
    fn well_formed_report_parses() {
        let new = parse_report(
            br#"{"vehicle_plate": "ABC1234", "fine_amount": "150", "image_path": "a.jpg", "video_clip_path": "a.gif"}"#,
        )
        .unwrap();
        assert_eq!(new.vehicle_plate, "ABC1234");
        assert_eq!(new.fine_amount, 150.0);
        assert_eq!(new.ocr_confidence, 0.0);
    }
}
