//! Signed violation reports.
//!
//! When `INGEST_SECRET` is configured, the processing pipeline signs every
//! report body and the server rejects reports whose signature does not match.
//!
//! # Header Format
//!
//! ```text
//! X-Signature: sha256=<hex hmac-sha256(secret, body)>
//! ```

use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{app::AppState, error::AppError};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// Largest report body accepted for verification.
const MAX_BODY_BYTES: usize = 64 * 1024;

fn mac(secret: &str) -> HmacSha256 {
    // HMAC accepts keys of any length
    HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC key length is valid")
}

/// Sign a request body, producing the `X-Signature` header value.
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac = mac(secret);
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Check a header value against the body in constant time.
pub fn verify_signature(secret: &str, body: &[u8], header: &str) -> bool {
    let Some(expected) = header
        .strip_prefix("sha256=")
        .and_then(|hex_sig| hex::decode(hex_sig).ok())
    else {
        return false;
    };

    let mut mac = mac(secret);
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Signature verification middleware for violation reports.
///
/// # Flow
///
/// 1. Pass the request through untouched when no secret is configured
/// 2. Buffer the body and read `X-Signature`
/// 3. Recompute the HMAC and compare
/// 4. Rebuild the request from the buffered body and call the next handler
///
/// # Returns
///
/// - `Ok(Response)` if the signature matches (or checking is disabled)
/// - `Err(AppError::InvalidSignature)` otherwise (returns 401)
pub async fn verify_ingest_signature(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(secret) = state.ingest_secret.clone() else {
        return Ok(next.run(request).await);
    };

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| AppError::InvalidRequest("Request body too large".to_string()))?;

    let header = parts
        .headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::InvalidSignature)?;

    if !verify_signature(&secret, &bytes, header) {
        tracing::warn!("Rejected violation report with bad signature");
        return Err(AppError::InvalidSignature);
    }

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}
