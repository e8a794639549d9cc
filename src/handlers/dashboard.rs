//! Dashboard HTTP handlers.
//!
//! - GET /api/v1/dashboard - Totals, top offenders and daily trend
//! - GET /api/v1/offenders?page=N - Paginated driver profiles
//! - GET /api/v1/offenders/{plate} - One driver profile

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use crate::{
    app::AppState,
    error::AppError,
    models::{
        dashboard::{DashboardStats, OffenderPage, normalize_page},
        driver_profile::DriverProfile,
    },
    services::violation_service,
};

/// Query string of the offender list.
///
/// `page` is kept as text so that junk values fall back to the first page
/// instead of failing the request.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    pub fn page(&self) -> i64 {
        normalize_page(self.page.as_deref().and_then(|p| p.trim().parse().ok()))
    }
}

/// Dashboard statistics.
///
/// # Endpoint
///
/// `GET /api/v1/dashboard`
///
/// # Response (200)
///
/// ```json
/// {
///   "total_violations": 42,
///   "unique_offenders": 17,
///   "top_offenders": [...],
///   "trend": [{"date": "2025-01-01", "count": 6}]
/// }
/// ```
pub async fn dashboard(State(state): State<AppState>) -> Result<Json<DashboardStats>, AppError> {
    Ok(Json(violation_service::dashboard_stats(&state.pool).await?))
}

/// Paginated offender list, 20 per page, most violations first.
///
/// # Endpoint
///
/// `GET /api/v1/offenders?page=2`
pub async fn list_offenders(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<OffenderPage>, AppError> {
    Ok(Json(
        violation_service::list_offenders(&state.pool, query.page()).await?,
    ))
}

/// One driver profile.
///
/// # Endpoint
///
/// `GET /api/v1/offenders/{plate}`
///
/// The processing pipeline uses this to count prior violations when
/// computing a fine.
pub async fn get_offender(
    State(state): State<AppState>,
    Path(plate): Path<String>,
) -> Result<Json<DriverProfile>, AppError> {
    let profile = violation_service::get_driver_profile(&state.pool, &plate)
        .await?
        .ok_or(AppError::ProfileNotFound)?;

    Ok(Json(profile))
}
