//! Violation service - persistence of violations and driver profiles.
//!
//! This service handles:
//! - Atomic logging of a violation together with its profile update
//! - Violation and profile lookups
//! - Dashboard aggregates and offender pagination
//!
//! # Atomicity Guarantees
//!
//! A violation row and the matching profile update are written in one
//! PostgreSQL transaction. Either both land or neither does.

use chrono::Utc;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        dashboard::{
            DashboardStats, OFFENDERS_PER_PAGE, OffenderPage, TOP_OFFENDERS, TREND_DAYS,
            TrendPoint,
        },
        driver_profile::DriverProfile,
        violation::{NewViolation, RED_LIGHT_CROSSING, Violation},
    },
};

/// Log a violation and update the offender's profile.
///
/// # Process
///
/// 1. Start database transaction
/// 2. Insert the violation row
/// 3. Ensure a profile row exists for the plate
/// 4. Lock the profile, apply the violation, write it back
/// 5. Commit (or rollback on error)
///
/// # Arguments
///
/// * `pool` - Database connection pool
/// * `location_id` - Camera site identifier from configuration
/// * `new` - Validated violation data
///
/// # Errors
///
/// - `Database`: Any query failed; nothing was written
pub async fn log_violation(
    pool: &DbPool,
    location_id: &str,
    new: &NewViolation,
) -> Result<Violation, AppError> {
    let mut tx = pool.begin().await?;

    let violation = sqlx::query_as::<_, Violation>(
        r#"
        INSERT INTO violations (
            vehicle_plate,
            location_id,
            image_path,
            video_clip_path,
            violation_type,
            fine_amount,
            ocr_confidence
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(&new.vehicle_plate)
    .bind(location_id)
    .bind(&new.image_path)
    .bind(&new.video_clip_path)
    .bind(RED_LIGHT_CROSSING)
    .bind(new.fine_amount)
    .bind(new.ocr_confidence)
    .fetch_one(&mut *tx)
    .await?;

    // Create the profile with column defaults if this plate is new
    sqlx::query("INSERT INTO driver_profiles (vehicle_plate) VALUES ($1) ON CONFLICT DO NOTHING")
        .bind(&new.vehicle_plate)
        .execute(&mut *tx)
        .await?;

    // FOR UPDATE serializes concurrent violations for the same plate
    let mut profile = sqlx::query_as::<_, DriverProfile>(
        "SELECT * FROM driver_profiles WHERE vehicle_plate = $1 FOR UPDATE",
    )
    .bind(&new.vehicle_plate)
    .fetch_one(&mut *tx)
    .await?;

    let is_new = profile.total_violations == 0;
    profile.apply_violation(violation.id, Utc::now());

    sqlx::query(
        r#"
        UPDATE driver_profiles
        SET total_violations = $1,
            last_violation_ts = $2,
            points = $3,
            risk_score = $4,
            history = $5
        WHERE vehicle_plate = $6
        "#,
    )
    .bind(profile.total_violations)
    .bind(profile.last_violation_ts)
    .bind(profile.points)
    .bind(profile.risk_score)
    .bind(&profile.history)
    .bind(&profile.vehicle_plate)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    if is_new {
        tracing::info!("New driver profile created for {}", profile.vehicle_plate);
    } else {
        tracing::info!(
            "Driver profile updated for {}. Total violations: {}",
            profile.vehicle_plate,
            profile.total_violations
        );
    }

    Ok(violation)
}

/// Get a violation by ID.
pub async fn get_violation(pool: &DbPool, id: i64) -> Result<Option<Violation>, AppError> {
    let violation = sqlx::query_as::<_, Violation>("SELECT * FROM violations WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(violation)
}

/// Get a driver profile by plate.
pub async fn get_driver_profile(
    pool: &DbPool,
    plate: &str,
) -> Result<Option<DriverProfile>, AppError> {
    let profile =
        sqlx::query_as::<_, DriverProfile>("SELECT * FROM driver_profiles WHERE vehicle_plate = $1")
            .bind(plate)
            .fetch_optional(pool)
            .await?;

    Ok(profile)
}

/// Aggregate statistics for the dashboard.
///
/// The trend holds one point per UTC day with violations, oldest first,
/// limited to the first seven such days.
pub async fn dashboard_stats(pool: &DbPool) -> Result<DashboardStats, AppError> {
    let total_violations: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM violations")
        .fetch_one(pool)
        .await?;

    let unique_offenders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM driver_profiles")
        .fetch_one(pool)
        .await?;

    let top_offenders = sqlx::query_as::<_, DriverProfile>(
        r#"
        SELECT * FROM driver_profiles
        ORDER BY total_violations DESC, risk_score DESC
        LIMIT $1
        "#,
    )
    .bind(TOP_OFFENDERS)
    .fetch_all(pool)
    .await?;

    let trend = sqlx::query_as::<_, TrendPoint>(
        r#"
        SELECT to_char("timestamp" AT TIME ZONE 'UTC', 'YYYY-MM-DD') AS date,
               COUNT(*) AS count
        FROM violations
        GROUP BY date
        ORDER BY date
        LIMIT $1
        "#,
    )
    .bind(TREND_DAYS)
    .fetch_all(pool)
    .await?;

    Ok(DashboardStats {
        total_violations,
        unique_offenders,
        top_offenders,
        trend,
    })
}

/// One page of offenders, most violations first.
///
/// Pages past the end come back with no items.
pub async fn list_offenders(pool: &DbPool, page: i64) -> Result<OffenderPage, AppError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM driver_profiles")
        .fetch_one(pool)
        .await?;

    let items = sqlx::query_as::<_, DriverProfile>(
        r#"
        SELECT * FROM driver_profiles
        ORDER BY total_violations DESC, vehicle_plate ASC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(OFFENDERS_PER_PAGE)
    .bind((page - 1).saturating_mul(OFFENDERS_PER_PAGE))
    .fetch_all(pool)
    .await?;

    Ok(OffenderPage::new(page, total, items))
}
