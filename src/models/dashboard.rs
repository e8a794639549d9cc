//! Dashboard and offender listing response types.

use serde::Serialize;

use crate::models::driver_profile::DriverProfile;

/// Offenders shown per page of the offender list.
pub const OFFENDERS_PER_PAGE: i64 = 20;

/// Offenders shown on the dashboard leaderboard.
pub const TOP_OFFENDERS: i64 = 5;

/// Days of trend data on the dashboard.
pub const TREND_DAYS: i64 = 7;

/// Violation count for one UTC day.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
pub struct TrendPoint {
    /// `YYYY-MM-DD`
    pub date: String,
    pub count: i64,
}

/// Overall statistics for the dashboard.
///
/// # JSON Example
///
/// ```json
/// {
///   "total_violations": 42,
///   "unique_offenders": 17,
///   "top_offenders": [{"vehicle_plate": "ABC1234", "total_violations": 5, "...": "..."}],
///   "trend": [{"date": "2025-01-01", "count": 6}]
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_violations: i64,
    pub unique_offenders: i64,
    pub top_offenders: Vec<DriverProfile>,
    pub trend: Vec<TrendPoint>,
}

/// One page of driver profiles, most violations first.
#[derive(Debug, Serialize)]
pub struct OffenderPage {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub pages: i64,
    pub items: Vec<DriverProfile>,
}

impl OffenderPage {
    pub fn new(page: i64, total: i64, items: Vec<DriverProfile>) -> Self {
        Self {
            page,
            per_page: OFFENDERS_PER_PAGE,
            total,
            pages: page_count(total),
            items,
        }
    }
}

/// Number of pages needed for `total` offenders.
pub fn page_count(total: i64) -> i64 {
    (total.max(0) + OFFENDERS_PER_PAGE - 1) / OFFENDERS_PER_PAGE
}

/// Clamp a requested page number to a valid 1-based page.
pub fn normalize_page(page: Option<i64>) -> i64 {
    page.filter(|p| *p >= 1).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_round_up() {
        assert_eq!(page_count(0), 0);
        assert_eq!(page_count(1), 1);
        assert_eq!(page_count(20), 1);
        assert_eq!(page_count(21), 2);
    }

    #[test]
    fn invalid_pages_fall_back_to_first() {
        assert_eq!(normalize_page(None), 1);
        assert_eq!(normalize_page(Some(0)), 1);
        assert_eq!(normalize_page(Some(-3)), 1);
        assert_eq!(normalize_page(Some(4)), 4);
    }
}
