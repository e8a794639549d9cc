//! Driver profile model and its update rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Points added per violation.
pub const POINTS_PER_VIOLATION: i32 = 3;
/// Risk score given on a plate's first violation.
pub const INITIAL_RISK_SCORE: f64 = 1.5;
/// Growth factor applied to the risk score on each repeat violation.
pub const RISK_GROWTH: f64 = 1.1;
/// Risk score ceiling.
pub const MAX_RISK_SCORE: f64 = 5.0;

/// Represents a driver profile record from the database.
///
/// # Database Table
///
/// Maps to the `driver_profiles` table, keyed by plate. A profile row is
/// created with column defaults (no violations, risk 1.0) and then moved
/// through [`DriverProfile::apply_violation`].
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct DriverProfile {
    pub vehicle_plate: String,

    pub total_violations: i32,

    pub last_violation_ts: Option<DateTime<Utc>>,

    /// Penalty points accumulated
    pub points: i32,

    /// 1.0 is the lowest risk, capped at 5.0
    pub risk_score: f64,

    /// Violation ids, oldest first
    pub history: Vec<i64>,
}

impl DriverProfile {
    /// A profile with no violations, matching the table defaults.
    pub fn empty(plate: impl Into<String>) -> Self {
        Self {
            vehicle_plate: plate.into(),
            total_violations: 0,
            last_violation_ts: None,
            points: 0,
            risk_score: 1.0,
            history: Vec::new(),
        }
    }

    /// Record a new violation against this profile.
    ///
    /// The first violation sets the risk score to 1.5. Each later one grows
    /// it by 10%, up to 5.0.
    pub fn apply_violation(&mut self, violation_id: i64, at: DateTime<Utc>) {
        if self.total_violations == 0 {
            self.total_violations = 1;
            self.points = POINTS_PER_VIOLATION;
            self.risk_score = INITIAL_RISK_SCORE;
        } else {
            self.total_violations += 1;
            self.points += POINTS_PER_VIOLATION;
            self.risk_score = (self.risk_score * RISK_GROWTH).min(MAX_RISK_SCORE);
        }
        self.last_violation_ts = Some(at);
        self.history.push(violation_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_violation_initializes_profile() {
        let now = Utc::now();
        let mut profile = DriverProfile::empty("ABC1234");
        profile.apply_violation(1, now);

        assert_eq!(profile.total_violations, 1);
        assert_eq!(profile.points, 3);
        assert_eq!(profile.risk_score, 1.5);
        assert_eq!(profile.history, vec![1]);
        assert_eq!(profile.last_violation_ts, Some(now));
    }

    #[test]
    fn repeat_violation_grows_risk() {
        let mut profile = DriverProfile::empty("ABC1234");
        profile.apply_violation(1, Utc::now());
        profile.apply_violation(2, Utc::now());

        assert_eq!(profile.total_violations, 2);
        assert_eq!(profile.points, 6);
        assert!((profile.risk_score - 1.65).abs() < 1e-9);
        assert_eq!(profile.history, vec![1, 2]);
    }

    #[test]
    fn risk_is_capped() {
        let mut profile = DriverProfile::empty("ABC1234");
        for id in 1..=30 {
            profile.apply_violation(id, Utc::now());
        }

        assert_eq!(profile.risk_score, MAX_RISK_SCORE);
        assert_eq!(profile.total_violations, 30);
        assert_eq!(profile.points, 90);
    }
}
