//! Smart fine calculation.
//!
//! ```text
//! fine = BASE_FINE * repeat offender multiplier * location factor * time factor
//! ```

use chrono::{NaiveTime, Timelike};

/// Fine parameters, taken from configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinePolicy {
    pub base_fine: f64,
    pub repeat_offender_multiplier: f64,
    pub school_zone_factor: f64,
    pub night_hour_start: u32,
    pub night_hour_end: u32,
    pub night_factor: f64,
}

/// Properties of the camera site that scale the fine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocationFactors {
    pub is_school_zone: bool,
}

/// Whether `time` falls in the night window `[start, end)`.
///
/// With `start <= end` the configured hours are read as the day window and
/// night is everything outside it. Otherwise the night window wraps midnight.
pub fn is_night_hour(time: NaiveTime, start: u32, end: u32) -> bool {
    let hour = time.hour();
    if start <= end {
        !(start <= hour && hour < end)
    } else {
        hour >= start || hour < end
    }
}

/// Compute the fine for a new violation.
///
/// `prior_violations` is the plate's count before this one. The result is
/// rounded to cents.
pub fn calculate_smart_fine(
    policy: &FinePolicy,
    prior_violations: i32,
    location: &LocationFactors,
    local_time: NaiveTime,
) -> f64 {
    let mut fine = policy.base_fine;

    if prior_violations > 0 {
        let multiplier =
            1.0 + prior_violations as f64 * (policy.repeat_offender_multiplier - 1.0);
        fine *= multiplier.max(1.0);
        tracing::debug!("Fine adjusted by repeat offender factor ({:.2})", multiplier);
    }

    if location.is_school_zone {
        fine *= policy.school_zone_factor;
        tracing::debug!(
            "Fine adjusted by school zone factor ({:.2})",
            policy.school_zone_factor
        );
    }

    if is_night_hour(local_time, policy.night_hour_start, policy.night_hour_end) {
        fine *= policy.night_factor;
        tracing::debug!("Fine adjusted by night hour factor ({:.2})", policy.night_factor);
    }

    (fine * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> FinePolicy {
        FinePolicy {
            base_fine: 100.0,
            repeat_offender_multiplier: 1.5,
            school_zone_factor: 2.0,
            night_hour_start: 22,
            night_hour_end: 6,
            night_factor: 1.2,
        }
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn night_window_wrapping_midnight() {
        assert!(is_night_hour(hm(22, 0), 22, 6));
        assert!(is_night_hour(hm(23, 59), 22, 6));
        assert!(is_night_hour(hm(0, 30), 22, 6));
        assert!(is_night_hour(hm(5, 59), 22, 6));
        assert!(!is_night_hour(hm(6, 0), 22, 6));
        assert!(!is_night_hour(hm(21, 59), 22, 6));
    }

    #[test]
    fn day_window_when_start_before_end() {
        assert!(!is_night_hour(hm(6, 0), 6, 22));
        assert!(!is_night_hour(hm(21, 0), 6, 22));
        assert!(is_night_hour(hm(22, 0), 6, 22));
        assert!(is_night_hour(hm(3, 0), 6, 22));
    }

    #[test]
    fn first_offence_in_daytime_is_base_fine() {
        let fine = calculate_smart_fine(&policy(), 0, &LocationFactors::default(), hm(12, 0));
        assert_eq!(fine, 100.0);
    }

    #[test]
    fn repeat_offender_multiplier_scales_with_history() {
        let none = LocationFactors::default();
        assert_eq!(calculate_smart_fine(&policy(), 1, &none, hm(12, 0)), 150.0);
        assert_eq!(calculate_smart_fine(&policy(), 3, &none, hm(12, 0)), 250.0);
    }

    #[test]
    fn multiplier_below_one_never_reduces_fine() {
        let mut lenient = policy();
        lenient.repeat_offender_multiplier = 0.8;
        let fine = calculate_smart_fine(&lenient, 2, &LocationFactors::default(), hm(12, 0));
        assert_eq!(fine, 100.0);
    }

    #[test]
    fn night_and_school_zone_factors_stack() {
        let school = LocationFactors {
            is_school_zone: true,
        };
        assert_eq!(
            calculate_smart_fine(&policy(), 1, &LocationFactors::default(), hm(23, 0)),
            180.0
        );
        assert_eq!(calculate_smart_fine(&policy(), 0, &school, hm(12, 0)), 200.0);
        assert_eq!(calculate_smart_fine(&policy(), 1, &school, hm(1, 0)), 360.0);
    }

    #[test]
    fn fine_is_rounded_to_cents() {
        let mut odd = policy();
        odd.base_fine = 33.333;
        let fine = calculate_smart_fine(&odd, 0, &LocationFactors::default(), hm(12, 0));
        assert_eq!(fine, 33.33);
    }
}
