//! Traffic signal timing.
//!
//! The controller's red phases are supplied as a JSON file:
//!
//! ```json
//! {
//!   "red_intervals": [
//!     { "start": "2025-01-01T08:00:00Z", "end": "2025-01-01T08:00:30Z" }
//!   ]
//! }
//! ```
//!
//! Timestamps are RFC 3339. Timestamps without an offset are read as UTC.

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

/// A single red phase, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RedInterval {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub start: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub end: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct SignalTimestamps {
    red_intervals: Vec<RedInterval>,
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| serde::de::Error::custom(format!("invalid timestamp '{raw}': {e}")))
}

/// Parse and validate a signal timestamps document.
fn parse_signal_intervals(json: &str) -> Result<Vec<RedInterval>, String> {
    let doc: SignalTimestamps = serde_json::from_str(json).map_err(|e| e.to_string())?;

    if let Some(bad) = doc.red_intervals.iter().find(|i| i.end < i.start) {
        return Err(format!(
            "interval ends ({}) before it starts ({})",
            bad.end, bad.start
        ));
    }

    Ok(doc.red_intervals)
}

/// Load the red phases from `path`.
///
/// Any failure (missing file, malformed JSON, inverted interval) is logged
/// and yields an empty list so that processing can continue.
pub fn load_signal_intervals(path: &Path) -> Vec<RedInterval> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::error!(
                "Signal timestamps file not readable at {}: {}",
                path.display(),
                e
            );
            return Vec::new();
        }
    };

    match parse_signal_intervals(&raw) {
        Ok(intervals) => {
            tracing::info!(
                "Loaded {} red light intervals from {}",
                intervals.len(),
                path.display()
            );
            intervals
        }
        Err(e) => {
            tracing::error!("Signal timestamps in {} failed validation: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Whether `at` falls inside any red phase.
pub fn is_within_red_interval(at: DateTime<Utc>, intervals: &[RedInterval]) -> bool {
    intervals.iter().any(|i| i.start <= at && at <= i.end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, h, m, s).unwrap()
    }

    #[test]
    fn parses_offset_and_naive_timestamps() {
        let intervals = parse_signal_intervals(
            r#"{"red_intervals": [
                {"start": "2025-01-01T08:00:00Z", "end": "2025-01-01T08:00:30+00:00"},
                {"start": "2025-01-01T09:00:00", "end": "2025-01-01T09:00:10.500"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].start, at(8, 0, 0));
        assert_eq!(intervals[1].start, at(9, 0, 0));
    }

    #[test]
    fn rejects_inverted_interval() {
        let err = parse_signal_intervals(
            r#"{"red_intervals": [{"start": "2025-01-01T08:00:30Z", "end": "2025-01-01T08:00:00Z"}]}"#,
        )
        .unwrap_err();
        assert!(err.contains("before it starts"));
    }

    #[test]
    fn rejects_missing_field() {
        assert!(parse_signal_intervals(r#"{"intervals": []}"#).is_err());
    }

    #[test]
    fn missing_file_yields_no_intervals() {
        let intervals = load_signal_intervals(Path::new("/nonexistent/signal_timestamps.json"));
        assert!(intervals.is_empty());
    }

    #[test]
    fn interval_bounds_are_inclusive() {
        let intervals = vec![RedInterval {
            start: at(8, 0, 0),
            end: at(8, 0, 30),
        }];

        assert!(is_within_red_interval(at(8, 0, 0), &intervals));
        assert!(is_within_red_interval(at(8, 0, 15), &intervals));
        assert!(is_within_red_interval(at(8, 0, 30), &intervals));
        assert!(!is_within_red_interval(at(7, 59, 59), &intervals));
        assert!(!is_within_red_interval(at(8, 0, 31), &intervals));
        assert!(!is_within_red_interval(at(8, 0, 0), &[]));
    }
}
