//! Clinical mode resolution.
//!
//! Maps the persisted maintenance record to one of the four clinical modes.
//! Pure and total: no I/O, no clock access; `now` is always supplied.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::types::{ClinicalMode, SystemState};

/// Default freshness window for an optimization, in hours.
pub const DEFAULT_THRESHOLD_HOURS: f64 = 72.0;

/// Resolve the clinical mode. First matching rule wins:
///
/// 1. no analysis → `needs_analysis`
/// 2. no optimization → `needs_optimization`
/// 3. optimization timestamp unparseable → `maintenance_due`
/// 4. hours since optimization `<= threshold` → `stable`, otherwise `maintenance_due`
///
/// A future optimization timestamp yields a negative age and resolves to
/// `stable`.
pub fn resolve(state: &SystemState, now: DateTime<Utc>, threshold_hours: f64) -> ClinicalMode {
    if state.last_analysis.is_none() {
        return ClinicalMode::NeedsAnalysis;
    }

    let Some(optimization) = &state.last_optimization else {
        return ClinicalMode::NeedsOptimization;
    };

    let Some(optimized_at) = parse_timestamp(&optimization.timestamp) else {
        return ClinicalMode::MaintenanceDue;
    };

    if hours_since(optimized_at, now) <= threshold_hours {
        ClinicalMode::Stable
    } else {
        ClinicalMode::MaintenanceDue
    }
}

/// Fractional hours elapsed between `then` and `now` (negative if `then` is later).
pub fn hours_since(then: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - then).num_milliseconds() as f64 / 3_600_000.0
}

/// Parse a persisted timestamp.
///
/// Accepts RFC 3339 with any offset, and offset-less ISO-8601 values which are
/// taken as UTC. Empty or malformed strings yield `None`.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    let naive = value.strip_suffix('Z').unwrap_or(value);
    NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(naive, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|dt| dt.and_utc())
}
