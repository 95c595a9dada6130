//! Shared parsing utilities for upstream shelter feed fields.
//!
//! Upstream rows are inconsistent about time formats and use zero as a
//! missing-coordinate sentinel, so every parser here is tolerant and
//! returns `Option` rather than failing the row outright.

use chrono::NaiveTime;

/// Parses an upstream time string (`"0930"`, `"09:30"`, or `"09:30:00"`).
#[must_use]
pub fn parse_feed_time(s: Option<&str>) -> Option<NaiveTime> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(t) = NaiveTime::parse_from_str(s, "%H:%M:%S") {
        return Some(t);
    }
    if let Ok(t) = NaiveTime::parse_from_str(s, "%H:%M") {
        return Some(t);
    }
    if let Ok(t) = NaiveTime::parse_from_str(s, "%H%M") {
        return Some(t);
    }
    None
}

/// Parses lat/lng from optional feed fields. Returns `None` if either is
/// missing, zero, or non-finite.
#[must_use]
pub fn parse_lat_lng(lat: Option<f64>, lng: Option<f64>) -> Option<(f64, f64)> {
    let latitude = lat?;
    let longitude = lng?;
    if !latitude.is_finite() || !longitude.is_finite() {
        return None;
    }
    if latitude == 0.0 || longitude == 0.0 {
        return None;
    }
    Some((latitude, longitude))
}
