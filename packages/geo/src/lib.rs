#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Coordinate bucketing and map clustering.
//!
//! Buckets `(lat, lng)` pairs into coarse fixed-precision cell identifiers
//! and groups point sets by cell for cluster-level map rendering. The cell
//! id is a plain rounding bucket, not a base-32 geohash: both halves stay
//! human-readable and invert trivially, which matters when debugging cache
//! keys.

pub mod cluster;

pub use cluster::{Cluster, cluster_points};

/// Errors produced by coordinate bucketing.
#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    /// A latitude or longitude was NaN or infinite.
    #[error("invalid coordinate: lat={lat}, lng={lng}")]
    InvalidCoordinate {
        /// The offending latitude.
        lat: f64,
        /// The offending longitude.
        lng: f64,
    },
    /// A bounding box had a min corner beyond its max corner.
    #[error("invalid bounding box: ({min_lat},{min_lng}) .. ({max_lat},{max_lng})")]
    InvalidBoundingBox {
        /// Southern latitude boundary.
        min_lat: f64,
        /// Western longitude boundary.
        min_lng: f64,
        /// Northern latitude boundary.
        max_lat: f64,
        /// Eastern longitude boundary.
        max_lng: f64,
    },
}

/// Lowest supported cell precision (wide cells, far-out zooms).
pub const MIN_PRECISION: u8 = 5;
/// Highest supported cell precision (narrow cells, street-level zooms).
pub const MAX_PRECISION: u8 = 7;

/// Zoom level at which the map switches from cluster to summary rendering.
pub const ZOOM_SUMMARY: u8 = 13;
/// Zoom level at which the map switches from summary to detail rendering.
pub const ZOOM_DETAIL: u8 = 16;

/// Lowest zoom cache keys distinguish. Below it neither precision nor
/// rendering granularity changes, so farther-out zooms share this tier's
/// keys.
pub const ZOOM_KEY_MIN: u8 = 12;
/// Highest zoom cache keys distinguish; closer zooms share this tier's
/// keys.
pub const ZOOM_KEY_MAX: u8 = 17;

/// Selects the cell precision for a map-viewer zoom level.
///
/// Three policy tiers: below 13 → 5, 13 to 15 → 6, 16 and up → 7. The
/// boundaries are rendering policy, not derived from cell geometry.
#[must_use]
pub const fn precision_for_zoom(zoom: u8) -> u8 {
    if zoom < ZOOM_SUMMARY {
        MIN_PRECISION
    } else if zoom < ZOOM_DETAIL {
        6
    } else {
        MAX_PRECISION
    }
}

/// Buckets a coordinate pair into a cell identifier at the given precision.
///
/// Both coordinates are scaled by `10^(precision - 2)` and rounded to the
/// nearest integer, so precision 5 buckets at roughly 0.001°.
///
/// # Errors
///
/// Returns [`GeoError::InvalidCoordinate`] if either coordinate is NaN or
/// infinite.
pub fn cell_id(lat: f64, lng: f64, precision: u8) -> Result<String, GeoError> {
    if !lat.is_finite() || !lng.is_finite() {
        return Err(GeoError::InvalidCoordinate { lat, lng });
    }

    let scale = 10f64.powi(i32::from(precision) - 2);
    #[allow(clippy::cast_possible_truncation)]
    let lat_int = (lat * scale).round() as i64;
    #[allow(clippy::cast_possible_truncation)]
    let lng_int = (lng * scale).round() as i64;

    Ok(format!("{lat_int}_{lng_int}_p{precision}"))
}

/// Buckets a whole viewport into a cell-span identifier.
///
/// Concatenates the cell ids of the min and max corners. Used as the
/// spatial component of a cache key that represents a bounding box rather
/// than a point, so nearby viewports snap onto the same key.
///
/// # Errors
///
/// Returns [`GeoError::InvalidBoundingBox`] if the min corner is beyond
/// the max corner, or [`GeoError::InvalidCoordinate`] if any corner is NaN
/// or infinite.
pub fn bbox_cell_span(
    min_lat: f64,
    min_lng: f64,
    max_lat: f64,
    max_lng: f64,
    precision: u8,
) -> Result<String, GeoError> {
    if min_lat > max_lat || min_lng > max_lng {
        return Err(GeoError::InvalidBoundingBox {
            min_lat,
            min_lng,
            max_lat,
            max_lng,
        });
    }

    let min_cell = cell_id(min_lat, min_lng, precision)?;
    let max_cell = cell_id(max_lat, max_lng, precision)?;
    Ok(format!("{min_cell}__{max_cell}"))
}
