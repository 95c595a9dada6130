//! Canonical cache keys for bounding-box map queries.
//!
//! The spatial component snaps the viewport corners to cells at the
//! zoom's precision, so raw bbox corners that differ by less than a cell
//! collapse onto the same key and share a cache entry.

use shelter_map_geo::{
    GeoError, ZOOM_KEY_MAX, ZOOM_KEY_MIN, bbox_cell_span, precision_for_zoom,
};
use shelter_map_shelter_models::BoundingBox;

/// Largest page size a caller can request; larger values are clamped,
/// not rejected.
pub const MAX_PAGE_SIZE: u64 = 500;

/// Page size used when the caller does not specify one.
pub const DEFAULT_PAGE_SIZE: u64 = 100;

/// Clamps caller-supplied paging to the allowed bounds.
///
/// Negative or missing page defaults to 0; size is forced into
/// `1..=MAX_PAGE_SIZE`. Defensive clamping, not rejection: paging inputs
/// are never worth a 4xx.
#[must_use]
pub fn clamp_paging(page: Option<i64>, size: Option<i64>) -> (u64, u64) {
    let page = page.map_or(0, |p| u64::try_from(p).unwrap_or(0));
    let size = size.map_or(DEFAULT_PAGE_SIZE, |s| {
        u64::try_from(s).unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    });
    (page, size)
}

/// Builds the canonical cache key for a snapped viewport query.
///
/// Layout: `{namespace}:z{zoom}:gh:{cellSpan}:p{page}:s{size}`.
///
/// # Errors
///
/// Returns [`GeoError`] if the bounding box is degenerate or has
/// non-finite corners.
pub fn query_key(
    namespace: &str,
    zoom: u8,
    bbox: &BoundingBox,
    page: u64,
    size: u64,
) -> Result<String, GeoError> {
    // Outside the key domain neither precision nor granularity changes,
    // so out-of-range zooms snap onto the boundary tier. Invalidation
    // only emits patterns for in-domain tiers; an unclamped zoom here
    // would leave those entries unreachable by any pattern.
    let zoom = zoom.clamp(ZOOM_KEY_MIN, ZOOM_KEY_MAX);
    let span = bbox_cell_span(
        bbox.min_lat,
        bbox.min_lng,
        bbox.max_lat,
        bbox.max_lng,
        precision_for_zoom(zoom),
    )?;
    Ok(format!("{namespace}:z{zoom}:gh:{span}:p{page}:s{size}"))
}
