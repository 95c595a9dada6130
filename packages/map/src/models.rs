//! Map query response types.
//!
//! The feature variant a query returns is chosen by the service from the
//! viewport and zoom, never by the caller. The JSON discriminator on
//! [`MapFeature`] is a convenience for the HTTP layer; routing and
//! response envelopes live outside this crate.

use serde::{Deserialize, Serialize};
use shelter_map_shelter_models::ShelterRecord;

/// Response granularity for a bounding-box query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapLevel {
    /// Per-cell clusters for wide viewports and far-out zooms.
    Cluster,
    /// Per-shelter summary rows.
    Summary,
    /// Per-shelter rows at street-level zooms. Shares the summary data
    /// path today; richer detail fields are a planned extension.
    Detail,
}

/// One item of a bounding-box query response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MapFeature {
    /// A cell-level cluster.
    Cluster {
        /// Cell identifier.
        cell_id: String,
        /// Arithmetic-mean latitude of the member shelters.
        centroid_lat: f64,
        /// Arithmetic-mean longitude of the member shelters.
        centroid_lng: f64,
        /// Number of member shelters.
        count: usize,
    },
    /// A single shelter.
    ShelterPoint {
        /// Facility number.
        id: i64,
        /// Facility name.
        name: Option<String>,
        /// Latitude.
        lat: f64,
        /// Longitude.
        lng: f64,
        /// Seated capacity.
        capacity: Option<i32>,
        /// Whether the facility is outdoors.
        is_outdoors: bool,
        /// Sum of review ratings.
        total_rating: Option<i64>,
        /// Number of reviews.
        review_count: Option<i32>,
        /// Representative photo URL.
        photo_url: Option<String>,
    },
}

impl From<&ShelterRecord> for MapFeature {
    fn from(record: &ShelterRecord) -> Self {
        Self::ShelterPoint {
            id: record.id,
            name: record.name.clone(),
            lat: record.latitude,
            lng: record.longitude,
            capacity: record.capacity,
            is_outdoors: record.is_outdoors,
            total_rating: record.total_rating,
            review_count: record.review_count,
            photo_url: record.photo_url.clone(),
        }
    }
}

/// Result of one bounding-box query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapQueryResult {
    /// Granularity the service chose.
    pub level: MapLevel,
    /// Features at that granularity.
    pub items: Vec<MapFeature>,
    /// Total matching shelters before clustering or paging.
    pub total: u64,
}
