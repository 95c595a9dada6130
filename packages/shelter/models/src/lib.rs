#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Shelter record types shared across the import and map-query pipelines.
//!
//! These types represent the shapes of data as held in the record store.
//! They are distinct from the upstream feed row types in
//! `shelter_map_feed_models`, which use the upstream field names and raw
//! string encodings.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Weekday and weekend opening hours for a shelter.
///
/// All four fields are optional: many upstream rows omit some or all of
/// them, and a missing value means "not published", not "closed".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingHours {
    /// Weekday opening time.
    pub weekday_open: Option<NaiveTime>,
    /// Weekday closing time.
    pub weekday_close: Option<NaiveTime>,
    /// Weekend opening time.
    pub weekend_open: Option<NaiveTime>,
    /// Weekend closing time.
    pub weekend_close: Option<NaiveTime>,
}

/// A shelter facility as held in the record store.
///
/// `id` is the upstream facility number and is never generated locally.
/// Coordinates are always present once a record exists; every other field
/// may be absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShelterRecord {
    /// Stable facility number assigned by the upstream source.
    pub id: i64,
    /// Facility name.
    pub name: Option<String>,
    /// Street address.
    pub address: Option<String>,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Opening hours.
    pub hours: OperatingHours,
    /// Seated capacity.
    pub capacity: Option<i32>,
    /// Whether the facility is outdoors (derived from the upstream
    /// facility-type code).
    pub is_outdoors: bool,
    /// Number of fans on site.
    pub fan_count: Option<i32>,
    /// Number of air conditioners on site.
    pub air_conditioner_count: Option<i32>,
    /// Sum of review ratings.
    pub total_rating: Option<i64>,
    /// Number of reviews.
    pub review_count: Option<i32>,
    /// Representative photo URL.
    pub photo_url: Option<String>,
}

/// A coordinate change observed during one import run.
///
/// Produced only when a diff changes latitude or longitude; consumed by the
/// cache invalidation step and then discarded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangedPoint {
    /// Facility number of the record that moved.
    pub id: i64,
    /// Latitude before the update.
    pub old_lat: f64,
    /// Longitude before the update.
    pub old_lng: f64,
    /// Latitude after the update.
    pub new_lat: f64,
    /// Longitude after the update.
    pub new_lng: f64,
}

/// A geographic bounding box in WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Southern latitude boundary.
    pub min_lat: f64,
    /// Western longitude boundary.
    pub min_lng: f64,
    /// Northern latitude boundary.
    pub max_lat: f64,
    /// Eastern longitude boundary.
    pub max_lng: f64,
}

impl BoundingBox {
    /// Creates a new bounding box from the given corners.
    #[must_use]
    pub const fn new(min_lat: f64, min_lng: f64, max_lat: f64, max_lng: f64) -> Self {
        Self {
            min_lat,
            min_lng,
            max_lat,
            max_lng,
        }
    }

    /// Latitude extent of the box, in degrees.
    #[must_use]
    pub fn span_lat(&self) -> f64 {
        (self.max_lat - self.min_lat).abs()
    }

    /// Longitude extent of the box, in degrees.
    #[must_use]
    pub fn span_lng(&self) -> f64 {
        (self.max_lng - self.min_lng).abs()
    }

    /// Whether a point falls inside the box (inclusive on all edges).
    #[must_use]
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lng >= self.min_lng && lng <= self.max_lng
    }
}
