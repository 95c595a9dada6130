#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Upstream shelter feed row types and field parsing.
//!
//! The upstream API publishes facility rows with string-encoded times and
//! raw facility-type codes. These types mirror that shape; conversion to
//! the canonical [`ShelterRecord`] happens in one place so the insert and
//! diff paths can never disagree about field semantics.

pub mod parsing;

use serde::{Deserialize, Serialize};
use shelter_map_shelter_models::{OperatingHours, ShelterRecord};

/// Facility-type code the upstream source uses for outdoor shelters.
///
/// Every other code is treated as indoor. Both the insert path and the
/// diff path derive the outdoor flag through [`is_outdoor_facility`], so
/// the mapping lives here and nowhere else.
pub const OUTDOOR_FACILITY_CODE: &str = "002";

/// Maps an upstream facility-type code to the outdoor flag.
#[must_use]
pub fn is_outdoor_facility(facility_type: Option<&str>) -> bool {
    facility_type.is_some_and(|code| code.trim() == OUTDOOR_FACILITY_CODE)
}

/// One row of the upstream paginated shelter feed.
///
/// Field names and encodings follow the upstream API. Times are `HHMM` or
/// `HH:MM` strings, coordinates arrive as fixed-point decimals, and the
/// facility type is a raw code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalFeedItem {
    /// Stable facility number.
    #[serde(rename = "fcltyNo")]
    pub facility_no: Option<i64>,
    /// Facility name.
    #[serde(rename = "fcltyNm")]
    pub name: Option<String>,
    /// Street address.
    #[serde(rename = "fcltyAddr")]
    pub address: Option<String>,
    /// Latitude as published upstream.
    #[serde(rename = "la")]
    pub latitude: Option<f64>,
    /// Longitude as published upstream.
    #[serde(rename = "lo")]
    pub longitude: Option<f64>,
    /// Facility-type code (`"002"` = outdoor).
    #[serde(rename = "fcltyTyCd")]
    pub facility_type: Option<String>,
    /// Weekday opening time (`HHMM` or `HH:MM`).
    #[serde(rename = "wkdayOperBeginTime")]
    pub weekday_open: Option<String>,
    /// Weekday closing time.
    #[serde(rename = "wkdayOperEndTime")]
    pub weekday_close: Option<String>,
    /// Weekend opening time.
    #[serde(rename = "wkendOperBeginTime")]
    pub weekend_open: Option<String>,
    /// Weekend closing time.
    #[serde(rename = "wkendOperEndTime")]
    pub weekend_close: Option<String>,
    /// Seated capacity.
    #[serde(rename = "usePsblNmpr")]
    pub capacity: Option<i32>,
    /// Number of fans on site.
    #[serde(rename = "colrHoldElefnCo")]
    pub fan_count: Option<i32>,
    /// Number of air conditioners on site.
    #[serde(rename = "colrHoldArcdtnCo")]
    pub air_conditioner_count: Option<i32>,
}

impl ExternalFeedItem {
    /// Converts the feed row into a canonical [`ShelterRecord`].
    ///
    /// Returns `None` when the row is unusable: missing facility number,
    /// or missing/zero coordinates (the upstream uses zero as a sentinel
    /// for "no location").
    #[must_use]
    pub fn to_record(&self) -> Option<ShelterRecord> {
        let id = self.facility_no?;
        let (latitude, longitude) = parsing::parse_lat_lng(self.latitude, self.longitude)?;

        Some(ShelterRecord {
            id,
            name: self.name.clone(),
            address: self.address.clone(),
            latitude,
            longitude,
            hours: self.hours(),
            capacity: self.capacity,
            is_outdoors: is_outdoor_facility(self.facility_type.as_deref()),
            fan_count: self.fan_count,
            air_conditioner_count: self.air_conditioner_count,
            total_rating: None,
            review_count: None,
            photo_url: None,
        })
    }

    /// Parses the four operating-hour strings into [`OperatingHours`].
    #[must_use]
    pub fn hours(&self) -> OperatingHours {
        OperatingHours {
            weekday_open: parsing::parse_feed_time(self.weekday_open.as_deref()),
            weekday_close: parsing::parse_feed_time(self.weekday_close.as_deref()),
            weekend_open: parsing::parse_feed_time(self.weekend_open.as_deref()),
            weekend_close: parsing::parse_feed_time(self.weekend_close.as_deref()),
        }
    }
}

/// One page of the upstream feed response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedPage {
    /// Rows on this page.
    #[serde(rename = "items", default)]
    pub items: Vec<ExternalFeedItem>,
    /// Total row count across all pages, when reported.
    #[serde(rename = "totalCount")]
    pub total_count: Option<u64>,
    /// Rows per page, when reported.
    #[serde(rename = "numOfRows")]
    pub num_of_rows: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, lat: f64, lng: f64) -> ExternalFeedItem {
        ExternalFeedItem {
            facility_no: Some(id),
            latitude: Some(lat),
            longitude: Some(lng),
            ..ExternalFeedItem::default()
        }
    }

    #[test]
    fn outdoor_code_maps_to_outdoor() {
        assert!(is_outdoor_facility(Some("002")));
        assert!(is_outdoor_facility(Some(" 002 ")));
        assert!(!is_outdoor_facility(Some("001")));
        assert!(!is_outdoor_facility(None));
    }

    #[test]
    fn converts_minimal_row() {
        let record = item(1001, 37.5665, 126.978).to_record().unwrap();
        assert_eq!(record.id, 1001);
        assert!(!record.is_outdoors);
        assert!(record.name.is_none());
    }

    #[test]
    fn rejects_row_without_facility_no() {
        let mut row = item(1, 37.0, 127.0);
        row.facility_no = None;
        assert!(row.to_record().is_none());
    }

    #[test]
    fn rejects_zero_coordinates() {
        assert!(item(1, 0.0, 127.0).to_record().is_none());
        assert!(item(1, 37.0, 0.0).to_record().is_none());
    }

    #[test]
    fn deserializes_upstream_field_names() {
        let json = r#"{
            "fcltyNo": 42,
            "fcltyNm": "Community Center",
            "la": 37.1,
            "lo": 127.2,
            "fcltyTyCd": "002",
            "wkdayOperBeginTime": "0900"
        }"#;
        let row: ExternalFeedItem = serde_json::from_str(json).unwrap();
        let record = row.to_record().unwrap();
        assert!(record.is_outdoors);
        assert_eq!(
            record.hours.weekday_open,
            chrono::NaiveTime::from_hms_opt(9, 0, 0)
        );
    }
}
