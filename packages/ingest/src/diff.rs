//! Field-by-field diffing of feed rows against stored records.
//!
//! The feed owns a subset of the record's fields; review aggregates and
//! the photo URL are maintained locally and must survive an update
//! untouched. Coordinate changes additionally produce a [`ChangedPoint`]
//! so the cache invalidation step knows which cells went stale.

use shelter_map_shelter_models::{ChangedPoint, ShelterRecord};

/// Result of diffing an incoming feed record against the stored one.
#[derive(Debug, Clone, PartialEq)]
pub enum DiffOutcome {
    /// Every feed-owned field already matches; nothing to write.
    Unchanged,
    /// At least one feed-owned field differs.
    Updated {
        /// The stored record with the feed-owned fields overwritten.
        record: ShelterRecord,
        /// Present only when latitude or longitude changed.
        moved: Option<ChangedPoint>,
    },
}

/// Diffs `incoming` (converted from a feed row) against `existing`.
///
/// Feed-owned fields: name, address, coordinates, hours, capacity,
/// outdoor flag, fan and air-conditioner counts. Locally-owned fields
/// (ratings, review count, photo URL) are carried over from `existing`
/// unchanged.
#[must_use]
#[allow(clippy::float_cmp)] // exact equality is the point: any drift is a change
pub fn diff_record(existing: &ShelterRecord, incoming: &ShelterRecord) -> DiffOutcome {
    let unchanged = existing.name == incoming.name
        && existing.address == incoming.address
        && existing.latitude == incoming.latitude
        && existing.longitude == incoming.longitude
        && existing.hours == incoming.hours
        && existing.capacity == incoming.capacity
        && existing.is_outdoors == incoming.is_outdoors
        && existing.fan_count == incoming.fan_count
        && existing.air_conditioner_count == incoming.air_conditioner_count;

    if unchanged {
        return DiffOutcome::Unchanged;
    }

    let moved = (existing.latitude != incoming.latitude
        || existing.longitude != incoming.longitude)
        .then(|| ChangedPoint {
            id: existing.id,
            old_lat: existing.latitude,
            old_lng: existing.longitude,
            new_lat: incoming.latitude,
            new_lng: incoming.longitude,
        });

    let record = ShelterRecord {
        id: existing.id,
        name: incoming.name.clone(),
        address: incoming.address.clone(),
        latitude: incoming.latitude,
        longitude: incoming.longitude,
        hours: incoming.hours,
        capacity: incoming.capacity,
        is_outdoors: incoming.is_outdoors,
        fan_count: incoming.fan_count,
        air_conditioner_count: incoming.air_conditioner_count,
        total_rating: existing.total_rating,
        review_count: existing.review_count,
        photo_url: existing.photo_url.clone(),
    };

    DiffOutcome::Updated { record, moved }
}

#[cfg(test)]
mod tests {
    use shelter_map_shelter_models::OperatingHours;

    use super::*;

    fn record(id: i64) -> ShelterRecord {
        ShelterRecord {
            id,
            name: Some("Community Center".to_owned()),
            address: Some("1 Main St".to_owned()),
            latitude: 37.5665,
            longitude: 126.978,
            hours: OperatingHours::default(),
            capacity: Some(30),
            is_outdoors: false,
            fan_count: Some(2),
            air_conditioner_count: Some(1),
            total_rating: Some(45),
            review_count: Some(10),
            photo_url: Some("https://example.com/a.jpg".to_owned()),
        }
    }

    #[test]
    fn identical_records_are_unchanged() {
        let existing = record(1);
        let mut incoming = existing.clone();
        // Feed rows never carry the locally-owned fields.
        incoming.total_rating = None;
        incoming.review_count = None;
        incoming.photo_url = None;

        assert_eq!(diff_record(&existing, &incoming), DiffOutcome::Unchanged);
    }

    #[test]
    fn name_change_updates_without_moving() {
        let existing = record(1);
        let mut incoming = existing.clone();
        incoming.name = Some("Renamed Center".to_owned());

        let DiffOutcome::Updated { record, moved } = diff_record(&existing, &incoming) else {
            panic!("expected update");
        };
        assert_eq!(record.name.as_deref(), Some("Renamed Center"));
        assert!(moved.is_none());
    }

    #[test]
    fn latitude_change_produces_changed_point() {
        let existing = record(1);
        let mut incoming = existing.clone();
        incoming.latitude = 37.6;

        let DiffOutcome::Updated { record, moved } = diff_record(&existing, &incoming) else {
            panic!("expected update");
        };
        let moved = moved.unwrap();
        assert_eq!(moved.id, 1);
        assert!((moved.old_lat - 37.5665).abs() < f64::EPSILON);
        assert!((moved.new_lat - 37.6).abs() < f64::EPSILON);
        assert!((moved.old_lng - moved.new_lng).abs() < f64::EPSILON);
        assert!((record.latitude - 37.6).abs() < f64::EPSILON);
    }

    #[test]
    fn update_preserves_locally_owned_fields() {
        let existing = record(1);
        let mut incoming = existing.clone();
        incoming.capacity = Some(50);
        incoming.total_rating = None;
        incoming.review_count = None;
        incoming.photo_url = None;

        let DiffOutcome::Updated { record, .. } = diff_record(&existing, &incoming) else {
            panic!("expected update");
        };
        assert_eq!(record.capacity, Some(50));
        assert_eq!(record.total_rating, Some(45));
        assert_eq!(record.review_count, Some(10));
        assert_eq!(record.photo_url.as_deref(), Some("https://example.com/a.jpg"));
    }

    #[test]
    fn hours_change_is_detected() {
        let existing = record(1);
        let mut incoming = existing.clone();
        incoming.hours.weekday_open = chrono::NaiveTime::from_hms_opt(9, 0, 0);

        assert!(matches!(
            diff_record(&existing, &incoming),
            DiffOutcome::Updated { moved: None, .. }
        ));
    }
}
