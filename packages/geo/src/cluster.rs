//! Cell-level clustering for coarse map rendering.
//!
//! Groups a point set by cell id at a target precision and reduces each
//! group to its arithmetic-mean centroid and member count. An arithmetic
//! mean is not a geodesic centroid, which is acceptable at cluster
//! granularity where a cell is at most a few hundred meters wide.

use std::collections::BTreeMap;

/// One cluster feature: a cell, its centroid, and how many points it holds.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// Cell identifier the members bucket into.
    pub cell_id: String,
    /// Arithmetic mean of member latitudes.
    pub centroid_lat: f64,
    /// Arithmetic mean of member longitudes.
    pub centroid_lng: f64,
    /// Number of member points.
    pub count: usize,
}

/// Groups `(lat, lng)` points by cell at the given precision.
///
/// Returns one [`Cluster`] per distinct cell, in unspecified order. An
/// empty input yields an empty result. Points with non-finite coordinates
/// are skipped with a warning rather than failing the whole set.
#[must_use]
pub fn cluster_points(points: &[(f64, f64)], precision: u8) -> Vec<Cluster> {
    let mut groups: BTreeMap<String, Vec<(f64, f64)>> = BTreeMap::new();

    for &(lat, lng) in points {
        match crate::cell_id(lat, lng, precision) {
            Ok(cell) => groups.entry(cell).or_default().push((lat, lng)),
            Err(e) => {
                log::warn!("Skipping unclusterable point ({lat}, {lng}): {e}");
            }
        }
    }

    groups
        .into_iter()
        .map(|(cell_id, members)| {
            #[allow(clippy::cast_precision_loss)]
            let n = members.len() as f64;
            let (lat_sum, lng_sum) = members
                .iter()
                .fold((0.0, 0.0), |(la, lo), &(lat, lng)| (la + lat, lo + lng));

            Cluster {
                cell_id,
                centroid_lat: lat_sum / n,
                centroid_lng: lng_sum / n,
                count: members.len(),
            }
        })
        .collect()
}
