#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Bounding-box map query service.
//!
//! Answers viewport queries at a granularity chosen from the viewport
//! size and zoom: wide or far-out views get per-cell clusters, closer
//! views get per-shelter rows. Results are cached under a canonical
//! snapped-viewport key behind a single-flight decorator, so a burst of
//! identical viewports computes once. Cache trouble degrades to direct
//! store reads; the only error callers ever see is a malformed bounding
//! box.

pub mod keys;
pub mod models;

use std::sync::Arc;

use shelter_map_cache::{CacheStore, SingleFlightCache};
use shelter_map_geo::{GeoError, cluster_points, precision_for_zoom};
use shelter_map_shelter_models::BoundingBox;
use shelter_map_store::{RecordStore, StoreError};

pub use keys::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, clamp_paging, query_key};
pub use models::{MapFeature, MapLevel, MapQueryResult};

/// Viewport span (degrees, either axis) beyond which a query is always
/// answered with clusters, regardless of zoom.
pub const CLUSTER_SPAN_DEGREES: f64 = 3.0;

/// Chunk size for draining all bbox points in cluster mode.
const CLUSTER_FETCH_CHUNK: u64 = 500;

/// Errors a map query can produce.
#[derive(Debug, thiserror::Error)]
pub enum MapQueryError {
    /// The caller's bounding box was degenerate or non-finite.
    #[error(transparent)]
    Geo(#[from] GeoError),

    /// The record store could not be read.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A computed result could not be serialized for caching.
    #[error("result encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A bounding-box map query as received from the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapQuery {
    /// Southern latitude boundary.
    pub min_lat: f64,
    /// Western longitude boundary.
    pub min_lng: f64,
    /// Northern latitude boundary.
    pub max_lat: f64,
    /// Eastern longitude boundary.
    pub max_lng: f64,
    /// Map-viewer zoom level.
    pub zoom: u8,
    /// Requested page, if any.
    pub page: Option<i64>,
    /// Requested page size, if any.
    pub size: Option<i64>,
}

/// Serves bounding-box map queries from the record store through the
/// map cache.
pub struct MapQueryService {
    store: Arc<dyn RecordStore>,
    cache: SingleFlightCache,
    namespace: String,
}

impl MapQueryService {
    /// Creates a service reading from `store` and caching under
    /// `namespace`.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, cache: Arc<dyn CacheStore>, namespace: &str) -> Self {
        Self {
            store,
            cache: SingleFlightCache::new(cache),
            namespace: namespace.to_owned(),
        }
    }

    /// Answers a bounding-box query at the appropriate granularity.
    ///
    /// # Errors
    ///
    /// Returns [`MapQueryError::Geo`] for a degenerate or non-finite
    /// bounding box. Store failures surface as
    /// [`MapQueryError::Store`]; cache failures never do.
    pub async fn query(&self, query: MapQuery) -> Result<MapQueryResult, MapQueryError> {
        let bbox = BoundingBox::new(query.min_lat, query.min_lng, query.max_lat, query.max_lng);
        let (page, size) = clamp_paging(query.page, query.size);

        // Key construction doubles as bbox validation.
        let key = query_key(&self.namespace, query.zoom, &bbox, page, size)?;
        let level = Self::level_for(&bbox, query.zoom);

        let encoded = self
            .cache
            .get_or_compute(&key, || async {
                let result = self.compute(&bbox, level, query.zoom, page, size).await?;
                Ok::<_, MapQueryError>(serde_json::to_string(&result)?)
            })
            .await?;

        match serde_json::from_str(&encoded) {
            Ok(result) => Ok(result),
            Err(e) => {
                // A corrupt cache entry must not fail the caller.
                log::warn!("Discarding undecodable cache entry {key}: {e}");
                self.compute(&bbox, level, query.zoom, page, size).await
            }
        }
    }

    /// Chooses the response granularity for a viewport.
    ///
    /// A span wider than [`CLUSTER_SPAN_DEGREES`] on either axis forces
    /// cluster mode even at close zooms.
    #[must_use]
    pub fn level_for(bbox: &BoundingBox, zoom: u8) -> MapLevel {
        if bbox.span_lat() > CLUSTER_SPAN_DEGREES
            || bbox.span_lng() > CLUSTER_SPAN_DEGREES
            || zoom < shelter_map_geo::ZOOM_SUMMARY
        {
            MapLevel::Cluster
        } else if zoom < shelter_map_geo::ZOOM_DETAIL {
            MapLevel::Summary
        } else {
            MapLevel::Detail
        }
    }

    async fn compute(
        &self,
        bbox: &BoundingBox,
        level: MapLevel,
        zoom: u8,
        page: u64,
        size: u64,
    ) -> Result<MapQueryResult, MapQueryError> {
        match level {
            MapLevel::Cluster => self.compute_clusters(bbox, zoom).await,
            // Detail shares the summary data path for now.
            MapLevel::Summary | MapLevel::Detail => {
                let records = self.store.find_in_bbox(bbox, page * size, size).await?;
                let total = self.store.count_in_bbox(bbox).await?;
                Ok(MapQueryResult {
                    level,
                    items: records.iter().map(MapFeature::from).collect(),
                    total,
                })
            }
        }
    }

    async fn compute_clusters(
        &self,
        bbox: &BoundingBox,
        zoom: u8,
    ) -> Result<MapQueryResult, MapQueryError> {
        let mut points: Vec<(f64, f64)> = Vec::new();
        let mut offset: u64 = 0;

        loop {
            let chunk = self
                .store
                .find_in_bbox(bbox, offset, CLUSTER_FETCH_CHUNK)
                .await?;
            let fetched = chunk.len() as u64;
            points.extend(chunk.iter().map(|r| (r.latitude, r.longitude)));

            if fetched < CLUSTER_FETCH_CHUNK {
                break;
            }
            offset += fetched;
        }

        let total = points.len() as u64;
        let clusters = cluster_points(&points, precision_for_zoom(zoom));

        Ok(MapQueryResult {
            level: MapLevel::Cluster,
            items: clusters
                .into_iter()
                .map(|c| MapFeature::Cluster {
                    cell_id: c.cell_id,
                    centroid_lat: c.centroid_lat,
                    centroid_lng: c.centroid_lng,
                    count: c.count,
                })
                .collect(),
            total,
        })
    }
}

impl std::fmt::Debug for MapQueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapQueryService")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use shelter_map_cache::MemoryCacheStore;
    use shelter_map_shelter_models::{OperatingHours, ShelterRecord};
    use shelter_map_store::MemoryRecordStore;

    use super::*;

    fn record(id: i64, lat: f64, lng: f64) -> ShelterRecord {
        ShelterRecord {
            id,
            name: Some(format!("Shelter {id}")),
            address: None,
            latitude: lat,
            longitude: lng,
            hours: OperatingHours::default(),
            capacity: Some(20),
            is_outdoors: false,
            fan_count: None,
            air_conditioner_count: None,
            total_rating: None,
            review_count: None,
            photo_url: None,
        }
    }

    async fn seeded_store(records: &[ShelterRecord]) -> Arc<MemoryRecordStore> {
        let store = Arc::new(MemoryRecordStore::new());
        store.upsert_batch(records).await.unwrap();
        store
    }

    fn query(bbox: (f64, f64, f64, f64), zoom: u8) -> MapQuery {
        MapQuery {
            min_lat: bbox.0,
            min_lng: bbox.1,
            max_lat: bbox.2,
            max_lng: bbox.3,
            zoom,
            page: None,
            size: None,
        }
    }

    #[test]
    fn wide_span_forces_clusters_over_zoom() {
        let wide = BoundingBox::new(33.0, 126.0, 38.0, 127.0);
        assert_eq!(MapQueryService::level_for(&wide, 15), MapLevel::Cluster);

        let mid = BoundingBox::new(37.0, 127.0, 37.1, 127.1);
        assert_eq!(MapQueryService::level_for(&mid, 14), MapLevel::Summary);

        let tight = BoundingBox::new(37.0, 127.0, 37.01, 127.01);
        assert_eq!(MapQueryService::level_for(&tight, 17), MapLevel::Detail);
    }

    #[tokio::test]
    async fn cluster_mode_groups_and_reports_raw_total() {
        let store = seeded_store(&[
            record(1, 37.56651, 126.97801),
            record(2, 37.56652, 126.97802),
            record(3, 35.1796, 129.0756),
        ])
        .await;
        let service =
            MapQueryService::new(store, Arc::new(MemoryCacheStore::new()), "map");

        let result = service
            .query(query((34.0, 126.0, 38.0, 130.0), 10))
            .await
            .unwrap();

        assert_eq!(result.level, MapLevel::Cluster);
        assert_eq!(result.total, 3);
        assert_eq!(result.items.len(), 2);
        let counts: usize = result
            .items
            .iter()
            .map(|f| match f {
                MapFeature::Cluster { count, .. } => *count,
                MapFeature::ShelterPoint { .. } => panic!("expected clusters"),
            })
            .sum();
        assert_eq!(counts, 3);
    }

    #[tokio::test]
    async fn summary_mode_returns_shelter_points() {
        let store = seeded_store(&[record(1, 37.05, 127.05), record(2, 37.06, 127.06)]).await;
        let service =
            MapQueryService::new(store, Arc::new(MemoryCacheStore::new()), "map");

        let result = service
            .query(query((37.0, 127.0, 37.1, 127.1), 14))
            .await
            .unwrap();

        assert_eq!(result.level, MapLevel::Summary);
        assert_eq!(result.total, 2);
        assert!(matches!(result.items[0], MapFeature::ShelterPoint { .. }));
    }

    #[tokio::test]
    async fn invalid_bbox_is_rejected() {
        let store = seeded_store(&[]).await;
        let service =
            MapQueryService::new(store, Arc::new(MemoryCacheStore::new()), "map");

        let result = service.query(query((37.5, 127.0, 37.0, 127.1), 14)).await;
        assert!(matches!(
            result,
            Err(MapQueryError::Geo(GeoError::InvalidBoundingBox { .. }))
        ));

        let result = service
            .query(query((f64::NAN, 127.0, 37.6, 127.1), 14))
            .await;
        assert!(matches!(
            result,
            Err(MapQueryError::Geo(GeoError::InvalidCoordinate { .. }))
        ));
    }

    /// Store decorator counting bbox reads, to observe cache hits.
    struct CountingStore {
        inner: Arc<MemoryRecordStore>,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl RecordStore for CountingStore {
        async fn find_by_id(&self, id: i64) -> Result<Option<ShelterRecord>, StoreError> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<ShelterRecord>, StoreError> {
            self.inner.find_by_ids(ids).await
        }

        async fn upsert_batch(&self, records: &[ShelterRecord]) -> Result<(), StoreError> {
            self.inner.upsert_batch(records).await
        }

        async fn find_in_bbox(
            &self,
            bbox: &BoundingBox,
            offset: u64,
            limit: u64,
        ) -> Result<Vec<ShelterRecord>, StoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.find_in_bbox(bbox, offset, limit).await
        }

        async fn count_in_bbox(&self, bbox: &BoundingBox) -> Result<u64, StoreError> {
            self.inner.count_in_bbox(bbox).await
        }
    }

    #[tokio::test]
    async fn equivalent_viewports_share_a_cache_entry() {
        let seeded = seeded_store(&[record(1, 37.05, 127.05)]).await;
        let store = Arc::new(CountingStore {
            inner: seeded,
            reads: AtomicUsize::new(0),
        });
        let service = MapQueryService::new(
            Arc::clone(&store) as Arc<dyn RecordStore>,
            Arc::new(MemoryCacheStore::new()),
            "map",
        );

        // Corners differ below cell resolution; snapped keys are equal.
        let first = service
            .query(query((37.00001, 127.00001, 37.10001, 127.10001), 14))
            .await
            .unwrap();
        let second = service
            .query(query((37.00003, 127.00003, 37.10003, 127.10003), 14))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(store.reads.load(Ordering::SeqCst), 1);
    }
}
