#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Shelter record store interface.
//!
//! The importer and map query service consume records through the
//! [`RecordStore`] trait; the backing persistence (SQL, document store)
//! lives behind it. The in-memory implementation here backs tests and
//! dry runs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use shelter_map_shelter_models::{BoundingBox, ShelterRecord};
use tokio::sync::RwLock;

/// Errors produced by record store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached or rejected the operation.
    #[error("record store unavailable: {message}")]
    Unavailable {
        /// Description of what went wrong.
        message: String,
    },
}

/// Persistent store of shelter records keyed by upstream facility number.
///
/// Writes happen only from the import run; concurrent readers may observe
/// either pre- or post-update state for any given record.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Looks up a single record by facility number.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the lookup fails.
    async fn find_by_id(&self, id: i64) -> Result<Option<ShelterRecord>, StoreError>;

    /// Looks up all records matching the given facility numbers. Missing
    /// ids are simply absent from the result.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the lookup fails.
    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<ShelterRecord>, StoreError>;

    /// Inserts or replaces a batch of records.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    async fn upsert_batch(&self, records: &[ShelterRecord]) -> Result<(), StoreError>;

    /// Returns records inside the bounding box, ordered by facility
    /// number, paged by `offset`/`limit`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    async fn find_in_bbox(
        &self,
        bbox: &BoundingBox,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<ShelterRecord>, StoreError>;

    /// Counts records inside the bounding box.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    async fn count_in_bbox(&self, bbox: &BoundingBox) -> Result<u64, StoreError>;
}

/// In-memory [`RecordStore`] over a `BTreeMap`, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<BTreeMap<i64, ShelterRecord>>,
}

impl MemoryRecordStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<ShelterRecord>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<ShelterRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(ids.iter().filter_map(|id| records.get(id).cloned()).collect())
    }

    async fn upsert_batch(&self, batch: &[ShelterRecord]) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        for record in batch {
            records.insert(record.id, record.clone());
        }
        Ok(())
    }

    async fn find_in_bbox(
        &self,
        bbox: &BoundingBox,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<ShelterRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| bbox.contains(r.latitude, r.longitude))
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn count_in_bbox(&self, bbox: &BoundingBox) -> Result<u64, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| bbox.contains(r.latitude, r.longitude))
            .count() as u64)
    }
}
