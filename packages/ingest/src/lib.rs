#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Import pipeline converging the record store with the upstream shelter
//! feed.
//!
//! One run pages through the feed sequentially, diffs every row against
//! the stored record, upserts what changed in bounded batches, and only
//! after the final flush hands the list of moved records to the cache
//! invalidation step. Invalidating before the writes land would let a
//! concurrent map query miss the cache and still read the old rows,
//! re-caching stale data.

pub mod diff;
pub mod invalidate;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use shelter_map_feed::{ExternalFeedClient, FeedError};
use shelter_map_shelter_models::{ChangedPoint, ShelterRecord};
use shelter_map_store::{RecordStore, StoreError};

pub use diff::{DiffOutcome, diff_record};
pub use invalidate::{InvalidationCoordinator, InvalidationOutcome, ZOOM_TIERS};

/// How many accumulated writes trigger a flush to the record store.
///
/// Bounds memory and per-batch transaction size; purely a resource
/// policy, the import is correct at any batch size.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Errors that abort an import run outright.
///
/// Feed failures do not appear here: the run absorbs them, flushes what
/// it has, and reports the partial progress instead.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// A record store write or lookup failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of one import run.
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Records inserted or updated.
    pub saved: u64,
    /// Of `saved`, how many were first sightings.
    pub inserted: u64,
    /// Of `saved`, how many were updates to existing records.
    pub updated: u64,
    /// Pages fetched before the run ended.
    pub pages: u64,
    /// Records whose coordinates changed, for cache invalidation.
    pub moved: Vec<ChangedPoint>,
    /// Set when the feed failed mid-run and the report is partial.
    pub feed_error: Option<String>,
    /// How the cache invalidation resolved.
    pub invalidation: Option<InvalidationOutcome>,
}

/// Drives one full import cycle against injected collaborators.
///
/// The importer holds no global state; an external scheduler owns
/// periodicity and guarantees runs never overlap.
pub struct Importer {
    feed: Arc<dyn ExternalFeedClient>,
    store: Arc<dyn RecordStore>,
    invalidator: InvalidationCoordinator,
    batch_size: usize,
}

impl Importer {
    /// Creates an importer over the given collaborators.
    #[must_use]
    pub fn new(
        feed: Arc<dyn ExternalFeedClient>,
        store: Arc<dyn RecordStore>,
        invalidator: InvalidationCoordinator,
    ) -> Self {
        Self {
            feed,
            store,
            invalidator,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Overrides the write batch size.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Runs one import cycle and converges the store with the feed.
    ///
    /// Re-running against an unchanged feed saves nothing. A feed failure
    /// mid-run stops paging but flushes the progress made so far; only a
    /// store failure aborts the run as an error.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError`] if a record store operation fails.
    #[allow(clippy::too_many_lines)]
    pub async fn run_once(&self) -> Result<ImportReport, ImportError> {
        let start = Instant::now();
        let mut report = ImportReport::default();
        let mut pending: BTreeMap<i64, ShelterRecord> = BTreeMap::new();

        let mut page: u32 = 1;
        let mut total_count: Option<u64> = None;
        let mut rows_per_page: Option<u64> = None;

        loop {
            let fetched = match self.feed.fetch_page(page).await {
                Ok(fetched) => fetched,
                Err(e) => {
                    log::warn!("Feed failed on page {page}, keeping partial progress: {e}");
                    report.feed_error = Some(e.to_string());
                    break;
                }
            };

            let Some(feed_page) = fetched else {
                log::info!("Feed page {page} has no body, stopping");
                break;
            };
            report.pages += 1;

            if feed_page.items.is_empty() {
                log::info!("Feed page {page} is empty, stopping");
                break;
            }

            let mut page_saved: u64 = 0;
            for item in &feed_page.items {
                let Some(incoming) = item.to_record() else {
                    log::warn!(
                        "Skipping malformed feed item on page {page} (facilityNo={:?})",
                        item.facility_no
                    );
                    continue;
                };

                // A row already rewritten earlier in this run diffs
                // against its pending version, not the stale stored one.
                let existing = match pending.get(&incoming.id) {
                    Some(record) => Some(record.clone()),
                    None => self.store.find_by_id(incoming.id).await?,
                };

                match existing {
                    None => {
                        pending.insert(incoming.id, incoming);
                        report.inserted += 1;
                        report.saved += 1;
                        page_saved += 1;
                    }
                    Some(existing) => match diff_record(&existing, &incoming) {
                        DiffOutcome::Unchanged => {}
                        DiffOutcome::Updated { record, moved } => {
                            pending.insert(record.id, record);
                            report.updated += 1;
                            report.saved += 1;
                            page_saved += 1;
                            if let Some(point) = moved {
                                report.moved.push(point);
                            }
                        }
                    },
                }
            }

            if pending.len() >= self.batch_size {
                self.flush(&mut pending).await?;
            }

            log::info!(
                "Feed page {page}: {} items, {page_saved} saved",
                feed_page.items.len()
            );

            if let Some(count) = feed_page.total_count {
                total_count = Some(count);
            }
            if let Some(rows) = feed_page.num_of_rows {
                if rows == 0 {
                    // Reported page size of zero: no bound can be computed,
                    // treat this page as the last rather than divide by it.
                    log::warn!("Feed reported numOfRows=0 on page {page}, stopping");
                    break;
                }
                rows_per_page = Some(rows);
            }

            if let (Some(total), Some(rows)) = (total_count, rows_per_page)
                && u64::from(page) >= total.div_ceil(rows)
            {
                break;
            }

            page += 1;
        }

        self.flush(&mut pending).await?;

        // The writes above are the commit; only now is it safe to purge
        // cache entries, otherwise a concurrent query could re-cache the
        // pre-update rows.
        let outcome = self
            .invalidator
            .invalidate(&report.moved, report.saved > 0)
            .await;
        report.invalidation = Some(outcome);

        log::info!(
            "Import complete: {} saved ({} inserted, {} updated, {} moved) over {} pages in {:.1}s",
            report.saved,
            report.inserted,
            report.updated,
            report.moved.len(),
            report.pages,
            start.elapsed().as_secs_f64()
        );

        Ok(report)
    }

    async fn flush(&self, pending: &mut BTreeMap<i64, ShelterRecord>) -> Result<(), ImportError> {
        if pending.is_empty() {
            return Ok(());
        }

        let batch: Vec<ShelterRecord> = pending.values().cloned().collect();
        self.store.upsert_batch(&batch).await?;
        log::debug!("Flushed {} records", batch.len());
        pending.clear();
        Ok(())
    }
}

impl std::fmt::Debug for Importer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Importer")
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

/// Feed errors the importer may observe; re-exported for callers wiring
/// their own feed clients.
pub type FeedResult = Result<Option<shelter_map_feed_models::FeedPage>, FeedError>;

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use shelter_map_cache::MemoryCacheStore;
    use shelter_map_feed_models::{ExternalFeedItem, FeedPage};
    use shelter_map_store::MemoryRecordStore;

    use super::*;

    /// Scripted feed client: one canned response per page, `None` after.
    struct ScriptedFeed {
        pages: Vec<Option<FeedPage>>,
        fetches: AtomicUsize,
        fail_from_page: Option<u32>,
    }

    impl ScriptedFeed {
        fn new(pages: Vec<Option<FeedPage>>) -> Self {
            Self {
                pages,
                fetches: AtomicUsize::new(0),
                fail_from_page: None,
            }
        }

        const fn failing_from(mut self, page: u32) -> Self {
            self.fail_from_page = Some(page);
            self
        }
    }

    #[async_trait]
    impl ExternalFeedClient for ScriptedFeed {
        async fn fetch_page(&self, page: u32) -> FeedResult {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_from_page.is_some_and(|fail| page >= fail) {
                return Err(FeedError::Unavailable {
                    message: "upstream 500".to_owned(),
                });
            }
            Ok(self
                .pages
                .get(usize::try_from(page - 1).unwrap_or(usize::MAX))
                .cloned()
                .flatten())
        }
    }

    fn item(id: i64, lat: f64, lng: f64) -> ExternalFeedItem {
        ExternalFeedItem {
            facility_no: Some(id),
            name: Some(format!("Shelter {id}")),
            latitude: Some(lat),
            longitude: Some(lng),
            ..ExternalFeedItem::default()
        }
    }

    fn page(items: Vec<ExternalFeedItem>, total: u64, rows: u64) -> FeedPage {
        FeedPage {
            items,
            total_count: Some(total),
            num_of_rows: Some(rows),
        }
    }

    fn importer(feed: ScriptedFeed, store: Arc<MemoryRecordStore>) -> Importer {
        let cache = Arc::new(MemoryCacheStore::new());
        Importer::new(
            Arc::new(feed),
            store,
            InvalidationCoordinator::new(cache, "map"),
        )
    }

    #[tokio::test]
    async fn empty_feed_saves_nothing() {
        let store = Arc::new(MemoryRecordStore::new());
        let importer = importer(ScriptedFeed::new(vec![None]), Arc::clone(&store));

        let report = importer.run_once().await.unwrap();
        assert_eq!(report.saved, 0);
        assert_eq!(report.pages, 0);
        assert!(report.feed_error.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn unchanged_feed_is_idempotent() {
        let store = Arc::new(MemoryRecordStore::new());
        let feed_page = page(vec![item(1001, 37.1, 127.1), item(1002, 37.2, 127.2)], 2, 2);

        let first = importer(
            ScriptedFeed::new(vec![Some(feed_page.clone())]),
            Arc::clone(&store),
        );
        let report = first.run_once().await.unwrap();
        assert_eq!(report.saved, 2);
        assert_eq!(report.inserted, 2);

        let second = importer(ScriptedFeed::new(vec![Some(feed_page)]), Arc::clone(&store));
        let report = second.run_once().await.unwrap();
        assert_eq!(report.saved, 0);
        assert!(report.moved.is_empty());
        assert_eq!(report.invalidation, Some(InvalidationOutcome::Skipped));
    }

    #[tokio::test]
    async fn coordinate_change_produces_one_changed_point() {
        let store = Arc::new(MemoryRecordStore::new());
        let original = page(vec![item(1001, 37.1, 127.1), item(1002, 37.2, 127.2)], 2, 2);
        importer(ScriptedFeed::new(vec![Some(original)]), Arc::clone(&store))
            .run_once()
            .await
            .unwrap();

        let shifted = page(vec![item(1001, 37.15, 127.1), item(1002, 37.2, 127.2)], 2, 2);
        let report = importer(ScriptedFeed::new(vec![Some(shifted)]), Arc::clone(&store))
            .run_once()
            .await
            .unwrap();

        assert_eq!(report.saved, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.moved.len(), 1);
        let moved = report.moved[0];
        assert_eq!(moved.id, 1001);
        assert!((moved.old_lat - 37.1).abs() < f64::EPSILON);
        assert!((moved.new_lat - 37.15).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn pages_exactly_to_the_reported_bound() {
        // totalCount=3, numOfRows=2 -> two pages, no probe for page 3.
        let store = Arc::new(MemoryRecordStore::new());
        let feed = Arc::new(ScriptedFeed::new(vec![
            Some(page(vec![item(1001, 37.1, 127.1), item(1002, 37.2, 127.2)], 3, 2)),
            Some(page(vec![item(1003, 37.3, 127.3)], 3, 2)),
        ]));

        let importer = Importer::new(
            Arc::clone(&feed) as Arc<dyn ExternalFeedClient>,
            Arc::clone(&store) as Arc<dyn RecordStore>,
            InvalidationCoordinator::new(Arc::new(MemoryCacheStore::new()), "map"),
        );

        let report = importer.run_once().await.unwrap();
        assert_eq!(report.saved, 3);
        assert_eq!(report.pages, 2);
        assert_eq!(feed.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn zero_rows_per_page_stops_without_dividing() {
        let store = Arc::new(MemoryRecordStore::new());
        let feed = ScriptedFeed::new(vec![Some(page(vec![item(1001, 37.1, 127.1)], 10, 0))]);

        let report = importer(feed, Arc::clone(&store)).run_once().await.unwrap();
        assert_eq!(report.saved, 1);
        assert_eq!(report.pages, 1);
    }

    #[tokio::test]
    async fn feed_failure_keeps_partial_progress() {
        let store = Arc::new(MemoryRecordStore::new());
        let feed = ScriptedFeed::new(vec![
            Some(page(vec![item(1001, 37.1, 127.1), item(1002, 37.2, 127.2)], 10, 2)),
            None,
        ])
        .failing_from(2);

        let report = importer(feed, Arc::clone(&store)).run_once().await.unwrap();
        assert_eq!(report.saved, 2);
        assert!(report.feed_error.is_some());
        // The partial batch still landed in the store.
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn malformed_items_are_skipped_not_fatal() {
        let store = Arc::new(MemoryRecordStore::new());
        let mut bad = item(0, 0.0, 0.0);
        bad.facility_no = None;
        let feed = ScriptedFeed::new(vec![Some(page(
            vec![item(1001, 37.1, 127.1), bad, item(1002, 37.2, 127.2)],
            3,
            3,
        ))]);

        let report = importer(feed, Arc::clone(&store)).run_once().await.unwrap();
        assert_eq!(report.saved, 2);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn duplicate_row_across_pages_diffs_against_pending() {
        // Same facility on both pages, second occurrence unchanged: only
        // one save, even though nothing has been flushed yet.
        let store = Arc::new(MemoryRecordStore::new());
        let feed = ScriptedFeed::new(vec![
            Some(page(vec![item(1001, 37.1, 127.1)], 2, 1)),
            Some(page(vec![item(1001, 37.1, 127.1)], 2, 1)),
        ]);

        let report = importer(feed, Arc::clone(&store)).run_once().await.unwrap();
        assert_eq!(report.saved, 1);
        assert_eq!(store.len().await, 1);
    }
}
