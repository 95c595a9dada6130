//! Map cache invalidation after an import commit.
//!
//! Translates the set of records that physically moved during an import
//! into the smallest cache purge that keeps the map cache consistent. A
//! moved shelter must disappear from the cache entries that used to
//! contain it (stale inclusion); its absence from the entries that should
//! now contain it is harmless, since a miss just recomputes. Both the old
//! and new cell are purged anyway because the pattern set is cheap once
//! deduplicated.
//!
//! Whenever the selective path is unavailable or fails partway, the whole
//! map namespace is cleared instead. A partial selective purge is treated
//! as no purge at all; the fallback is more expensive but always correct.

use std::collections::BTreeSet;
use std::sync::Arc;

use shelter_map_cache::CacheStore;
use shelter_map_geo::precision_for_zoom;
use shelter_map_shelter_models::ChangedPoint;

/// Zoom tiers the map cache is keyed under.
pub const ZOOM_TIERS: [u8; 6] = [12, 13, 14, 15, 16, 17];

/// How an invalidation run resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationOutcome {
    /// Nothing changed, so nothing was purged.
    Skipped,
    /// The whole map namespace was cleared.
    FullClear,
    /// Only keys matching the moved-point patterns were deleted.
    Selective {
        /// Number of distinct patterns scanned.
        patterns: usize,
        /// Total keys deleted across all patterns.
        keys_deleted: u64,
    },
}

/// Purges map cache entries made stale by an import run.
pub struct InvalidationCoordinator {
    cache: Arc<dyn CacheStore>,
    namespace: String,
}

impl InvalidationCoordinator {
    /// Creates a coordinator purging under the given cache namespace.
    #[must_use]
    pub fn new(cache: Arc<dyn CacheStore>, namespace: &str) -> Self {
        Self {
            cache,
            namespace: namespace.to_owned(),
        }
    }

    /// Invalidates cache entries affected by one committed import run.
    ///
    /// `changed` reports whether the run wrote anything at all; a run
    /// that changed records without moving any still clears the
    /// namespace, since non-spatial fields (names, capacity) render in
    /// cached summaries too. Cache errors are absorbed here and never
    /// reach the import caller.
    pub async fn invalidate(
        &self,
        moved: &[ChangedPoint],
        changed: bool,
    ) -> InvalidationOutcome {
        if moved.is_empty() && !changed {
            return InvalidationOutcome::Skipped;
        }

        if moved.is_empty() || !self.cache.supports_pattern_scan() {
            return self.full_clear().await;
        }

        let patterns = self.moved_patterns(moved);
        let mut keys_deleted: u64 = 0;

        for pattern in &patterns {
            match self.cache.scan_delete(pattern).await {
                Ok(count) => keys_deleted += count,
                Err(e) => {
                    // A half-finished selective purge is equivalent to no
                    // purge; clear everything instead.
                    log::warn!(
                        "Selective invalidation failed on pattern {pattern}: {e}; \
                         falling back to full clear"
                    );
                    return self.full_clear().await;
                }
            }
        }

        log::info!(
            "Selective invalidation: {keys_deleted} keys deleted across {} patterns",
            patterns.len()
        );
        InvalidationOutcome::Selective {
            patterns: patterns.len(),
            keys_deleted,
        }
    }

    /// Union of distinct cell patterns over all zoom tiers and both the
    /// old and new coordinates of every moved point.
    fn moved_patterns(&self, moved: &[ChangedPoint]) -> BTreeSet<String> {
        let mut patterns = BTreeSet::new();

        for &zoom in &ZOOM_TIERS {
            let precision = precision_for_zoom(zoom);
            for point in moved {
                for (lat, lng) in [
                    (point.old_lat, point.old_lng),
                    (point.new_lat, point.new_lng),
                ] {
                    match shelter_map_geo::cell_id(lat, lng, precision) {
                        Ok(cell) => {
                            // One pattern per span corner, anchored on the
                            // span delimiters: a key whose corner cell
                            // merely contains this cell as a substring must
                            // not match.
                            patterns
                                .insert(format!("{}:z{zoom}:gh:{cell}__*", self.namespace));
                            patterns
                                .insert(format!("{}:z{zoom}:gh:*__{cell}:*", self.namespace));
                        }
                        Err(e) => {
                            log::warn!(
                                "Skipping invalidation cell for record {}: {e}",
                                point.id
                            );
                        }
                    }
                }
            }
        }

        patterns
    }

    async fn full_clear(&self) -> InvalidationOutcome {
        if let Err(e) = self.cache.clear_namespace(&self.namespace).await {
            log::error!("Full cache clear of {} failed: {e}", self.namespace);
        } else {
            log::info!("Cleared map cache namespace {}", self.namespace);
        }
        InvalidationOutcome::FullClear
    }
}

impl std::fmt::Debug for InvalidationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvalidationCoordinator")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}
