//! Routes path-keyed operations across one record store per scan root

use crate::{DbError, ImageRecord, RecordStore, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Result of a bulk upsert across stores
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    /// Store-authoritative records from every partition that committed
    pub records: Vec<ImageRecord>,
    /// Roots whose partition failed, with the reason. Their records are not in `records`.
    pub failed: Vec<(PathBuf, String)>,
}

impl MergeReport {
    /// Every partition committed
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Presents the record store API over every opened root.
///
/// Each path goes to the store whose root is its longest prefix. Bulk
/// operations fan out to all stores; there is no cross-store transaction.
#[derive(Debug)]
pub struct StoreRouter {
    stores: Vec<RecordStore>,
    failed: Vec<(PathBuf, String)>,
}

impl StoreRouter {
    /// Open a store for every root. A root whose store cannot be opened is
    /// reported and left out; the remaining stores keep working.
    pub fn open<P: AsRef<Path>>(roots: &[P]) -> Self {
        let mut seen = HashSet::new();
        let mut stores = Vec::new();
        let mut failed = Vec::new();

        for root in roots {
            let root = root.as_ref();
            if !seen.insert(root.to_path_buf()) {
                continue;
            }
            match RecordStore::open(root) {
                Ok(store) => stores.push(store),
                Err(e) => {
                    tracing::warn!(root = %root.display(), "Could not open record store: {}", e);
                    failed.push((root.to_path_buf(), e.to_string()));
                }
            }
        }

        Self { stores, failed }
    }

    /// Build a router over already opened stores
    pub fn from_stores(stores: Vec<RecordStore>) -> Self {
        Self {
            stores,
            failed: Vec::new(),
        }
    }

    pub fn roots(&self) -> Vec<&Path> {
        self.stores.iter().map(RecordStore::root).collect()
    }

    /// Roots whose store failed to open, with the reason
    pub fn failed_roots(&self) -> &[(PathBuf, String)] {
        &self.failed
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    fn route(&self, path: &Path) -> Option<usize> {
        let best = self
            .stores
            .iter()
            .enumerate()
            .filter(|(_, store)| path.starts_with(store.root()))
            .max_by_key(|(_, store)| store.root().as_os_str().len())
            .map(|(i, _)| i);

        if best.is_none() && !self.stores.is_empty() {
            // Degenerate case: roots are derived from the scanned inputs, so
            // this only happens for paths the caller made up.
            tracing::debug!(path = %path.display(), "No root matches, using the first store");
            return Some(0);
        }
        best
    }

    /// The store responsible for `path`
    pub fn store_for(&self, path: &Path) -> Result<&RecordStore> {
        self.route(path)
            .map(|i| &self.stores[i])
            .ok_or(DbError::NoStore)
    }

    /// Partition by target store, upsert each partition in its own
    /// transaction, and concatenate the merged results in store order.
    ///
    /// A store that fails is logged and reported in [`MergeReport::failed`];
    /// the other partitions still commit.
    pub fn upsert_many(&self, records: &[ImageRecord]) -> Result<MergeReport> {
        if records.is_empty() {
            return Ok(MergeReport::default());
        }
        if self.stores.is_empty() {
            return Err(DbError::NoStore);
        }

        let mut partitions: Vec<Vec<ImageRecord>> = vec![Vec::new(); self.stores.len()];
        for record in records {
            if let Some(i) = self.route(&record.path) {
                partitions[i].push(record.clone());
            }
        }

        let mut report = MergeReport {
            records: Vec::with_capacity(records.len()),
            failed: Vec::new(),
        };
        for (store, partition) in self.stores.iter().zip(partitions) {
            if partition.is_empty() {
                continue;
            }
            match store.upsert_many(&partition) {
                Ok(stored) => report.records.extend(stored),
                Err(e) => {
                    tracing::error!(
                        root = %store.root().display(),
                        count = partition.len(),
                        "Batch upsert failed: {}",
                        e
                    );
                    report.failed.push((store.root().to_path_buf(), e.to_string()));
                }
            }
        }

        Ok(report)
    }

    pub fn get(&self, path: &Path) -> Result<Option<ImageRecord>> {
        self.store_for(path)?.get(path)
    }

    /// Every store's records, concatenated without cross-store ordering
    pub fn get_all(&self) -> Result<Vec<ImageRecord>> {
        let mut all = Vec::new();
        for store in &self.stores {
            match store.get_all() {
                Ok(records) => all.extend(records),
                Err(e) => {
                    tracing::warn!(root = %store.root().display(), "Could not read store: {}", e)
                }
            }
        }
        Ok(all)
    }

    pub fn set_rating(&self, path: &Path, rating: i32) -> Result<bool> {
        self.store_for(path)?.set_rating(path, rating)
    }

    /// Apply a rating delta; `None` when the path is unknown
    pub fn adjust_rating(&self, path: &Path, delta: i32) -> Result<Option<u8>> {
        self.store_for(path)?.adjust_rating(path, delta)
    }

    pub fn mark_viewed(&self, path: &Path) -> Result<bool> {
        self.store_for(path)?.mark_viewed(path)
    }

    pub fn delete(&self, path: &Path) -> Result<bool> {
        self.store_for(path)?.delete(path)
    }

    pub fn set_cached_thumbnail(&self, path: &Path, cache_path: &Path) -> Result<()> {
        self.store_for(path)?.set_cached_thumbnail(path, cache_path)
    }

    pub fn get_cached_thumbnail(&self, path: &Path) -> Result<Option<PathBuf>> {
        self.store_for(path)?.get_cached_thumbnail(path)
    }
}
