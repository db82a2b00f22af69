//! Application state management

use crate::scan_task::{spawn_scan, ScanHandle};
use crate::scanner::ScanRequest;
use crate::slideshow::{Clock, SlideshowController, SlideshowEvent};
use crate::sort::sort;
use crate::{AppError, Result, SharedConfig, SortStrategy};
use app_db::{ImageRecord, StoreRouter};
use app_fs::derive_scan_roots;
use crossbeam_channel::Receiver;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Library state shared by the views: configuration, stores and the
/// current sorted snapshot of records.
///
/// The stores are the source of truth. The snapshot is replaced after every
/// mutation by re-reading the affected records, never patched in place.
pub struct AppState {
    config: SharedConfig,
    router: Arc<StoreRouter>,
    request: ScanRequest,
    images: RwLock<Vec<ImageRecord>>,
}

impl AppState {
    /// Derive the scan roots for `paths` and open one store per root.
    ///
    /// Fails only when no store at all could be opened.
    pub fn open<P: AsRef<Path>>(config: SharedConfig, paths: &[P]) -> Result<Self> {
        let roots = derive_scan_roots(paths)?;
        let router = StoreRouter::open(&roots);

        for (root, reason) in router.failed_roots() {
            tracing::warn!(root = %root.display(), "Store unavailable: {}", reason);
        }
        if router.is_empty() {
            return Err(AppError::NoStore);
        }

        let recursive = config.with(|c| c.defaults.recursive);
        let request = ScanRequest::new(
            paths.iter().map(|p| p.as_ref().to_path_buf()).collect(),
            recursive,
        );

        tracing::info!(roots = roots.len(), "Library opened");
        Ok(Self {
            config,
            router: Arc::new(router),
            request,
            images: RwLock::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    pub fn router(&self) -> &Arc<StoreRouter> {
        &self.router
    }

    pub fn scan_request(&self) -> &ScanRequest {
        &self.request
    }

    /// Current sorted snapshot
    pub fn images(&self) -> Vec<ImageRecord> {
        self.images.read().clone()
    }

    pub fn len(&self) -> usize {
        self.images.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.read().is_empty()
    }

    /// Scan the configured paths on a background thread
    pub fn start_scan(&self) -> Result<ScanHandle> {
        let strategy = self.config.with(|c| c.defaults.sort);
        spawn_scan(self.request.clone(), self.router.clone(), strategy)
    }

    /// Adopt the sorted result of a finished scan as the snapshot
    pub fn apply_scan(&self, records: Vec<ImageRecord>) {
        tracing::debug!(count = records.len(), "Scan result applied");
        *self.images.write() = records;
    }

    /// Re-read every snapshot record from the stores and re-sort.
    ///
    /// Records that disappeared from their store are dropped.
    pub fn refresh(&self) -> Result<usize> {
        let paths: Vec<PathBuf> = self.images.read().iter().map(|r| r.path.clone()).collect();

        let mut fresh = Vec::with_capacity(paths.len());
        for path in &paths {
            if let Some(record) = self.router.get(path)? {
                fresh.push(record);
            }
        }

        let strategy = self.config.with(|c| c.defaults.sort);
        let sorted = sort(&fresh, strategy);
        let count = sorted.len();
        *self.images.write() = sorted;
        Ok(count)
    }

    fn reload_one(&self, path: &Path) -> Result<()> {
        let fresh = self.router.get(path)?;
        let mut images = self.images.write();
        match fresh {
            Some(record) => {
                if let Some(slot) = images.iter_mut().find(|r| r.path == path) {
                    *slot = record;
                }
            }
            None => images.retain(|r| r.path != path),
        }
        Ok(())
    }

    /// Apply a rating delta; returns the new clamped rating, `None` for unknown paths
    pub fn update_rating(&self, path: &Path, delta: i32) -> Result<Option<u8>> {
        let rating = self.router.adjust_rating(path, delta)?;
        self.reload_one(path)?;
        Ok(rating)
    }

    pub fn mark_viewed(&self, path: &Path) -> Result<bool> {
        let marked = self.router.mark_viewed(path)?;
        self.reload_one(path)?;
        Ok(marked)
    }

    /// Remove the file from disk and its record from the store
    pub fn delete_image(&self, path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => tracing::info!("Deleted: {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(app_fs::FsError::from_io(e, path).into()),
        }
        self.router.delete(path)?;
        self.images.write().retain(|r| r.path != path);
        Ok(())
    }

    /// Switch the sort strategy, persist it and re-sort the snapshot
    pub fn set_sort(&self, strategy: SortStrategy) -> Result<()> {
        self.config.update(|c| c.defaults.sort = strategy)?;
        let sorted = sort(&self.images.read(), strategy);
        *self.images.write() = sorted;
        Ok(())
    }

    /// A slideshow over the current snapshot, starting at `start_index`
    pub fn slideshow(
        &self,
        clock: Arc<dyn Clock>,
        start_index: usize,
    ) -> (SlideshowController, Receiver<SlideshowEvent>) {
        let (mut controller, events) =
            SlideshowController::new(self.config.clone(), self.router.clone(), clock);
        controller.load(self.images(), start_index);
        (controller, events)
    }
}
