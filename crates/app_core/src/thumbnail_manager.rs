//! On-disk thumbnail cache and background cache fill
//!
//! Thumbnails live in a `.thumbnails` folder next to the images they were
//! made from. File names derive from the image's file name and mtime, so an
//! edited image simply misses the cache and gets a new entry.

use crate::config::CACHE_THUMBNAIL_SIZE;
use crate::AppError;
use app_db::{ImageRecord, StoreRouter};
use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender};
use image::codecs::jpeg::JpegEncoder;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use walkdir::WalkDir;
use xxhash_rust::xxh3::xxh3_64;

/// Cache folder name within each image directory
pub const CACHE_FOLDER: &str = ".thumbnails";

const JPEG_QUALITY: u8 = 85;

/// Generates and looks up cached thumbnails
#[derive(Debug, Clone, Copy)]
pub struct ThumbnailCache {
    size: u32,
}

impl Default for ThumbnailCache {
    fn default() -> Self {
        Self::new(CACHE_THUMBNAIL_SIZE)
    }
}

impl ThumbnailCache {
    pub fn new(size: u32) -> Self {
        Self { size }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Where the thumbnail for `path` at `modified` lives, whether or not it exists yet
    pub fn cache_path_for(path: &Path, modified: DateTime<Utc>) -> PathBuf {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let key = format!("{}:{}", filename, modified.timestamp_millis());
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        dir.join(CACHE_FOLDER)
            .join(format!("{:016x}.jpg", xxh3_64(key.as_bytes())))
    }

    /// Return the cached thumbnail for `path`, generating it if needed
    pub fn get_or_create(&self, path: &Path, modified: DateTime<Utc>) -> Result<PathBuf, AppError> {
        let cache_path = Self::cache_path_for(path, modified);
        if cache_path.is_file() {
            return Ok(cache_path);
        }

        if let Some(dir) = cache_path.parent() {
            fs::create_dir_all(dir)?;
        }

        let img = image::open(path)?;
        let thumb = img.thumbnail(self.size, self.size).to_rgb8();

        // Write next to the target and rename, so readers never see a partial file
        let tmp_path = cache_path.with_extension("jpg.tmp");
        let written = {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            let encoded =
                JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY).encode_image(&thumb);
            encoded
                .map_err(AppError::from)
                .and_then(|()| writer.flush().map_err(AppError::from))
        };
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }
        fs::rename(&tmp_path, &cache_path)?;

        tracing::debug!("Thumbnail created: {}", cache_path.display());
        Ok(cache_path)
    }

    /// Remove the cached thumbnail for `path` at `modified`; true if one existed
    pub fn invalidate(path: &Path, modified: DateTime<Utc>) -> Result<bool, AppError> {
        let cache_path = Self::cache_path_for(path, modified);
        match fs::remove_file(&cache_path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete every cached thumbnail below `base_dirs`; returns the number of files removed
    pub fn clear_all<P: AsRef<Path>>(base_dirs: &[P]) -> usize {
        let mut removed = 0;

        for base in base_dirs {
            let cache_dirs = WalkDir::new(base.as_ref())
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_dir() && e.file_name() == CACHE_FOLDER);

            for dir in cache_dirs {
                let Ok(files) = fs::read_dir(dir.path()) else {
                    continue;
                };
                for file in files.flatten() {
                    let path = file.path();
                    if path.is_file() && fs::remove_file(&path).is_ok() {
                        removed += 1;
                    }
                }
                // Only succeeds once the folder is empty
                let _ = fs::remove_dir(dir.path());
            }
        }

        tracing::info!(removed, "Thumbnail cache cleared");
        removed
    }
}

/// Progress of a [`ThumbnailFill`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailEvent {
    Ready { path: PathBuf, thumbnail: PathBuf },
    Failed { path: PathBuf, error: String },
    Finished { processed: usize, cancelled: bool },
}

/// Fills the thumbnail cache for a set of records on one background thread.
///
/// Cancellation is advisory: the flag is checked before each image, and the
/// image being worked on is finished first.
pub struct ThumbnailFill {
    cancel: Arc<AtomicBool>,
    events: Receiver<ThumbnailEvent>,
    thread: Option<JoinHandle<()>>,
}

impl ThumbnailFill {
    pub fn spawn(
        records: Vec<ImageRecord>,
        router: Arc<StoreRouter>,
        cache: ThumbnailCache,
    ) -> Result<Self, AppError> {
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, events) = crossbeam_channel::unbounded();

        let flag = cancel.clone();
        let thread = std::thread::Builder::new()
            .name("thumbnail-fill".into())
            .spawn(move || fill(records, &router, cache, &flag, &tx))
            .map_err(|e| AppError::Task(format!("Failed to spawn thumbnail thread: {}", e)))?;

        Ok(Self {
            cancel,
            events,
            thread: Some(thread),
        })
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn events(&self) -> &Receiver<ThumbnailEvent> {
        &self.events
    }

    /// Wait for the worker to stop
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Thumbnail thread panicked");
            }
        }
    }
}

impl Drop for ThumbnailFill {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn fill(
    records: Vec<ImageRecord>,
    router: &StoreRouter,
    cache: ThumbnailCache,
    cancel: &AtomicBool,
    tx: &Sender<ThumbnailEvent>,
) {
    let mut processed = 0;

    for record in &records {
        if cancel.load(Ordering::Relaxed) {
            tracing::debug!(processed, "Thumbnail fill cancelled");
            let _ = tx.send(ThumbnailEvent::Finished {
                processed,
                cancelled: true,
            });
            return;
        }

        let event = match cache.get_or_create(&record.path, record.modified_at) {
            Ok(thumbnail) => {
                if let Err(e) = router.set_cached_thumbnail(&record.path, &thumbnail) {
                    tracing::warn!(
                        "Could not record thumbnail for {}: {}",
                        record.path.display(),
                        e
                    );
                }
                ThumbnailEvent::Ready {
                    path: record.path.clone(),
                    thumbnail,
                }
            }
            Err(e) => {
                tracing::debug!("Thumbnail failed for {}: {}", record.path.display(), e);
                ThumbnailEvent::Failed {
                    path: record.path.clone(),
                    error: e.to_string(),
                }
            }
        };
        processed += 1;

        if tx.send(event).is_err() {
            // Receiver gone, nobody is listening
            return;
        }
    }

    let _ = tx.send(ThumbnailEvent::Finished {
        processed,
        cancelled: false,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn write_png(path: &Path, w: u32, h: u32) {
        RgbImage::from_pixel(w, h, Rgb([0, 120, 255])).save(path).unwrap();
    }

    fn mtime(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn test_cache_key_tracks_mtime() {
        let a = ThumbnailCache::cache_path_for(Path::new("/p/x.jpg"), mtime(1_000));
        let b = ThumbnailCache::cache_path_for(Path::new("/p/x.jpg"), mtime(2_000));
        let c = ThumbnailCache::cache_path_for(Path::new("/q/x.jpg"), mtime(1_000));
        assert_ne!(a, b);
        assert_eq!(a.parent().unwrap(), Path::new("/p/.thumbnails"));
        // Same file name and mtime in another folder: same name, different folder
        assert_eq!(a.file_name(), c.file_name());
    }

    #[test]
    fn test_get_or_create_and_invalidate() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("big.png");
        write_png(&image, 512, 256);
        let cache = ThumbnailCache::default();
        assert_eq!(cache.size(), CACHE_THUMBNAIL_SIZE);

        let thumb = cache.get_or_create(&image, mtime(5)).unwrap();
        assert!(thumb.is_file());
        assert_eq!(image::image_dimensions(&thumb).unwrap(), (128, 64));
        assert_eq!(cache.get_or_create(&image, mtime(5)).unwrap(), thumb);

        assert!(ThumbnailCache::invalidate(&image, mtime(5)).unwrap());
        assert!(!thumb.exists());
        assert!(!ThumbnailCache::invalidate(&image, mtime(5)).unwrap());
    }

    #[test]
    fn test_clear_all_counts() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        write_png(&dir.path().join("a.png"), 10, 10);
        write_png(&sub.join("b.png"), 10, 10);

        let cache = ThumbnailCache::default();
        cache.get_or_create(&dir.path().join("a.png"), mtime(1)).unwrap();
        cache.get_or_create(&sub.join("b.png"), mtime(1)).unwrap();

        assert_eq!(ThumbnailCache::clear_all(&[dir.path()]), 2);
        assert!(!sub.join(CACHE_FOLDER).exists());
    }

    #[test]
    fn test_fill_records_thumbnail_in_store() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.png");
        let bad = dir.path().join("bad.jpg");
        write_png(&good, 64, 64);
        fs::write(&bad, b"garbage").unwrap();

        let router = Arc::new(StoreRouter::open(&[dir.path()]));
        let records = crate::scanner::scan_and_merge(&[dir.path()], &router, true)
            .unwrap()
            .records;

        let fill =
            ThumbnailFill::spawn(records, router.clone(), ThumbnailCache::default()).unwrap();
        let events: Vec<ThumbnailEvent> = fill.events().iter().collect();
        fill.join();

        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], ThumbnailEvent::Failed { .. }));
        assert!(matches!(events[1], ThumbnailEvent::Ready { .. }));
        assert_eq!(
            events[2],
            ThumbnailEvent::Finished {
                processed: 2,
                cancelled: false
            }
        );
        assert!(router.get_cached_thumbnail(&good).unwrap().is_some());
        assert!(router.get_cached_thumbnail(&bad).unwrap().is_none());
    }

    #[test]
    fn test_cancelled_fill_stops_before_work() {
        let dir = TempDir::new().unwrap();
        write_png(&dir.path().join("a.png"), 16, 16);
        let router = Arc::new(StoreRouter::open(&[dir.path()]));
        let records = crate::scanner::scan_and_merge(&[dir.path()], &router, true)
            .unwrap()
            .records;

        let cancel = AtomicBool::new(true);
        let (tx, rx) = crossbeam_channel::unbounded();
        fill(records, &router, ThumbnailCache::default(), &cancel, &tx);

        assert_eq!(
            rx.try_recv().unwrap(),
            ThumbnailEvent::Finished {
                processed: 0,
                cancelled: true
            }
        );
        assert!(!dir.path().join(CACHE_FOLDER).exists());
    }

    #[test]
    fn test_cancel_flag_is_shared_with_worker() {
        let router = Arc::new(StoreRouter::from_stores(Vec::new()));
        let fill = ThumbnailFill::spawn(Vec::new(), router, ThumbnailCache::default()).unwrap();
        assert!(!fill.is_cancelled());

        fill.cancel();
        assert!(fill.is_cancelled());
        fill.join();
    }
}
