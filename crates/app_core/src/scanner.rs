//! Directory scanning and merge into the record stores

use crate::Result;
use app_db::{ImageRecord, MergeReport, StoreRouter};
use app_fs::ImageWalker;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// What to scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub paths: Vec<PathBuf>,
    pub recursive: bool,
}

impl ScanRequest {
    pub fn new(paths: Vec<PathBuf>, recursive: bool) -> Self {
        Self { paths, recursive }
    }
}

/// Lazily yield a fresh snapshot record for every supported image under `paths`.
///
/// Annotation fields carry defaults; the stores supply the real values on upsert.
pub fn iter_images<'a, P: AsRef<Path>>(
    paths: &[P],
    recursive: bool,
) -> impl Iterator<Item = ImageRecord> + 'a {
    ImageWalker::<'a>::new(paths, recursive)
        .map(|entry| ImageRecord::from_entry(&entry, Utc::now()))
}

/// Walk `paths`, then merge everything found with one bulk upsert.
///
/// Files under a root whose store failed are listed in the report's
/// `failed` roots instead of its records.
pub fn scan_and_merge<P: AsRef<Path>>(
    paths: &[P],
    router: &StoreRouter,
    recursive: bool,
) -> Result<MergeReport> {
    scan_and_merge_with_progress(paths, router, recursive, |_, _| {})
}

/// [`scan_and_merge`] with a callback after every discovered file
pub fn scan_and_merge_with_progress<P, F>(
    paths: &[P],
    router: &StoreRouter,
    recursive: bool,
    on_progress: F,
) -> Result<MergeReport>
where
    P: AsRef<Path>,
    F: FnMut(&Path, usize),
{
    let started = Instant::now();

    let found: Vec<ImageRecord> = ImageWalker::new(paths, recursive)
        .with_progress(on_progress)
        .map(|entry| ImageRecord::from_entry(&entry, Utc::now()))
        .collect();
    let walked = started.elapsed();

    let merged = router.upsert_many(&found)?;
    for (root, reason) in &merged.failed {
        tracing::warn!(root = %root.display(), "Scan results not stored: {}", reason);
    }

    tracing::info!(
        found = found.len(),
        merged = merged.records.len(),
        failed_stores = merged.failed.len(),
        walk_ms = walked.as_millis() as u64,
        total_ms = started.elapsed().as_millis() as u64,
        "Scan complete"
    );
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"jpeg bytes").unwrap();
    }

    #[test]
    fn test_iter_images_defaults() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a.jpg"));
        touch(&dir.path().join("notes.txt"));

        let records: Vec<_> = iter_images(&[dir.path()], true).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].rating, 0);
        assert!(!records[0].viewed);
        assert!(records[0].path.is_absolute());
    }

    #[test]
    fn test_scan_preserves_rating() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("a.jpg");
        touch(&image);
        let router = StoreRouter::open(&[dir.path()]);

        scan_and_merge(&[dir.path()], &router, true).unwrap();
        router.set_rating(&image, 4).unwrap();
        router.mark_viewed(&image).unwrap();

        let merged = scan_and_merge(&[dir.path()], &router, true).unwrap().records;
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].rating, 4);
        assert!(merged[0].viewed);
        assert_eq!(merged[0].view_count, 1);
    }

    #[test]
    fn test_progress_counts_every_file() {
        let dir = TempDir::new().unwrap();
        for name in ["1.jpg", "2.png", "sub/3.gif"] {
            touch(&dir.path().join(name));
        }
        let router = StoreRouter::open(&[dir.path()]);

        let mut counts = Vec::new();
        let report =
            scan_and_merge_with_progress(&[dir.path()], &router, true, |_, n| counts.push(n))
                .unwrap();
        assert!(report.is_complete());
        assert_eq!(report.records.len(), 3);
        assert_eq!(counts, vec![1, 2, 3]);
    }
}
