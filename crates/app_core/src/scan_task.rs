//! Background scanning
//!
//! A scan runs on its own thread and reports back over a bounded channel,
//! so the host's event loop only ever sees finished, store-merged results.

use crate::scanner::{scan_and_merge_with_progress, ScanRequest};
use crate::sort::sort;
use crate::{AppError, SortStrategy};
use app_db::{MergeReport, StoreRouter};
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Forward the first progress report and then every Nth
pub const PROGRESS_EVERY: usize = 50;

const CHANNEL_CAPACITY: usize = 64;

/// Message from a running scan
#[derive(Debug, Clone)]
pub enum ScanEvent {
    Progress { path: PathBuf, count: usize },
    /// Merged records, already sorted, plus any roots whose store rejected the batch
    Complete(MergeReport),
    Failed(String),
}

/// Whether progress report number `count` is passed on to the host
pub fn should_report(count: usize) -> bool {
    count == 1 || count % PROGRESS_EVERY == 0
}

/// Receiving end of a scan started by [`spawn_scan`]
pub struct ScanHandle {
    events: Receiver<ScanEvent>,
    thread: Option<JoinHandle<()>>,
}

/// Start exactly one background thread that scans, merges and sorts
pub fn spawn_scan(
    request: ScanRequest,
    router: Arc<StoreRouter>,
    strategy: SortStrategy,
) -> Result<ScanHandle, AppError> {
    let (tx, events) = bounded(CHANNEL_CAPACITY);

    let thread = std::thread::Builder::new()
        .name("scanner".into())
        .spawn(move || run_scan(&request, &router, strategy, &tx))
        .map_err(|e| AppError::Task(format!("Failed to spawn scan thread: {}", e)))?;

    Ok(ScanHandle {
        events,
        thread: Some(thread),
    })
}

fn run_scan(
    request: &ScanRequest,
    router: &StoreRouter,
    strategy: SortStrategy,
    tx: &Sender<ScanEvent>,
) {
    tracing::info!(paths = ?request.paths, recursive = request.recursive, "Scan started");

    let on_progress = |path: &Path, count: usize| {
        if should_report(count) {
            // UI-rate throttle only, a full channel drops the report
            let _ = tx.try_send(ScanEvent::Progress {
                path: path.to_path_buf(),
                count,
            });
        }
    };
    let result =
        scan_and_merge_with_progress(&request.paths, router, request.recursive, on_progress);

    let event = match result {
        Ok(report) => ScanEvent::Complete(MergeReport {
            records: sort(&report.records, strategy),
            failed: report.failed,
        }),
        Err(e) => {
            tracing::error!("Scan failed: {}", e);
            ScanEvent::Failed(e.to_string())
        }
    };

    if tx.send(event).is_err() {
        tracing::debug!("Scan result dropped, handle already gone");
    }
}

impl ScanHandle {
    pub fn events(&self) -> &Receiver<ScanEvent> {
        &self.events
    }

    /// Non-blocking poll for the host's event loop
    pub fn try_next(&self) -> Option<ScanEvent> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Block until the scan finishes
    pub fn wait(self) -> Result<MergeReport, AppError> {
        self.wait_with_progress(|_, _| {})
    }

    /// Block until the scan finishes, passing forwarded progress to `on_progress`
    pub fn wait_with_progress(
        mut self,
        mut on_progress: impl FnMut(&Path, usize),
    ) -> Result<MergeReport, AppError> {
        let outcome = loop {
            match self.events.recv() {
                Ok(ScanEvent::Progress { path, count }) => on_progress(&path, count),
                Ok(ScanEvent::Complete(report)) => break Ok(report),
                Ok(ScanEvent::Failed(msg)) => break Err(AppError::Task(msg)),
                Err(_) => break Err(AppError::Task("Scan thread exited without a result".into())),
            }
        };

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Scan thread panicked");
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_throttle() {
        let forwarded: Vec<usize> = (1..=120).filter(|&n| should_report(n)).collect();
        assert_eq!(forwarded, vec![1, 50, 100]);
    }

    #[test]
    fn test_scan_completes_sorted() {
        let dir = TempDir::new().unwrap();
        for name in ["c.jpg", "A.png", "b.gif"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let router = Arc::new(StoreRouter::open(&[dir.path()]));

        let handle = spawn_scan(
            ScanRequest::new(vec![dir.path().to_path_buf()], true),
            router,
            SortStrategy::Alpha,
        )
        .unwrap();

        let mut progress = Vec::new();
        let records = handle.wait_with_progress(|_, n| progress.push(n)).unwrap().records;
        let names: Vec<&str> = records.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, ["A.png", "b.gif", "c.jpg"]);
        assert_eq!(progress, vec![1]);
    }

    #[test]
    fn test_scan_without_store_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        let router = Arc::new(StoreRouter::from_stores(Vec::new()));

        let handle = spawn_scan(
            ScanRequest::new(vec![dir.path().to_path_buf()], true),
            router,
            SortStrategy::Alpha,
        )
        .unwrap();
        assert!(matches!(handle.wait(), Err(AppError::Task(_))));
    }

    #[test]
    fn test_polling_reaches_completion() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        let router = Arc::new(StoreRouter::open(&[dir.path()]));

        let handle = spawn_scan(
            ScanRequest::new(vec![dir.path().to_path_buf()], true),
            router,
            SortStrategy::Alpha,
        )
        .unwrap();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
        let records = loop {
            match handle.try_next() {
                Some(ScanEvent::Complete(report)) => break report.records,
                Some(ScanEvent::Failed(msg)) => panic!("scan failed: {}", msg),
                Some(ScanEvent::Progress { .. }) => {}
                None => {
                    assert!(std::time::Instant::now() < deadline, "scan never completed");
                    std::thread::sleep(std::time::Duration::from_millis(5));
                }
            }
        };
        assert_eq!(records.len(), 1);
    }
}
