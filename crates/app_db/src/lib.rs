//! Image viewer persistence layer
//!
//! Provides:
//! - One SQLite record store per scan root (ratings, viewed state, file snapshot)
//! - A router that maps absolute paths to the store of the deepest matching root

mod pool;
mod record;
mod router;
mod schema;
mod sqlite;

pub use pool::{init_pool, DbPool};
pub use record::{ImageRecord, StoreId, MAX_RATING};
pub use router::{MergeReport, StoreRouter};
pub use schema::migrate;
pub use sqlite::RecordStore;

use directories::ProjectDirs;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// Database file kept next to the images when the root is writable
pub const DB_FILENAME: &str = ".image-viewer.db";

/// Database errors
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("No record store is open")]
    NoStore,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Process-wide location for stores whose root cannot hold its own file
pub fn cache_dir() -> PathBuf {
    ProjectDirs::from("io.github", "image-viewer", "image-viewer")
        .map(|dirs| dirs.cache_dir().join("stores"))
        .unwrap_or_else(|| PathBuf::from("./stores"))
}

/// Stable hash of a root directory, used for ids and fallback file names
pub fn root_hash(root: &Path) -> u64 {
    xxh3_64(root.to_string_lossy().as_bytes())
}

/// Pick the durable file for `root`.
///
/// Prefers `<root>/.image-viewer.db`; falls back to
/// `<cache_dir>/<hash>.db` when the root is missing or read-only.
pub fn resolve_db_path(root: &Path) -> Result<PathBuf> {
    resolve_db_path_in(root, &cache_dir())
}

/// [`resolve_db_path`] with an explicit fallback directory
pub fn resolve_db_path_in(root: &Path, cache_dir: &Path) -> Result<PathBuf> {
    if is_writable_dir(root) {
        return Ok(root.join(DB_FILENAME));
    }

    std::fs::create_dir_all(cache_dir)?;
    let path = cache_dir.join(format!("{:016x}.db", root_hash(root)));
    tracing::info!(
        root = %root.display(),
        db = %path.display(),
        "Root is not writable, using cache location"
    );
    Ok(path)
}

fn is_writable_dir(dir: &Path) -> bool {
    if !dir.is_dir() {
        return false;
    }

    let existing = dir.join(DB_FILENAME);
    if existing.exists() {
        return OpenOptions::new().append(true).open(&existing).is_ok();
    }

    let probe = dir.join(format!(".image-viewer.probe-{}", std::process::id()));
    match OpenOptions::new().write(true).create_new(true).open(&probe) {
        Ok(_) => {
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}
