//! Per-image metadata record

use app_fs::ImageEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Highest star rating; 0 means unrated
pub const MAX_RATING: u8 = 5;

/// Identifies the record store that owns a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreId(pub u64);

impl StoreId {
    pub fn for_root(root: &Path) -> Self {
        Self(crate::root_hash(root))
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Image record as held in a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub path: PathBuf,
    pub filename: String,
    pub directory: PathBuf,
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
    pub rating: u8,
    pub viewed: bool,
    pub view_count: u32,
    pub last_viewed_at: Option<DateTime<Utc>>,
    pub first_seen_at: DateTime<Utc>,
    /// Assigned when read back from a store, never persisted
    #[serde(skip)]
    pub store_id: Option<StoreId>,
}

impl ImageRecord {
    /// Fresh snapshot of a discovered file with default annotations
    pub fn from_entry(entry: &ImageEntry, seen_at: DateTime<Utc>) -> Self {
        Self {
            path: entry.path.clone(),
            filename: entry.name.clone(),
            directory: entry.directory.clone(),
            size_bytes: entry.size,
            modified_at: DateTime::<Utc>::from(entry.modified),
            rating: 0,
            viewed: false,
            view_count: 0,
            last_viewed_at: None,
            first_seen_at: seen_at,
            store_id: None,
        }
    }

    /// Filename without its extension
    pub fn display_name(&self) -> &str {
        Path::new(&self.filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.filename)
    }

    /// Rating rendered as five stars
    pub fn stars(&self) -> String {
        let filled = usize::from(self.rating.min(MAX_RATING));
        let empty = usize::from(MAX_RATING) - filled;
        format!("{}{}", "★".repeat(filled), "☆".repeat(empty))
    }
}

pub(crate) fn clamp_rating(rating: i64) -> u8 {
    rating.clamp(0, i64::from(MAX_RATING)) as u8
}

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
