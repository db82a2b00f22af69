//! SQLite record store for one scan root

use crate::record::{clamp_rating, from_millis, to_millis};
use crate::{init_pool, migrate, resolve_db_path, DbError, DbPool, ImageRecord, Result, StoreId};
use chrono::Utc;
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, Row, TransactionBehavior};
use std::path::{Path, PathBuf};

const SELECT_RECORD: &str = "SELECT filepath, filename, directory, file_size, file_modified, \
     rating, viewed, view_count, last_viewed, first_seen FROM images";

/// Durable table of image records whose paths fall under one root
pub struct RecordStore {
    id: StoreId,
    root: PathBuf,
    db_path: PathBuf,
    pool: DbPool,
}

impl RecordStore {
    /// Open (or create) the store for `root` at its resolved location
    pub fn open(root: &Path) -> Result<Self> {
        let db_path = resolve_db_path(root)?;
        Self::open_at(root, &db_path)
    }

    /// Open the store for `root` backed by an explicit database file
    pub fn open_at(root: &Path, db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.is_dir() {
                return Err(DbError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("database directory missing: {}", parent.display()),
                )));
            }
        }

        let pool = init_pool(db_path)?;
        migrate(&pool)?;

        tracing::info!(root = %root.display(), db = %db_path.display(), "Record store opened");

        Ok(Self {
            id: StoreId::for_root(root),
            root: root.to_path_buf(),
            db_path: db_path.to_path_buf(),
            pool,
        })
    }

    pub fn id(&self) -> StoreId {
        self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| DbError::Pool(e.to_string()))
    }

    fn row_to_record(&self, row: &Row<'_>) -> rusqlite::Result<ImageRecord> {
        let path: String = row.get(0)?;
        let directory: String = row.get(2)?;
        let size: i64 = row.get(3)?;
        let rating: i64 = row.get(5)?;
        let view_count: i64 = row.get(7)?;
        let last_viewed: Option<i64> = row.get(8)?;

        Ok(ImageRecord {
            path: PathBuf::from(path),
            filename: row.get(1)?,
            directory: PathBuf::from(directory),
            size_bytes: size.max(0) as u64,
            modified_at: from_millis(row.get(4)?),
            rating: clamp_rating(rating),
            viewed: row.get(6)?,
            view_count: view_count.clamp(0, i64::from(u32::MAX)) as u32,
            last_viewed_at: last_viewed.map(from_millis),
            first_seen_at: from_millis(row.get(9)?),
            store_id: Some(self.id),
        })
    }

    // ===== Scan merge =====

    /// Insert new records and refresh the file snapshot of existing ones.
    ///
    /// Existing rows keep their rating, viewed flag, view count, last view
    /// and first-seen time; only filename, directory, size and mtime are
    /// written. The whole batch commits in one transaction and the returned
    /// records (input order) carry the merged, persisted state.
    pub fn upsert_many(&self, records: &[ImageRecord]) -> Result<Vec<ImageRecord>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut merged = Vec::with_capacity(records.len());
        {
            let mut upsert = tx.prepare_cached(
                r#"
                INSERT INTO images
                    (filepath, filename, directory, file_size, file_modified,
                     rating, viewed, view_count, last_viewed, first_seen)
                VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, 0, NULL, ?6)
                ON CONFLICT(filepath) DO UPDATE SET
                    filename = excluded.filename,
                    directory = excluded.directory,
                    file_size = excluded.file_size,
                    file_modified = excluded.file_modified
                "#,
            )?;

            for record in records {
                upsert.execute(rusqlite::params![
                    record.path.to_string_lossy(),
                    record.filename,
                    record.directory.to_string_lossy(),
                    record.size_bytes as i64,
                    to_millis(record.modified_at),
                    to_millis(record.first_seen_at),
                ])?;
            }

            let mut select = tx.prepare_cached(&format!("{} WHERE filepath = ?1", SELECT_RECORD))?;
            for record in records {
                let stored = select
                    .query_row([record.path.to_string_lossy()], |row| self.row_to_record(row))?;
                merged.push(stored);
            }
        }

        tx.commit()?;
        tracing::debug!(store = %self.id, count = merged.len(), "Batch upsert committed");
        Ok(merged)
    }

    // ===== Queries =====

    /// Get a record by absolute path
    pub fn get(&self, path: &Path) -> Result<Option<ImageRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(&format!("{} WHERE filepath = ?1", SELECT_RECORD))?;
        let record = stmt
            .query_row([path.to_string_lossy()], |row| self.row_to_record(row))
            .optional()?;
        Ok(record)
    }

    /// All records in this store, unordered
    pub fn get_all(&self) -> Result<Vec<ImageRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(SELECT_RECORD)?;
        let rows = stmt.query_map([], |row| self.row_to_record(row))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }

    // ===== User annotations =====

    /// Set the rating, clamped to 0..=5. Returns false if the path is unknown.
    pub fn set_rating(&self, path: &Path, rating: i32) -> Result<bool> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE images SET rating = ?1 WHERE filepath = ?2",
            rusqlite::params![clamp_rating(i64::from(rating)), path.to_string_lossy()],
        )?;
        Ok(rows > 0)
    }

    /// Add `delta` to the stored rating, clamped to 0..=5, in one statement.
    /// Returns the new rating, or `None` if the path is unknown.
    pub fn adjust_rating(&self, path: &Path, delta: i32) -> Result<Option<u8>> {
        let conn = self.conn()?;
        let rating: Option<i64> = conn
            .query_row(
                "UPDATE images SET rating = MAX(0, MIN(5, rating + ?1))
                 WHERE filepath = ?2 RETURNING rating",
                rusqlite::params![delta, path.to_string_lossy()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(rating.map(clamp_rating))
    }

    /// Record a view. Returns false if the path is unknown.
    pub fn mark_viewed(&self, path: &Path) -> Result<bool> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE images
             SET viewed = 1, view_count = view_count + 1, last_viewed = ?1
             WHERE filepath = ?2",
            rusqlite::params![to_millis(Utc::now()), path.to_string_lossy()],
        )?;
        Ok(rows > 0)
    }

    /// Remove a record permanently. Deleting an unknown path is not an error.
    pub fn delete(&self, path: &Path) -> Result<bool> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "DELETE FROM images WHERE filepath = ?1",
            [path.to_string_lossy()],
        )?;
        Ok(rows > 0)
    }

    // ===== Thumbnail side channel =====

    pub fn set_cached_thumbnail(&self, path: &Path, cache_path: &Path) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE images SET thumbnail_cache = ?1 WHERE filepath = ?2",
            rusqlite::params![cache_path.to_string_lossy(), path.to_string_lossy()],
        )?;
        Ok(())
    }

    pub fn get_cached_thumbnail(&self, path: &Path) -> Result<Option<PathBuf>> {
        let conn = self.conn()?;
        let cached: Option<Option<String>> = conn
            .query_row(
                "SELECT thumbnail_cache FROM images WHERE filepath = ?1",
                [path.to_string_lossy()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(cached.flatten().filter(|p| !p.is_empty()).map(PathBuf::from))
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("id", &self.id)
            .field("root", &self.root)
            .field("db_path", &self.db_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration};
    use tempfile::TempDir;

    fn record(root: &Path, name: &str, size: u64) -> ImageRecord {
        ImageRecord {
            path: root.join(name),
            filename: name.to_string(),
            directory: root.to_path_buf(),
            size_bytes: size,
            modified_at: DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
            rating: 0,
            viewed: false,
            view_count: 0,
            last_viewed_at: None,
            first_seen_at: Utc::now(),
            store_id: None,
        }
    }

    fn open(dir: &TempDir) -> RecordStore {
        RecordStore::open(dir.path()).unwrap()
    }

    #[test]
    fn test_insert_defaults() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);

        let mut input = record(dir.path(), "a.jpg", 10);
        // Annotations on the input are ignored for new rows
        input.rating = 4;
        input.viewed = true;

        let merged = store.upsert_many(&[input]).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].rating, 0);
        assert!(!merged[0].viewed);
        assert_eq!(merged[0].view_count, 0);
        assert!(merged[0].last_viewed_at.is_none());
        assert_eq!(merged[0].store_id, Some(store.id()));
        assert_eq!(store.db_path(), dir.path().join(crate::DB_FILENAME));
    }

    #[test]
    fn test_upsert_preserves_annotations() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        let a = record(dir.path(), "a.jpg", 10);

        let first = store.upsert_many(&[a.clone()]).unwrap().remove(0);
        assert!(store.set_rating(&a.path, 3).unwrap());
        assert!(store.mark_viewed(&a.path).unwrap());
        let annotated = store.get(&a.path).unwrap().unwrap();

        let mut rescanned = record(dir.path(), "a.jpg", 99);
        rescanned.modified_at = a.modified_at + Duration::seconds(60);
        rescanned.first_seen_at = Utc::now() + Duration::days(1);

        let merged = store.upsert_many(&[rescanned.clone()]).unwrap().remove(0);
        assert_eq!(merged.size_bytes, 99);
        assert_eq!(merged.modified_at, rescanned.modified_at);
        assert_eq!(merged.rating, 3);
        assert!(merged.viewed);
        assert_eq!(merged.view_count, 1);
        assert_eq!(merged.last_viewed_at, annotated.last_viewed_at);
        assert_eq!(merged.first_seen_at, first.first_seen_at);
    }

    #[test]
    fn test_rating_is_clamped_and_unknown_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        let a = record(dir.path(), "a.jpg", 1);
        store.upsert_many(&[a.clone()]).unwrap();

        store.set_rating(&a.path, 17).unwrap();
        assert_eq!(store.get(&a.path).unwrap().unwrap().rating, 5);
        store.set_rating(&a.path, -2).unwrap();
        assert_eq!(store.get(&a.path).unwrap().unwrap().rating, 0);

        let ghost = dir.path().join("ghost.jpg");
        assert!(!store.set_rating(&ghost, 3).unwrap());
        assert!(!store.mark_viewed(&ghost).unwrap());
        assert_eq!(store.adjust_rating(&ghost, 1).unwrap(), None);
        assert!(store.get(&ghost).unwrap().is_none());
    }

    #[test]
    fn test_adjust_rating_clamps() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        let a = record(dir.path(), "a.jpg", 1);
        store.upsert_many(&[a.clone()]).unwrap();

        assert_eq!(store.adjust_rating(&a.path, -1).unwrap(), Some(0));
        for expected in 1..=5 {
            assert_eq!(store.adjust_rating(&a.path, 1).unwrap(), Some(expected));
        }
        assert_eq!(store.adjust_rating(&a.path, 1).unwrap(), Some(5));
        assert_eq!(store.adjust_rating(&a.path, -1).unwrap(), Some(4));
    }

    #[test]
    fn test_mark_viewed_counts() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        let a = record(dir.path(), "a.jpg", 1);
        store.upsert_many(&[a.clone()]).unwrap();

        store.mark_viewed(&a.path).unwrap();
        store.mark_viewed(&a.path).unwrap();
        let stored = store.get(&a.path).unwrap().unwrap();
        assert!(stored.viewed);
        assert_eq!(stored.view_count, 2);
        assert!(stored.last_viewed_at.is_some());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        let a = record(dir.path(), "a.jpg", 1);
        let b = record(dir.path(), "b.jpg", 1);
        store.upsert_many(&[a.clone(), b]).unwrap();

        assert!(store.delete(&a.path).unwrap());
        assert!(!store.delete(&a.path).unwrap());
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.get_all().unwrap()[0].filename, "b.jpg");
    }

    #[test]
    fn test_thumbnail_side_channel() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        let a = record(dir.path(), "a.jpg", 1);
        store.upsert_many(&[a.clone()]).unwrap();

        assert!(store.get_cached_thumbnail(&a.path).unwrap().is_none());
        let thumb = dir.path().join(".thumbnails/x.jpg");
        store.set_cached_thumbnail(&a.path, &thumb).unwrap();
        assert_eq!(store.get_cached_thumbnail(&a.path).unwrap(), Some(thumb));

        // Rescans leave the side channel alone
        store.upsert_many(&[a.clone()]).unwrap();
        assert!(store.get_cached_thumbnail(&a.path).unwrap().is_some());
    }

    #[test]
    fn test_reopen_persists() {
        let dir = TempDir::new().unwrap();
        let a = record(dir.path(), "a.jpg", 1);
        {
            let store = open(&dir);
            store.upsert_many(&[a.clone()]).unwrap();
            store.set_rating(&a.path, 2).unwrap();
        }
        let store = open(&dir);
        assert_eq!(store.get(&a.path).unwrap().unwrap().rating, 2);
    }
}
