//! Database schema and migrations

use crate::{DbError, DbPool, Result};

const SCHEMA_VERSION: i32 = 1;

/// Run database migrations
pub fn migrate(pool: &DbPool) -> Result<()> {
    let conn = pool.get().map_err(|e| DbError::Pool(e.to_string()))?;

    let current_version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if current_version > SCHEMA_VERSION {
        return Err(DbError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current_version, SCHEMA_VERSION
        )));
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            "Migrating database from version {} to {}",
            current_version,
            SCHEMA_VERSION
        );

        if current_version < 1 {
            apply_v1(&conn)?;
        }

        conn.execute_batch(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))?;
    }

    Ok(())
}

fn apply_v1(conn: &rusqlite::Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- One row per discovered image file
        CREATE TABLE IF NOT EXISTS images (
            id INTEGER PRIMARY KEY AUTOINCREMENT,

            -- Absolute path, identity key
            filepath TEXT NOT NULL UNIQUE,

            -- Refreshed on every scan
            filename TEXT NOT NULL,
            directory TEXT NOT NULL,
            file_size INTEGER NOT NULL DEFAULT 0,
            file_modified INTEGER NOT NULL DEFAULT 0,

            -- User annotations, never touched by a rescan
            rating INTEGER NOT NULL DEFAULT 0 CHECK (rating BETWEEN 0 AND 5),
            viewed INTEGER NOT NULL DEFAULT 0,
            view_count INTEGER NOT NULL DEFAULT 0,
            last_viewed INTEGER,
            first_seen INTEGER NOT NULL,

            -- Disposable side channel
            thumbnail_cache TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_images_directory ON images(directory);
        CREATE INDEX IF NOT EXISTS idx_images_rating ON images(rating);
        CREATE INDEX IF NOT EXISTS idx_images_viewed ON images(viewed);
        "#,
    )?;

    Ok(())
}
