use std::path::Path;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

use crate::email::notifications::{GLOBAL_KEY, NOTIFICATION_KEYS};

pub type DbPool = Pool<SqliteConnectionManager>;

pub fn init_pool_at(path: &str) -> Result<DbPool, String> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
        }
    }

    let manager = SqliteConnectionManager::file(path);
    let pool = Pool::builder()
        .max_size(8)
        .build(manager)
        .map_err(|e| format!("Failed to build pool: {}", e))?;

    // WAL keeps settings reads cheap while the queue writes dead letters
    let conn = pool.get().map_err(|e| e.to_string())?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")
        .map_err(|e| e.to_string())?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    let conn = pool.get()?;

    conn.execute_batch(
        "
        -- Key/value settings (notification toggles)
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Messages dropped after exhausting their retries
        CREATE TABLE IF NOT EXISTS email_dead_letters (
            id INTEGER PRIMARY KEY,
            message_id TEXT NOT NULL,
            to_addr TEXT NOT NULL,
            email_type TEXT NOT NULL,
            subject TEXT,
            data_json TEXT NOT NULL DEFAULT '{}',
            attempts INTEGER NOT NULL DEFAULT 0,
            last_error TEXT NOT NULL DEFAULT '',
            failed_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX IF NOT EXISTS idx_dead_letters_failed_at
            ON email_dead_letters(failed_at);
        ",
    )?;

    Ok(())
}

/// Every notification toggle starts enabled; existing values are left alone.
pub fn seed_defaults(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    let conn = pool.get()?;

    let keys = std::iter::once(GLOBAL_KEY).chain(NOTIFICATION_KEYS.iter().map(|(_, key)| *key));
    for key in keys {
        conn.execute(
            "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, "true"],
        )?;
    }

    Ok(())
}
