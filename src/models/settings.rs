use rusqlite::{params, OptionalExtension};
use std::collections::HashMap;

use crate::db::DbPool;

/// Accessors for the key/value `settings` table.
pub struct Setting;

impl Setting {
    /// Surfaces pool and query errors instead of folding them into `None`.
    pub fn try_get(pool: &DbPool, key: &str) -> Result<Option<String>, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| e.to_string())
    }

    pub fn set_many(pool: &DbPool, settings: &HashMap<String, String>) -> Result<(), String> {
        let mut conn = pool.get().map_err(|e| e.to_string())?;
        let tx = conn.transaction().map_err(|e| e.to_string())?;
        for (key, value) in settings {
            tx.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = ?2",
                params![key, value],
            )
            .map_err(|e| e.to_string())?;
        }
        tx.commit().map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn get_group(pool: &DbPool, prefix: &str) -> HashMap<String, String> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return HashMap::new(),
        };

        let pattern = format!("{}%", prefix);
        let mut stmt = match conn.prepare("SELECT key, value FROM settings WHERE key LIKE ?1") {
            Ok(s) => s,
            Err(_) => return HashMap::new(),
        };

        stmt.query_map(params![pattern], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map(|rows| rows.filter_map(|r| r.ok()).collect())
        .unwrap_or_default()
    }
}
