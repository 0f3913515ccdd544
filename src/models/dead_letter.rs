use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::db::DbPool;

/// A message the queue gave up on, kept for inspection or a manual requeue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    pub id: i64,
    pub message_id: String,
    pub to_addr: String,
    pub email_type: String,
    pub subject: Option<String>,
    pub data_json: String,
    pub attempts: i64,
    pub last_error: String,
    pub failed_at: String,
}

#[derive(Debug, Clone)]
pub struct NewDeadLetter<'a> {
    pub message_id: &'a str,
    pub to_addr: &'a str,
    pub email_type: &'a str,
    pub subject: Option<&'a str>,
    pub data_json: &'a str,
    pub attempts: i64,
    pub last_error: &'a str,
}

const COLUMNS: &str =
    "id, message_id, to_addr, email_type, subject, data_json, attempts, last_error, failed_at";

impl DeadLetter {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(DeadLetter {
            id: row.get("id")?,
            message_id: row.get("message_id")?,
            to_addr: row.get("to_addr")?,
            email_type: row.get("email_type")?,
            subject: row.get("subject")?,
            data_json: row.get("data_json")?,
            attempts: row.get("attempts")?,
            last_error: row.get("last_error")?,
            failed_at: row.get::<_, Option<String>>("failed_at")?.unwrap_or_default(),
        })
    }

    pub fn create(pool: &DbPool, entry: &NewDeadLetter) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO email_dead_letters \
             (message_id, to_addr, email_type, subject, data_json, attempts, last_error) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.message_id,
                entry.to_addr,
                entry.email_type,
                entry.subject,
                entry.data_json,
                entry.attempts,
                entry.last_error,
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            &format!("SELECT {} FROM email_dead_letters WHERE id = ?1", COLUMNS),
            params![id],
            Self::from_row,
        )
        .ok()
    }

    /// Most recent first.
    pub fn list(pool: &DbPool, limit: i64, offset: i64) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(&format!(
            "SELECT {} FROM email_dead_letters ORDER BY id DESC LIMIT ?1 OFFSET ?2",
            COLUMNS
        )) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map(params![limit, offset], Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn count(pool: &DbPool) -> i64 {
        pool.get()
            .ok()
            .and_then(|conn| {
                conn.query_row("SELECT COUNT(*) FROM email_dead_letters", [], |row| {
                    row.get(0)
                })
                .ok()
            })
            .unwrap_or(0)
    }

    pub fn delete(pool: &DbPool, id: i64) -> Result<bool, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let affected = conn
            .execute("DELETE FROM email_dead_letters WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        Ok(affected > 0)
    }

    pub fn cleanup(pool: &DbPool, max_age_days: u64) -> Result<u64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let count = conn
            .execute(
                "DELETE FROM email_dead_letters WHERE failed_at < datetime('now', ?1)",
                params![format!("-{} days", max_age_days)],
            )
            .map_err(|e| e.to_string())?;
        Ok(count as u64)
    }
}
