use std::collections::HashMap;

use crate::models::dead_letter::{DeadLetter, NewDeadLetter};

pub mod sqlite;

/// Unified data-access trait. The queue, routes and tasks only ever see this.
/// Implementation: `SqliteStore` (wraps rusqlite/r2d2).
pub trait Store: Send + Sync {
    // ── Lifecycle ───────────────────────────────────────────────────
    fn run_migrations(&self) -> Result<(), String>;
    fn seed_defaults(&self) -> Result<(), String>;

    // ── Settings ────────────────────────────────────────────────────
    /// Errors are reported so callers can decide how to fail.
    fn setting_try_get(&self, key: &str) -> Result<Option<String>, String>;
    fn setting_get(&self, key: &str) -> Option<String> {
        self.setting_try_get(key).ok().flatten()
    }
    fn setting_get_or(&self, key: &str, default: &str) -> String {
        self.setting_get(key).unwrap_or_else(|| default.to_string())
    }
    fn setting_set_many(&self, settings: &HashMap<String, String>) -> Result<(), String>;
    fn setting_get_group(&self, prefix: &str) -> HashMap<String, String>;

    // ── Dead letters ────────────────────────────────────────────────
    fn dead_letter_create(&self, entry: &NewDeadLetter) -> Result<i64, String>;
    fn dead_letter_get(&self, id: i64) -> Option<DeadLetter>;
    fn dead_letter_list(&self, limit: i64, offset: i64) -> Vec<DeadLetter>;
    fn dead_letter_count(&self) -> i64;
    fn dead_letter_delete(&self, id: i64) -> Result<bool, String>;
    fn dead_letter_cleanup(&self, max_age_days: u64) -> Result<u64, String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::notifications::GLOBAL_KEY;
    use crate::store::sqlite::SqliteStore;

    /// Create a fresh in-memory SqliteStore with migrations + seed applied.
    fn test_store() -> SqliteStore {
        let manager = r2d2_sqlite::SqliteConnectionManager::memory();
        let pool = r2d2::Pool::builder()
            .max_size(1)
            .build(manager)
            .expect("Failed to create in-memory pool");
        let store = SqliteStore::new(pool);
        store.run_migrations().expect("migrations failed");
        store.seed_defaults().expect("seed failed");
        store
    }

    fn entry<'a>(message_id: &'a str, to: &'a str) -> NewDeadLetter<'a> {
        NewDeadLetter {
            message_id,
            to_addr: to,
            email_type: "welcome",
            subject: None,
            data_json: r#"{"name":"Ada"}"#,
            attempts: 4,
            last_error: "SMTP send error: connection refused",
        }
    }

    fn set(s: &SqliteStore, key: &str, value: &str) {
        let map = HashMap::from([(key.to_string(), value.to_string())]);
        s.setting_set_many(&map).unwrap();
    }

    // ── Settings ────────────────────────────────────────────────────

    #[test]
    fn test_setting_get_set() {
        let s = test_store();
        assert!(s.setting_get("nonexistent_key_xyz").is_none());
        set(&s, "test_key", "hello");
        assert_eq!(s.setting_get("test_key"), Some("hello".to_string()));
        set(&s, "test_key", "again");
        assert_eq!(s.setting_try_get("test_key"), Ok(Some("again".to_string())));
    }

    #[test]
    fn test_setting_get_or() {
        let s = test_store();
        assert_eq!(s.setting_get_or("missing", "fallback"), "fallback");
        set(&s, "present", "val");
        assert_eq!(s.setting_get_or("present", "fallback"), "val");
    }

    #[test]
    fn test_seed_enables_notifications() {
        let s = test_store();
        assert_eq!(s.setting_get(GLOBAL_KEY), Some("true".to_string()));
        let group = s.setting_get_group("email_");
        assert!(group.len() >= 7);
        assert!(group.values().all(|v| v == "true"));
    }

    #[test]
    fn test_seed_keeps_existing_values() {
        let s = test_store();
        set(&s, GLOBAL_KEY, "false");
        s.seed_defaults().unwrap();
        assert_eq!(s.setting_get(GLOBAL_KEY), Some("false".to_string()));
    }

    #[test]
    fn test_setting_set_many() {
        let s = test_store();
        let mut map = HashMap::new();
        map.insert("k1".to_string(), "v1".to_string());
        map.insert("k2".to_string(), "v2".to_string());
        s.setting_set_many(&map).unwrap();
        assert_eq!(s.setting_get("k1"), Some("v1".to_string()));
        assert_eq!(s.setting_get("k2"), Some("v2".to_string()));
    }

    // ── Dead letters ────────────────────────────────────────────────

    #[test]
    fn test_dead_letter_crud() {
        let s = test_store();
        assert_eq!(s.dead_letter_count(), 0);

        let first = s.dead_letter_create(&entry("1-aa", "a@example.com")).unwrap();
        let second = s.dead_letter_create(&entry("2-bb", "b@example.com")).unwrap();
        assert_eq!(s.dead_letter_count(), 2);

        let listed = s.dead_letter_list(10, 0);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second);
        assert_eq!(listed[1].message_id, "1-aa");

        let got = s.dead_letter_get(first).unwrap();
        assert_eq!(got.to_addr, "a@example.com");
        assert_eq!(got.attempts, 4);
        assert!(got.subject.is_none());
        assert!(!got.failed_at.is_empty());

        assert!(s.dead_letter_delete(first).unwrap());
        assert!(!s.dead_letter_delete(first).unwrap());
        assert!(s.dead_letter_get(first).is_none());
        assert_eq!(s.dead_letter_count(), 1);
    }

    #[test]
    fn test_dead_letter_cleanup_keeps_recent() {
        let s = test_store();
        s.dead_letter_create(&entry("1-aa", "a@example.com")).unwrap();
        assert_eq!(s.dead_letter_cleanup(30).unwrap(), 0);
        assert_eq!(s.dead_letter_count(), 1);
    }
}
