use std::collections::HashMap;

use crate::db::DbPool;
use crate::models::dead_letter::{DeadLetter, NewDeadLetter};
use crate::models::settings::Setting;

use super::Store;

/// SQLite-backed implementation of the Store trait.
/// Wraps the r2d2 connection pool and delegates to model methods.
pub struct SqliteStore {
    pub pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn new_at(path: &str) -> Result<Self, String> {
        let pool = crate::db::init_pool_at(path)?;
        Ok(Self { pool })
    }
}

impl Store for SqliteStore {
    // ── Lifecycle ───────────────────────────────────────────────────

    fn run_migrations(&self) -> Result<(), String> {
        crate::db::run_migrations(&self.pool).map_err(|e| e.to_string())
    }

    fn seed_defaults(&self) -> Result<(), String> {
        crate::db::seed_defaults(&self.pool).map_err(|e| e.to_string())
    }

    // ── Settings ────────────────────────────────────────────────────

    fn setting_try_get(&self, key: &str) -> Result<Option<String>, String> {
        Setting::try_get(&self.pool, key)
    }

    fn setting_set_many(&self, settings: &HashMap<String, String>) -> Result<(), String> {
        Setting::set_many(&self.pool, settings)
    }

    fn setting_get_group(&self, prefix: &str) -> HashMap<String, String> {
        Setting::get_group(&self.pool, prefix)
    }

    // ── Dead letters ────────────────────────────────────────────────

    fn dead_letter_create(&self, entry: &NewDeadLetter) -> Result<i64, String> {
        DeadLetter::create(&self.pool, entry)
    }

    fn dead_letter_get(&self, id: i64) -> Option<DeadLetter> {
        DeadLetter::get_by_id(&self.pool, id)
    }

    fn dead_letter_list(&self, limit: i64, offset: i64) -> Vec<DeadLetter> {
        DeadLetter::list(&self.pool, limit, offset)
    }

    fn dead_letter_count(&self) -> i64 {
        DeadLetter::count(&self.pool)
    }

    fn dead_letter_delete(&self, id: i64) -> Result<bool, String> {
        DeadLetter::delete(&self.pool, id)
    }

    fn dead_letter_cleanup(&self, max_age_days: u64) -> Result<u64, String> {
        DeadLetter::cleanup(&self.pool, max_age_days)
    }
}
