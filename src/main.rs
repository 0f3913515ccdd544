#[macro_use]
extern crate rocket;

use std::sync::Arc;

use rocket::{Build, Rocket};

mod config;
mod db;
mod email;
mod format;
mod models;
mod routes;
mod security;
mod store;
mod tasks;


use config::AppConfig;
use email::queue::EmailQueue;
use security::auth::ApiToken;
use store::sqlite::SqliteStore;
use store::Store;

/// Assemble the server around an already-built store and queue.
pub fn build_rocket(config: AppConfig, store: Arc<dyn Store>, queue: Arc<EmailQueue>) -> Rocket<Build> {
    rocket::build()
        .manage(ApiToken(config.api_token.clone()))
        .manage(config)
        .manage(store)
        .manage(queue)
        .attach(tasks::BackgroundTasks)
        .mount("/", routes::public::routes())
        .mount("/api", routes::api::routes())
        .mount("/api", routes::dead_letters::routes())
        .register("/", routes::public::catchers())
}

#[launch]
fn rocket() -> _ {
    env_logger::init();

    let config = AppConfig::from_env();

    let sqlite = SqliteStore::new_at(&config.db_path).expect("Failed to open database");
    sqlite.run_migrations().expect("Failed to run database migrations");
    sqlite.seed_defaults().expect("Failed to seed default settings");
    let store: Arc<dyn Store> = Arc::new(sqlite);

    let transport = email::transport::from_config(&config).expect("Failed to build email transport");

    let mut queue = EmailQueue::new(
        Arc::clone(&store),
        Arc::new(transport),
        config.branding.clone(),
        config.queue.clone(),
    );
    if config.dead_letters_enabled {
        queue = queue.with_failure_hook(email::dead_letter::persist_to(Arc::clone(&store)));
    }

    if config.api_token.is_empty() {
        log::warn!("[boot] WAGERMAIL_API_TOKEN is not set; every /api request will be refused");
    }
    log::info!(
        "[boot] {} mail service: db={}, max_retries={}, retry_delay={}ms",
        config.branding.app_name,
        config.db_path,
        config.queue.max_retries,
        config.queue.retry_delay.as_millis()
    );

    build_rocket(config, store, Arc::new(queue))
}
