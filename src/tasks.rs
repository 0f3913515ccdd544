use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Orbit, Rocket};
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::email::queue::EmailQueue;
use crate::store::Store;

pub struct BackgroundTasks;

#[rocket::async_trait]
impl Fairing for BackgroundTasks {
    fn info(&self) -> Info {
        Info {
            name: "Background Tasks",
            kind: Kind::Liftoff | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let (store, config) = match (
            rocket.state::<Arc<dyn Store>>(),
            rocket.state::<AppConfig>(),
        ) {
            (Some(s), Some(c)) => (Arc::clone(s), c.clone()),
            _ => {
                log::error!("[task] Store or config missing from managed state, tasks not started");
                return;
            }
        };

        // Dead letter cleanup task
        if config.dead_letters_enabled {
            let s = Arc::clone(&store);
            let max_age = config.dead_letter_max_age_days;
            tokio::spawn(async move {
                loop {
                    let interval = get_interval(&*s, "task_dead_letter_cleanup_interval", 360);
                    tokio::time::sleep(Duration::from_secs(interval * 60)).await;
                    match s.dead_letter_cleanup(max_age) {
                        Ok(count) => {
                            if count > 0 {
                                log::info!("[task] Cleaned up {} old dead letters", count);
                            }
                        }
                        Err(e) => log::error!("[task] Dead letter cleanup failed: {}", e),
                    }
                }
            });
        }

        log::info!("[task] Background tasks started");
    }

    async fn on_shutdown(&self, rocket: &Rocket<Orbit>) {
        let Some(queue) = rocket.state::<Arc<EmailQueue>>() else {
            return;
        };
        let status = queue.status();
        let lost = status.queue_length + status.awaiting_retry;
        if lost > 0 {
            log::warn!(
                "[task] Shutting down with {} undelivered email(s) in memory; they will not be sent",
                lost
            );
        }
    }
}

/// Interval in minutes from settings, at least 1.
fn get_interval(store: &dyn Store, key: &str, default: u64) -> u64 {
    store
        .setting_get_or(key, &default.to_string())
        .parse::<u64>()
        .unwrap_or(default)
        .max(1)
}
