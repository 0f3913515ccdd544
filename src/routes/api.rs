use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use serde_json::{json, Value};

use crate::email::notifications;
use crate::email::queue::{EmailQueue, QueueStatus};
use crate::email::EmailRequest;
use crate::security::auth::ServiceCaller;
use crate::store::Store;

// ── Emails ─────────────────────────────────────────────

/// Fire-and-forget: 202 for any parsed payload with a plausible recipient, whatever
/// happens to delivery. A recipient without `@` is rejected with 422.
#[post("/emails", format = "json", data = "<request>")]
pub fn email_enqueue(
    _caller: ServiceCaller,
    queue: &State<Arc<EmailQueue>>,
    request: Json<EmailRequest>,
) -> (Status, Json<Value>) {
    let request = request.into_inner();
    if request.to.trim().is_empty() || !request.to.contains('@') {
        return (
            Status::UnprocessableEntity,
            Json(json!({ "ok": false, "error": "Recipient address is invalid" })),
        );
    }
    let queued = queue.enqueue(request);
    (Status::Accepted, Json(json!({ "ok": true, "queued": queued })))
}

#[get("/emails/status")]
pub fn email_status(_caller: ServiceCaller, queue: &State<Arc<EmailQueue>>) -> Json<QueueStatus> {
    Json(queue.status())
}

// ── Notification settings ──────────────────────────────

#[get("/settings/notifications")]
pub fn notifications_get(
    _caller: ServiceCaller,
    store: &State<Arc<dyn Store>>,
) -> Json<BTreeMap<String, bool>> {
    Json(notifications::snapshot(&**store.inner()))
}

#[put("/settings/notifications", format = "json", data = "<changes>")]
pub fn notifications_update(
    _caller: ServiceCaller,
    store: &State<Arc<dyn Store>>,
    changes: Json<HashMap<String, bool>>,
) -> (Status, Json<Value>) {
    let changes = changes.into_inner();
    let unknown: Vec<&String> = changes
        .keys()
        .filter(|k| !notifications::is_notification_key(k))
        .collect();
    if !unknown.is_empty() {
        return (
            Status::BadRequest,
            Json(json!({ "ok": false, "error": "Unknown setting keys", "keys": unknown })),
        );
    }

    let values: HashMap<String, String> = changes
        .iter()
        .map(|(k, v)| (k.clone(), v.to_string()))
        .collect();
    let s: &dyn Store = &**store.inner();
    match s.setting_set_many(&values) {
        Ok(()) => {
            log::info!("[settings] Updated {} notification setting(s)", values.len());
            (
                Status::Ok,
                Json(json!({ "ok": true, "settings": notifications::snapshot(s) })),
            )
        }
        Err(e) => {
            log::error!("[settings] Failed to update notification settings: {}", e);
            (
                Status::InternalServerError,
                Json(json!({ "ok": false, "error": e })),
            )
        }
    }
}

pub fn routes() -> Vec<rocket::Route> {
    routes![email_enqueue, email_status, notifications_get, notifications_update]
}
