use std::sync::Arc;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use serde_json::{json, Value};

use crate::email::dead_letter;
use crate::email::queue::EmailQueue;
use crate::security::auth::ServiceCaller;
use crate::store::Store;

#[get("/dead-letters?<limit>&<offset>")]
pub fn dead_letter_list(
    _caller: ServiceCaller,
    store: &State<Arc<dyn Store>>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> Json<Value> {
    let limit = limit.unwrap_or(50).clamp(1, 500);
    let offset = offset.unwrap_or(0).max(0);
    Json(json!({
        "total": store.dead_letter_count(),
        "items": store.dead_letter_list(limit, offset),
    }))
}

/// Send a dropped message again. The row is claimed by deleting it before the
/// message goes back in the queue, so concurrent requeues send it once.
#[post("/dead-letters/<id>/requeue")]
pub fn dead_letter_requeue(
    _caller: ServiceCaller,
    store: &State<Arc<dyn Store>>,
    queue: &State<Arc<EmailQueue>>,
    id: i64,
) -> (Status, Json<Value>) {
    let not_found = || {
        (
            Status::NotFound,
            Json(json!({ "ok": false, "error": "Dead letter not found" })),
        )
    };

    let letter = match store.dead_letter_get(id) {
        Some(l) => l,
        None => return not_found(),
    };

    let request = match dead_letter::to_request(&letter) {
        Ok(r) => r,
        Err(e) => return (Status::UnprocessableEntity, Json(json!({ "ok": false, "error": e }))),
    };

    match store.dead_letter_delete(id) {
        Ok(true) => {}
        // Another request claimed it between the read and the delete
        Ok(false) => return not_found(),
        Err(e) => {
            log::error!("[queue] Could not claim dead letter #{}: {}", id, e);
            return (
                Status::InternalServerError,
                Json(json!({ "ok": false, "error": e })),
            );
        }
    }

    let message_id = queue.requeue(request);
    log::info!("[queue] Dead letter #{} requeued as {}", id, message_id);
    (
        Status::Accepted,
        Json(json!({ "ok": true, "messageId": message_id })),
    )
}

#[delete("/dead-letters/<id>")]
pub fn dead_letter_delete(
    _caller: ServiceCaller,
    store: &State<Arc<dyn Store>>,
    id: i64,
) -> (Status, Json<Value>) {
    match store.dead_letter_delete(id) {
        Ok(true) => (Status::Ok, Json(json!({ "ok": true }))),
        Ok(false) => (
            Status::NotFound,
            Json(json!({ "ok": false, "error": "Dead letter not found" })),
        ),
        Err(e) => (
            Status::InternalServerError,
            Json(json!({ "ok": false, "error": e })),
        ),
    }
}

pub fn routes() -> Vec<rocket::Route> {
    routes![dead_letter_list, dead_letter_requeue, dead_letter_delete]
}
