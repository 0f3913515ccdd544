use std::sync::Arc;

use rocket::serde::json::Json;
use rocket::{Request, State};
use serde_json::{json, Value};

use crate::email::queue::EmailQueue;
use crate::store::Store;

/// Liveness plus queue diagnostics. No auth: exposes counts only.
#[get("/health")]
pub fn health(queue: &State<Arc<EmailQueue>>, store: &State<Arc<dyn Store>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "queue": queue.status(),
        "loopStarts": queue.loop_starts(),
        "deadLetters": store.dead_letter_count(),
    }))
}

#[catch(400)]
pub fn bad_request() -> Json<Value> {
    Json(json!({ "ok": false, "error": "Bad request" }))
}

#[catch(401)]
pub fn unauthorized() -> Json<Value> {
    Json(json!({ "ok": false, "error": "Missing or invalid service token" }))
}

#[catch(404)]
pub fn not_found(req: &Request) -> Json<Value> {
    Json(json!({ "ok": false, "error": format!("No route for {}", req.uri().path()) }))
}

#[catch(422)]
pub fn unprocessable() -> Json<Value> {
    Json(json!({ "ok": false, "error": "Request body could not be parsed" }))
}

#[catch(500)]
pub fn server_error() -> Json<Value> {
    Json(json!({ "ok": false, "error": "Internal server error" }))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![health]
}

pub fn catchers() -> Vec<rocket::Catcher> {
    catchers![bad_request, unauthorized, not_found, unprocessable, server_error]
}
