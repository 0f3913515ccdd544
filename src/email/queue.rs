//! In-process email queue. Handlers enqueue and return immediately; a single
//! background loop renders and delivers, retrying failures with linear backoff.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::config::{Branding, QueueOptions};
use crate::store::Store;

use super::notifications;
use super::templates::{self, RenderContext};
use super::transport::Transport;
use super::{EmailRequest, EmailType};

/// Called once for every message dropped after its last retry.
pub type FailureHook = Arc<dyn Fn(&QueuedMessage, &str) + Send + Sync>;

/// A unit of work owned by the queue until delivered or dropped.
#[derive(Debug, Clone, Serialize)]
pub struct QueuedMessage {
    pub id: String,
    pub to: String,
    pub email_type: EmailType,
    pub data: Value,
    pub subject: Option<String>,
    pub retry_count: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedMessage {
    fn new(request: EmailRequest) -> Self {
        QueuedMessage {
            id: message_id(),
            to: request.to,
            email_type: request.email_type,
            data: request.data,
            subject: request.subject,
            retry_count: 0,
            enqueued_at: Utc::now(),
        }
    }
}

/// `<unix millis>-<8 hex>`; unique within one process, nothing more.
fn message_id() -> String {
    format!(
        "{}-{}",
        Utc::now().timestamp_millis(),
        hex::encode(rand::random::<[u8; 4]>())
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    /// Messages waiting in the list (first attempts and re-inserted retries).
    pub queue_length: usize,
    /// True only while the loop is iterating. False during backoff windows.
    pub processing: bool,
    /// Messages sleeping out their backoff before re-insertion.
    pub awaiting_retry: usize,
}

pub struct EmailQueue {
    pending: Mutex<VecDeque<QueuedMessage>>,
    processing: AtomicBool,
    awaiting_retry: AtomicUsize,
    loop_starts: AtomicU64,
    store: Arc<dyn Store>,
    transport: Arc<dyn Transport>,
    branding: Branding,
    options: QueueOptions,
    on_failure: Option<FailureHook>,
}

impl EmailQueue {
    pub fn new(
        store: Arc<dyn Store>,
        transport: Arc<dyn Transport>,
        branding: Branding,
        options: QueueOptions,
    ) -> Self {
        EmailQueue {
            pending: Mutex::new(VecDeque::new()),
            processing: AtomicBool::new(false),
            awaiting_retry: AtomicUsize::new(0),
            loop_starts: AtomicU64::new(0),
            store,
            transport,
            branding,
            options,
            on_failure: None,
        }
    }

    pub fn with_failure_hook(mut self, hook: FailureHook) -> Self {
        self.on_failure = Some(hook);
        self
    }

    fn pending(&self) -> MutexGuard<'_, VecDeque<QueuedMessage>> {
        // The lock is only held for push/pop, so a poisoned guard is still consistent
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a message unless its notification category is switched off.
    /// Returns whether it was queued. Delivery errors never surface here.
    pub fn enqueue(self: &Arc<Self>, request: EmailRequest) -> bool {
        if !notifications::is_enabled(&*self.store, request.email_type) {
            log::info!(
                "[queue] {} emails are disabled, not sending to {}",
                request.email_type,
                request.to
            );
            return false;
        }
        self.requeue(request);
        true
    }

    /// Queue without consulting notification settings. Returns the new message id.
    pub fn requeue(self: &Arc<Self>, request: EmailRequest) -> String {
        let message = QueuedMessage::new(request);
        let id = message.id.clone();
        log::debug!(
            "[queue] Queued {} email {} to {}",
            message.email_type,
            id,
            message.to
        );
        self.pending().push_back(message);
        self.kick();
        id
    }

    /// Start the processing loop if none is running. Returns true if this
    /// call started it. Must be called from within a tokio runtime.
    pub fn kick(self: &Arc<Self>) -> bool {
        if self
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.loop_starts.fetch_add(1, Ordering::Relaxed);
        let queue = Arc::clone(self);
        tokio::spawn(async move { queue.run().await });
        true
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            queue_length: self.pending().len(),
            processing: self.processing.load(Ordering::Acquire),
            awaiting_retry: self.awaiting_retry.load(Ordering::Acquire),
        }
    }

    /// How many times a processing loop has been started.
    pub fn loop_starts(&self) -> u64 {
        self.loop_starts.load(Ordering::Relaxed)
    }

    async fn run(self: Arc<Self>) {
        let mut guard = LoopGuard {
            queue: Arc::clone(&self),
            armed: true,
        };
        loop {
            let next = self.pending().pop_front();
            match next {
                Some(message) => {
                    self.process(message).await;
                    tokio::time::sleep(self.options.pacing).await;
                }
                None => {
                    self.processing.store(false, Ordering::Release);
                    // A push may have landed between the pop and the store; if
                    // nobody else claimed the flag, keep going instead of stranding it.
                    let stranded = !self.pending().is_empty();
                    if !stranded
                        || self
                            .processing
                            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                            .is_err()
                    {
                        break;
                    }
                }
            }
        }
        guard.armed = false;
    }

    async fn process(self: &Arc<Self>, message: QueuedMessage) {
        let ctx = RenderContext {
            branding: &self.branding,
            now: Utc::now(),
        };
        let email = templates::render(
            message.email_type,
            &message.to,
            &message.data,
            message.subject.as_deref(),
            &ctx,
        );

        let result =
            match tokio::time::timeout(self.options.send_timeout, self.transport.send(&email)).await {
                Ok(result) => result,
                Err(_) => Err(format!(
                    "Send timed out after {}s",
                    self.options.send_timeout.as_secs()
                )),
            };

        match result {
            Ok(()) => log::info!(
                "[queue] Sent {} email {} to {}",
                message.email_type,
                message.id,
                message.to
            ),
            Err(e) => self.handle_failure(message, &e),
        }
    }

    fn handle_failure(self: &Arc<Self>, mut message: QueuedMessage, error: &str) {
        if message.retry_count >= self.options.max_retries {
            log::error!(
                "[queue] Dropping email {} to {} after {} attempts: {}",
                message.id,
                message.to,
                message.retry_count + 1,
                error
            );
            if let Some(hook) = &self.on_failure {
                hook(&message, error);
            }
            return;
        }

        message.retry_count += 1;
        let delay = self.options.retry_delay * message.retry_count;
        log::warn!(
            "[queue] Email {} to {} failed (retry {}/{} in {}ms): {}",
            message.id,
            message.to,
            message.retry_count,
            self.options.max_retries,
            delay.as_millis(),
            error
        );

        // The loop does not wait for the backoff; a separate task re-inserts
        // the message at the tail and restarts the loop if it went idle.
        self.awaiting_retry.fetch_add(1, Ordering::AcqRel);
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.pending().push_back(message);
            queue.awaiting_retry.fetch_sub(1, Ordering::AcqRel);
            queue.kick();
        });
    }
}

/// Releases the processing flag if the loop future is dropped before it
/// finishes, e.g. after a panic in a transport or failure hook.
struct LoopGuard {
    queue: Arc<EmailQueue>,
    armed: bool,
}

impl Drop for LoopGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        log::error!("[queue] Processing loop stopped unexpectedly, releasing it");
        self.queue.processing.store(false, Ordering::Release);
        if !self.queue.pending().is_empty() && tokio::runtime::Handle::try_current().is_ok() {
            self.queue.kick();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_ids_have_timestamp_and_suffix() {
        let id = message_id();
        let (millis, suffix) = id.split_once('-').unwrap();
        assert!(millis.parse::<i64>().unwrap() > 0);
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(message_id(), message_id());
    }

    #[test]
    fn status_serializes_camel_case() {
        let status = QueueStatus {
            queue_length: 2,
            processing: true,
            awaiting_retry: 1,
        };
        assert_eq!(
            serde_json::to_value(status).unwrap(),
            serde_json::json!({ "queueLength": 2, "processing": true, "awaitingRetry": 1 })
        );
    }
}
