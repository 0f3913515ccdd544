use std::sync::Arc;

use crate::models::dead_letter::{DeadLetter, NewDeadLetter};
use crate::store::Store;

use super::queue::{FailureHook, QueuedMessage};
use super::{EmailRequest, EmailType};

/// Failure hook that records dropped messages in the store.
pub fn persist_to(store: Arc<dyn Store>) -> FailureHook {
    Arc::new(move |message: &QueuedMessage, error: &str| {
        let data_json = message.data.to_string();
        let entry = NewDeadLetter {
            message_id: &message.id,
            to_addr: &message.to,
            email_type: message.email_type.as_str(),
            subject: message.subject.as_deref(),
            data_json: &data_json,
            attempts: message.retry_count as i64 + 1,
            last_error: error,
        };
        match store.dead_letter_create(&entry) {
            Ok(id) => log::info!(
                "[queue] Email {} saved as dead letter #{}",
                message.id,
                id
            ),
            Err(e) => log::error!(
                "[queue] Could not save dead letter for email {}: {}",
                message.id,
                e
            ),
        }
    })
}

/// Rebuild the original request so an operator can send it again.
pub fn to_request(letter: &DeadLetter) -> Result<EmailRequest, String> {
    let email_type = EmailType::parse(&letter.email_type)
        .ok_or_else(|| format!("Unknown email type '{}'", letter.email_type))?;
    let data = serde_json::from_str(&letter.data_json)
        .map_err(|e| format!("Corrupt data for dead letter {}: {}", letter.id, e))?;
    Ok(EmailRequest {
        to: letter.to_addr.clone(),
        email_type,
        data,
        subject: letter.subject.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter(email_type: &str, data_json: &str) -> DeadLetter {
        DeadLetter {
            id: 7,
            message_id: "1-abcd0123".to_string(),
            to_addr: "ada@example.com".to_string(),
            email_type: email_type.to_string(),
            subject: Some("Your results".to_string()),
            data_json: data_json.to_string(),
            attempts: 4,
            last_error: "timeout".to_string(),
            failed_at: "2026-10-19 12:00:00".to_string(),
        }
    }

    #[test]
    fn rebuilds_request() {
        let req = to_request(&letter("quiz-settlement", r#"{"quizTitle":"Capitals"}"#)).unwrap();
        assert_eq!(req.email_type, EmailType::QuizSettlement);
        assert_eq!(req.to, "ada@example.com");
        assert_eq!(req.data["quizTitle"], "Capitals");
        assert_eq!(req.subject.as_deref(), Some("Your results"));
    }

    #[test]
    fn rejects_unknown_type_and_bad_json() {
        assert!(to_request(&letter("newsletter", "{}")).is_err());
        let err = to_request(&letter("welcome", "{not json")).unwrap_err();
        assert!(err.starts_with("Corrupt data for dead letter 7"), "{}", err);
    }
}
