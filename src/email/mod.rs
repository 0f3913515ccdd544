pub mod dead_letter;
pub mod notifications;
pub mod queue;
pub mod resend;
pub mod smtp;
pub mod templates;
pub mod transport;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every kind of transactional email the app sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmailType {
    Verification,
    Welcome,
    PasswordReset,
    WagerInvitation,
    WagerJoined,
    WagerSettlement,
    QuizInvitation,
    QuizSettlement,
    BalanceUpdate,
}

impl EmailType {
    pub const ALL: [EmailType; 9] = [
        EmailType::Verification,
        EmailType::Welcome,
        EmailType::PasswordReset,
        EmailType::WagerInvitation,
        EmailType::WagerJoined,
        EmailType::WagerSettlement,
        EmailType::QuizInvitation,
        EmailType::QuizSettlement,
        EmailType::BalanceUpdate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmailType::Verification => "verification",
            EmailType::Welcome => "welcome",
            EmailType::PasswordReset => "password-reset",
            EmailType::WagerInvitation => "wager-invitation",
            EmailType::WagerJoined => "wager-joined",
            EmailType::WagerSettlement => "wager-settlement",
            EmailType::QuizInvitation => "quiz-invitation",
            EmailType::QuizSettlement => "quiz-settlement",
            EmailType::BalanceUpdate => "balance-update",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }
}

impl std::fmt::Display for EmailType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a caller hands to the queue: `{ to, type, data, subject? }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailRequest {
    pub to: String,
    #[serde(rename = "type")]
    pub email_type: EmailType,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

/// A message ready for a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn email_type_wire_names() {
        for ty in EmailType::ALL {
            let wire = serde_json::to_value(ty).unwrap();
            assert_eq!(wire, json!(ty.as_str()));
            assert_eq!(EmailType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(EmailType::parse("newsletter"), None);
    }

    #[test]
    fn request_deserializes_from_handler_payload() {
        let req: EmailRequest = serde_json::from_value(json!({
            "to": "ada@example.com",
            "type": "wager-invitation",
            "data": { "wagerTitle": "Derby" }
        }))
        .unwrap();
        assert_eq!(req.email_type, EmailType::WagerInvitation);
        assert_eq!(req.data["wagerTitle"], "Derby");
        assert!(req.subject.is_none());

        let bare: EmailRequest =
            serde_json::from_value(json!({ "to": "x@example.com", "type": "welcome" })).unwrap();
        assert!(bare.data.is_null());
    }

    #[test]
    fn request_rejects_unknown_type() {
        let res: Result<EmailRequest, _> =
            serde_json::from_value(json!({ "to": "x@example.com", "type": "spam" }));
        assert!(res.is_err());
    }
}
