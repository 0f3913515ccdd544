use std::collections::BTreeMap;

use crate::config::parse_bool;
use crate::store::Store;

use super::EmailType;

/// Master switch for all outgoing notification email.
pub const GLOBAL_KEY: &str = "email_notifications_enabled";

/// Per-category switches. Types not listed here only honor the master switch.
pub const NOTIFICATION_KEYS: &[(EmailType, &str)] = &[
    (EmailType::QuizInvitation, "email_quiz_invitations_enabled"),
    (EmailType::WagerSettlement, "email_wager_settlement_enabled"),
    (EmailType::WagerJoined, "email_wager_joined_enabled"),
    (EmailType::BalanceUpdate, "email_balance_updates_enabled"),
    (EmailType::Welcome, "email_welcome_enabled"),
    (EmailType::QuizSettlement, "email_quiz_settlement_enabled"),
];

pub fn category_key(email_type: EmailType) -> Option<&'static str> {
    NOTIFICATION_KEYS
        .iter()
        .find(|(ty, _)| *ty == email_type)
        .map(|(_, key)| *key)
}

/// True for the master switch and every category key.
pub fn is_notification_key(key: &str) -> bool {
    key == GLOBAL_KEY || NOTIFICATION_KEYS.iter().any(|(_, k)| *k == key)
}

/// Missing keys count as enabled.
fn flag(store: &dyn Store, key: &str) -> Result<bool, String> {
    Ok(store
        .setting_try_get(key)?
        .map(|v| parse_bool(&v))
        .unwrap_or(true))
}

/// Whether mail of this type may be queued right now. The master switch is
/// read first, then the category switch. A store failure lets the mail through.
pub fn is_enabled(store: &dyn Store, email_type: EmailType) -> bool {
    let check = || -> Result<bool, String> {
        if !flag(store, GLOBAL_KEY)? {
            return Ok(false);
        }
        match category_key(email_type) {
            Some(key) => flag(store, key),
            None => Ok(true),
        }
    };

    match check() {
        Ok(enabled) => enabled,
        Err(e) => {
            log::warn!(
                "[settings] Notification lookup for {} failed, sending anyway: {}",
                email_type,
                e
            );
            true
        }
    }
}

/// Effective value of every notification switch, for the settings API.
/// Read in one query; keys missing from the table report as enabled.
pub fn snapshot(store: &dyn Store) -> BTreeMap<String, bool> {
    let stored = store.setting_get_group("email_");
    std::iter::once(GLOBAL_KEY)
        .chain(NOTIFICATION_KEYS.iter().map(|(_, key)| *key))
        .map(|key| {
            let enabled = stored.get(key).map(|v| parse_bool(v)).unwrap_or(true);
            (key.to_string(), enabled)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_is_declarative() {
        assert_eq!(
            category_key(EmailType::QuizInvitation),
            Some("email_quiz_invitations_enabled")
        );
        assert_eq!(category_key(EmailType::Welcome), Some("email_welcome_enabled"));
        assert_eq!(category_key(EmailType::PasswordReset), None);
        assert_eq!(category_key(EmailType::Verification), None);
        assert_eq!(category_key(EmailType::WagerInvitation), None);
    }

    #[test]
    fn keys_are_unique() {
        let mut keys: Vec<&str> = NOTIFICATION_KEYS.iter().map(|(_, k)| *k).collect();
        keys.push(GLOBAL_KEY);
        let before = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), before);
    }

    #[test]
    fn notification_key_recognition() {
        assert!(is_notification_key(GLOBAL_KEY));
        assert!(is_notification_key("email_balance_updates_enabled"));
        assert!(!is_notification_key("smtp_password"));
    }
}
