use std::time::Duration;

use chrono_tz::Tz;

/// Runtime configuration, read once at startup from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: String,
    /// Bearer token required on `/api/*`. Empty means every API call is refused.
    pub api_token: String,
    pub branding: Branding,
    pub smtp: SmtpConfig,
    pub resend_api_key: String,
    /// Transport names in failover order, e.g. `["smtp", "resend"]`.
    pub transport_chain: Vec<String>,
    pub queue: QueueOptions,
    pub dead_letters_enabled: bool,
    pub dead_letter_max_age_days: u64,
}

/// What templates need to know about the product sending the mail.
#[derive(Debug, Clone)]
pub struct Branding {
    pub app_name: String,
    pub app_url: String,
    pub support_email: String,
    pub currency: String,
    pub timezone: Tz,
}

impl Default for Branding {
    fn default() -> Self {
        Branding {
            app_name: "Wagerly".to_string(),
            app_url: "http://localhost:3000".to_string(),
            support_email: String::new(),
            currency: "USD".to_string(),
            timezone: Tz::UTC,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// `None` picks implicit TLS for port 465 and STARTTLS otherwise.
    pub secure: Option<bool>,
    pub reject_unauthorized: bool,
    pub from_address: String,
    pub from_name: String,
}

impl SmtpConfig {
    /// Host, user and a sender are the minimum needed to attempt delivery.
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty() && !self.username.is_empty() && !self.from_address.is_empty()
    }
}

/// Tuning knobs for the email queue.
#[derive(Debug, Clone)]
pub struct QueueOptions {
    /// Retries after the first attempt. 3 means four attempts in total.
    pub max_retries: u32,
    /// Base backoff; retry `n` waits `retry_delay * n`.
    pub retry_delay: Duration,
    /// Pause between two processed messages.
    pub pacing: Duration,
    /// Upper bound on a single transport call.
    pub send_timeout: Duration,
}

impl Default for QueueOptions {
    fn default() -> Self {
        QueueOptions {
            max_retries: 3,
            retry_delay: Duration::from_millis(5000),
            pacing: Duration::from_millis(50),
            send_timeout: Duration::from_secs(10),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. Unparseable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());
        let get_u64 = |key: &str, default: u64| {
            get(key)
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(default)
        };
        let get_u32 = |key: &str, default: u32| {
            get(key)
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(default)
        };
        let get_bool = |key: &str| get(key).map(|v| parse_bool(&v));

        let defaults = Branding::default();
        let timezone = match get("APP_TIMEZONE") {
            Some(name) => name.parse::<Tz>().unwrap_or_else(|_| {
                log::warn!("[config] Unknown APP_TIMEZONE '{}', using UTC", name);
                Tz::UTC
            }),
            None => defaults.timezone,
        };
        let branding = Branding {
            app_name: get_or("APP_NAME", &defaults.app_name),
            app_url: get_or("APP_URL", &defaults.app_url)
                .trim_end_matches('/')
                .to_string(),
            support_email: get_or("SUPPORT_EMAIL", ""),
            currency: get_or("APP_CURRENCY", &defaults.currency).to_uppercase(),
            timezone,
        };

        let username = get_or("SMTP_USER", "");
        let smtp = SmtpConfig {
            host: get_or("SMTP_HOST", ""),
            port: get("SMTP_PORT")
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(587),
            password: get_or("SMTP_PASS", ""),
            secure: get_bool("SMTP_SECURE"),
            reject_unauthorized: get_bool("SMTP_TLS_REJECT_UNAUTHORIZED").unwrap_or(true),
            from_address: get("SMTP_FROM").unwrap_or_else(|| username.clone()),
            from_name: get("EMAIL_FROM_NAME").unwrap_or_else(|| branding.app_name.clone()),
            username,
        };

        let transport_chain = get_or("EMAIL_TRANSPORT_CHAIN", "smtp,resend")
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        let queue_defaults = QueueOptions::default();
        let queue = QueueOptions {
            max_retries: get_u32("EMAIL_MAX_RETRIES", queue_defaults.max_retries),
            retry_delay: Duration::from_millis(get_u64(
                "EMAIL_RETRY_DELAY_MS",
                queue_defaults.retry_delay.as_millis() as u64,
            )),
            pacing: Duration::from_millis(get_u64(
                "EMAIL_PACING_MS",
                queue_defaults.pacing.as_millis() as u64,
            )),
            send_timeout: Duration::from_secs(
                get_u64("EMAIL_SEND_TIMEOUT_SECS", queue_defaults.send_timeout.as_secs()).max(1),
            ),
        };

        AppConfig {
            db_path: get_or("WAGERMAIL_DB_PATH", "data/wagermail.db"),
            api_token: get_or("WAGERMAIL_API_TOKEN", ""),
            branding,
            smtp,
            resend_api_key: get_or("RESEND_API_KEY", ""),
            transport_chain,
            queue,
            dead_letters_enabled: get_bool("EMAIL_DEAD_LETTERS").unwrap_or(true),
            dead_letter_max_age_days: get_u64("EMAIL_DEAD_LETTER_MAX_AGE_DAYS", 30).max(1),
        }
    }
}

/// Loose boolean parsing shared by env vars and stored settings.
pub fn parse_bool(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "false" | "0" | "off" | "no"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let cfg = config_from(&[]);
        assert_eq!(cfg.db_path, "data/wagermail.db");
        assert_eq!(cfg.queue.max_retries, 3);
        assert_eq!(cfg.queue.retry_delay, Duration::from_millis(5000));
        assert_eq!(cfg.queue.pacing, Duration::from_millis(50));
        assert_eq!(cfg.queue.send_timeout, Duration::from_secs(10));
        assert_eq!(cfg.smtp.port, 587);
        assert!(cfg.smtp.reject_unauthorized);
        assert!(!cfg.smtp.is_configured());
        assert_eq!(cfg.transport_chain, vec!["smtp", "resend"]);
        assert_eq!(cfg.branding.timezone, Tz::UTC);
        assert!(cfg.dead_letters_enabled);
    }

    #[test]
    fn smtp_from_falls_back_to_user() {
        let cfg = config_from(&[
            ("SMTP_HOST", "mail.example.com"),
            ("SMTP_USER", "bot@example.com"),
            ("SMTP_TLS_REJECT_UNAUTHORIZED", "false"),
            ("SMTP_PORT", "465"),
        ]);
        assert_eq!(cfg.smtp.from_address, "bot@example.com");
        assert_eq!(cfg.smtp.port, 465);
        assert!(!cfg.smtp.reject_unauthorized);
        assert!(cfg.smtp.is_configured());
    }

    #[test]
    fn bad_values_fall_back() {
        let cfg = config_from(&[
            ("SMTP_PORT", "not-a-port"),
            ("EMAIL_MAX_RETRIES", "x"),
            ("APP_TIMEZONE", "Mars/Olympus"),
            ("APP_URL", "https://wagerly.example/"),
            ("APP_CURRENCY", "eur"),
        ]);
        assert_eq!(cfg.smtp.port, 587);
        assert_eq!(cfg.queue.max_retries, 3);
        assert_eq!(cfg.branding.timezone, Tz::UTC);
        assert_eq!(cfg.branding.app_url, "https://wagerly.example");
        assert_eq!(cfg.branding.currency, "EUR");
    }

    #[test]
    fn retry_count_out_of_range_falls_back() {
        let cfg = config_from(&[("EMAIL_MAX_RETRIES", "4294967296")]);
        assert_eq!(cfg.queue.max_retries, 3);

        let cfg = config_from(&[("EMAIL_MAX_RETRIES", "0")]);
        assert_eq!(cfg.queue.max_retries, 0);
    }

    #[test]
    fn parse_bool_is_permissive() {
        assert!(parse_bool("true"));
        assert!(parse_bool("1"));
        assert!(parse_bool("yes please"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(" OFF "));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("no"));
    }
}
