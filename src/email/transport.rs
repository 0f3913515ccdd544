use std::sync::Arc;

use crate::config::AppConfig;

use super::resend::ResendTransport;
use super::smtp::SmtpTransport;
use super::RenderedEmail;

/// An outbound delivery channel. `Err` covers both "could not send" and
/// "not configured"; the queue retries either the same way.
#[rocket::async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, email: &RenderedEmail) -> Result<(), String>;
}

/// Tries each transport in order until one accepts the message.
pub struct FailoverTransport {
    chain: Vec<Arc<dyn Transport>>,
}

impl FailoverTransport {
    pub fn new(chain: Vec<Arc<dyn Transport>>) -> Self {
        FailoverTransport { chain }
    }

    pub fn names(&self) -> Vec<&str> {
        self.chain.iter().map(|t| t.name()).collect()
    }
}

#[rocket::async_trait]
impl Transport for FailoverTransport {
    fn name(&self) -> &str {
        "failover"
    }

    async fn send(&self, email: &RenderedEmail) -> Result<(), String> {
        let mut last_error = String::new();

        for transport in &self.chain {
            match transport.send(email).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    log::warn!("[email] Transport {} failed: {}", transport.name(), e);
                    last_error = e;
                }
            }
        }

        if last_error.is_empty() {
            Err("No email transport configured".into())
        } else {
            Err(format!("All email transports failed. Last error: {}", last_error))
        }
    }
}

/// Build the transport chain named by `EMAIL_TRANSPORT_CHAIN`. Transports
/// without credentials are left out. When nothing is configured the chain
/// holds the bare SMTP transport, which fails every send with a warning.
pub fn from_config(config: &AppConfig) -> Result<FailoverTransport, String> {
    let mut chain: Vec<Arc<dyn Transport>> = Vec::new();

    for name in &config.transport_chain {
        match name.as_str() {
            "smtp" => {
                if config.smtp.is_configured() {
                    chain.push(Arc::new(SmtpTransport::new(
                        config.smtp.clone(),
                        config.queue.send_timeout,
                    )));
                }
            }
            "resend" => {
                if !config.resend_api_key.is_empty() {
                    chain.push(Arc::new(ResendTransport::new(
                        &config.resend_api_key,
                        &config.smtp.from_address,
                        &config.smtp.from_name,
                        config.queue.send_timeout,
                    )?));
                }
            }
            other => log::warn!("[email] Unknown transport '{}' in chain, ignoring", other),
        }
    }

    if chain.is_empty() {
        log::warn!("[email] No email transport configured; every send will fail and be retried");
        chain.push(Arc::new(SmtpTransport::new(
            config.smtp.clone(),
            config.queue.send_timeout,
        )));
    }

    let transport = FailoverTransport::new(chain);
    log::info!("[email] Transport chain: {}", transport.names().join(" -> "));
    Ok(transport)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        name: &'static str,
        ok: bool,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(name: &'static str, ok: bool) -> Arc<Self> {
            Arc::new(Fixed {
                name,
                ok,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[rocket::async_trait]
    impl Transport for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn send(&self, _email: &RenderedEmail) -> Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.ok {
                Ok(())
            } else {
                Err(format!("{} down", self.name))
            }
        }
    }

    fn email() -> RenderedEmail {
        RenderedEmail {
            to: "ada@example.com".to_string(),
            subject: "Hi".to_string(),
            html: "<p>Hi</p>".to_string(),
            text: "Hi".to_string(),
        }
    }

    #[tokio::test]
    async fn failover_stops_at_first_success() {
        let a = Fixed::new("a", false);
        let b = Fixed::new("b", true);
        let c = Fixed::new("c", true);
        let chain = FailoverTransport::new(vec![
            a.clone() as Arc<dyn Transport>,
            b.clone() as Arc<dyn Transport>,
            c.clone() as Arc<dyn Transport>,
        ]);

        assert!(chain.send(&email()).await.is_ok());
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.calls.load(Ordering::SeqCst), 1);
        assert_eq!(c.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failover_reports_last_error() {
        let chain = FailoverTransport::new(vec![
            Fixed::new("a", false) as Arc<dyn Transport>,
            Fixed::new("b", false) as Arc<dyn Transport>,
        ]);
        let err = chain.send(&email()).await.unwrap_err();
        assert!(err.contains("b down"), "{}", err);
    }

    #[tokio::test]
    async fn empty_chain_fails_without_panicking() {
        let chain = FailoverTransport::new(vec![]);
        assert!(chain.names().is_empty());
        assert_eq!(
            chain.send(&email()).await.unwrap_err(),
            "No email transport configured"
        );
    }

    #[tokio::test]
    async fn unconfigured_smtp_is_the_fallback() {
        let config = AppConfig::from_lookup(|_| None);
        let chain = from_config(&config).unwrap();
        assert_eq!(chain.names(), vec!["smtp"]);
        let err = chain.send(&email()).await.unwrap_err();
        assert!(err.ends_with("SMTP not configured"), "{}", err);
    }

    #[test]
    fn unconfigured_transports_are_skipped() {
        let config = AppConfig::from_lookup(|key| match key {
            "RESEND_API_KEY" => Some("re_test".to_string()),
            _ => None,
        });
        let chain = from_config(&config).unwrap();
        assert_eq!(chain.names(), vec!["resend"]);

        let config = AppConfig::from_lookup(|key| match key {
            "SMTP_HOST" => Some("smtp.example.com".to_string()),
            "SMTP_USER" => Some("bot@example.com".to_string()),
            "EMAIL_TRANSPORT_CHAIN" => Some("smtp, carrier-pigeon".to_string()),
            _ => None,
        });
        let chain = from_config(&config).unwrap();
        assert_eq!(chain.names(), vec!["smtp"]);
    }
}
