use std::time::Duration;

use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;

use super::transport::Transport;
use super::RenderedEmail;

/// Delivery through an SMTP relay (lettre, tokio executor).
pub struct SmtpTransport {
    config: SmtpConfig,
    timeout: Duration,
}

impl SmtpTransport {
    pub fn new(config: SmtpConfig, timeout: Duration) -> Self {
        SmtpTransport { config, timeout }
    }

    fn from_mailbox(&self) -> Result<Mailbox, String> {
        let address = self
            .config
            .from_address
            .parse()
            .map_err(|e| format!("Invalid from address: {}", e))?;
        let name = Some(self.config.from_name.clone()).filter(|n| !n.is_empty());
        Ok(Mailbox::new(name, address))
    }

    pub fn build_message(&self, email: &RenderedEmail) -> Result<Message, String> {
        Message::builder()
            .from(self.from_mailbox()?)
            .to(email
                .to
                .parse()
                .map_err(|e| format!("Invalid to address: {}", e))?)
            .subject(email.subject.as_str())
            .multipart(MultiPart::alternative_plain_html(
                email.text.clone(),
                email.html.clone(),
            ))
            .map_err(|e| format!("Failed to build email: {}", e))
    }

    /// Implicit TLS on 465 (or `SMTP_SECURE=true`), STARTTLS otherwise.
    /// `SMTP_SECURE=false` off port 587 downgrades to opportunistic STARTTLS.
    fn tls(&self) -> Result<Tls, String> {
        let params = TlsParameters::builder(self.config.host.clone())
            .dangerous_accept_invalid_certs(!self.config.reject_unauthorized)
            .build()
            .map_err(|e| format!("TLS params error: {}", e))?;

        let tls = match self.config.secure {
            Some(true) => Tls::Wrapper(params),
            None if self.config.port == 465 => Tls::Wrapper(params),
            Some(false) if self.config.port != 587 => Tls::Opportunistic(params),
            _ => Tls::Required(params),
        };
        Ok(tls)
    }

    fn mailer(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, String> {
        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.clone(),
        );
        Ok(
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(self.config.host.as_str())
                .port(self.config.port)
                .tls(self.tls()?)
                .credentials(creds)
                .timeout(Some(self.timeout))
                .build(),
        )
    }
}

#[rocket::async_trait]
impl Transport for SmtpTransport {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send(&self, email: &RenderedEmail) -> Result<(), String> {
        if !self.config.is_configured() {
            log::warn!("[smtp] SMTP host, user or from address not configured");
            return Err("SMTP not configured".into());
        }

        let message = self.build_message(email)?;
        self.mailer()?
            .send(message)
            .await
            .map_err(|e| format!("SMTP send error: {}", e))?;
        log::debug!("[smtp] Delivered to {} via {}", email.to, self.config.host);
        Ok(())
    }
}
