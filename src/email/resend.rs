use std::time::Duration;

use serde_json::json;

use super::transport::Transport;
use super::RenderedEmail;

const ENDPOINT: &str = "https://api.resend.com/emails";

/// Delivery through the Resend HTTP API (https://resend.com/docs/api-reference/emails/send-email)
pub struct ResendTransport {
    client: reqwest::Client,
    api_key: String,
    from: String,
}

impl ResendTransport {
    pub fn new(api_key: &str, from_address: &str, from_name: &str, timeout: Duration) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("HTTP client error: {}", e))?;
        let from = if from_name.is_empty() {
            from_address.to_string()
        } else {
            format!("{} <{}>", from_name, from_address)
        };
        Ok(ResendTransport {
            client,
            api_key: api_key.to_string(),
            from,
        })
    }

    fn payload(&self, email: &RenderedEmail) -> serde_json::Value {
        json!({
            "from": self.from,
            "to": [email.to],
            "subject": email.subject,
            "html": email.html,
            "text": email.text
        })
    }
}

#[rocket::async_trait]
impl Transport for ResendTransport {
    fn name(&self) -> &str {
        "resend"
    }

    async fn send(&self, email: &RenderedEmail) -> Result<(), String> {
        if self.api_key.is_empty() {
            log::warn!("[resend] API key not configured");
            return Err("Resend API key not configured".into());
        }

        let resp = self
            .client
            .post(ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&self.payload(email))
            .send()
            .await
            .map_err(|e| format!("Resend request failed: {}", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(format!("Resend returned {}: {}", status, text));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> RenderedEmail {
        RenderedEmail {
            to: "ada@example.com".to_string(),
            subject: "Quiz results".to_string(),
            html: "<p>You placed 2nd</p>".to_string(),
            text: "You placed 2nd".to_string(),
        }
    }

    #[test]
    fn payload_carries_both_bodies() {
        let t = ResendTransport::new("re_123", "noreply@wagerly.example", "Wagerly", Duration::from_secs(10)).unwrap();
        let body = t.payload(&email());
        assert_eq!(body["from"], "Wagerly <noreply@wagerly.example>");
        assert_eq!(body["to"][0], "ada@example.com");
        assert_eq!(body["html"], "<p>You placed 2nd</p>");
        assert_eq!(body["text"], "You placed 2nd");
    }

    #[tokio::test]
    async fn missing_key_fails_without_request() {
        let t = ResendTransport::new("", "noreply@wagerly.example", "", Duration::from_secs(10)).unwrap();
        assert_eq!(t.from, "noreply@wagerly.example");
        assert_eq!(
            t.send(&email()).await.unwrap_err(),
            "Resend API key not configured"
        );
    }
}
