//! Email provider client — Resend-compatible transactional HTTP API.

use async_trait::async_trait;
use tracing::{debug, warn};

use echo_core::config::MailerConfig;

use crate::error::MailerError;

/// External send capability: one email to one address; succeeds or
/// fails with an HTTP-coded error.
#[async_trait]
pub trait Mailer: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, to: &str, subject: &str, text: &str) -> Result<(), MailerError>;
}

/// Production mailer: `POST {base}/emails` with a bearer API key.
pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    from: String,
}

impl ResendMailer {
    pub fn new(api_key: String, cfg: &MailerConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: cfg.url.trim_end_matches('/').to_string(),
            from: cfg.from.clone(),
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    fn name(&self) -> &str {
        "resend"
    }

    async fn send(&self, to: &str, subject: &str, text: &str) -> Result<(), MailerError> {
        let url = format!("{}/emails", self.base_url);
        debug!(to = %to, "sending email");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&serde_json::json!({
                "from": self.from,
                "to": [to],
                "subject": subject,
                "text": text,
            }))
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status, body = %body, "email provider error");
            return Err(MailerError::Api {
                status,
                message: body,
            });
        }
        Ok(())
    }
}
