//! Email channel providers. `SendGridProvider` talks to the SendGrid v3 API;
//! `MockEmailProvider` is the zero-configuration fallback. The per-business
//! "from" address is derived from the business display name on top of the
//! verified sender domain.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::config::SendGridConfig;
use crate::error::{AppError, AppResult};
use crate::services::sms::{BulkItemOutcome, BulkOutcome, SendOutcome};

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub business_name: Option<String>,
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        business_name: Option<&str>,
    ) -> SendOutcome;

    async fn send_bulk(&self, messages: &[EmailMessage]) -> BulkOutcome;
}

/// Reduce a business display name to an email local-part: lowercase, keep
/// `[a-z0-9]` only. May come out empty (a name of only symbols or non-ASCII
/// letters), in which case the caller falls back to the default identity.
pub fn sanitize_local_part(business_name: &str) -> String {
    business_name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

/// Drop HTML tags for the plain-text alternative body.
pub fn strip_html(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut in_tag = false;
    for c in content.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

// ============================================================================
// SendGrid
// ============================================================================

pub struct SendGridProvider {
    client: reqwest::Client,
    api_key: String,
    from_email: String,
}

impl SendGridProvider {
    pub fn new(config: &SendGridConfig) -> AppResult<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            AppError::NotConfigured("SendGrid API key is not configured".to_string())
        })?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            from_email: config.from_email.clone(),
        })
    }

    /// `businessname@domain` where the domain comes from the verified sender
    /// identity; the default identity when the name sanitizes to nothing.
    fn from_address(&self, business_name: Option<&str>) -> String {
        let Some(name) = business_name else {
            return self.from_email.clone();
        };
        let local = sanitize_local_part(name);
        if local.is_empty() {
            return self.from_email.clone();
        }
        match self.from_email.split_once('@') {
            Some((_, domain)) => format!("{local}@{domain}"),
            None => self.from_email.clone(),
        }
    }

    async fn try_send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        business_name: Option<&str>,
    ) -> AppResult<SendOutcome> {
        let from_email = self.from_address(business_name);
        let from_name = business_name.unwrap_or("Klario");

        tracing::debug!("Sending email via SendGrid to {} from {}", to, from_email);

        let payload = json!({
            "personalizations": [{ "to": [{ "email": to }] }],
            "from": { "email": from_email, "name": from_name },
            "subject": subject,
            "content": [
                { "type": "text/plain", "value": strip_html(body) },
                { "type": "text/html", "value": body },
            ],
        });

        let response = self
            .client
            .post("https://api.sendgrid.com/v3/mail/send")
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| {
                    v.get("errors")
                        .and_then(|e| e.get(0))
                        .and_then(|e| e.get("message"))
                        .and_then(|m| m.as_str())
                        .map(String::from)
                })
                .unwrap_or_else(|| format!("HTTP {status}: {text}"));
            return Ok(SendOutcome::failed(message));
        }

        let message_id = response
            .headers()
            .get("x-message-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        Ok(SendOutcome::ok(message_id))
    }
}

#[async_trait]
impl EmailProvider for SendGridProvider {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        business_name: Option<&str>,
    ) -> SendOutcome {
        match self.try_send(to, subject, body, business_name).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("SendGrid send to {} failed: {}", to, e);
                SendOutcome::failed(e.to_string())
            }
        }
    }

    async fn send_bulk(&self, messages: &[EmailMessage]) -> BulkOutcome {
        let mut results = Vec::with_capacity(messages.len());

        for msg in messages {
            let outcome = self
                .send_email(&msg.to, &msg.subject, &msg.body, msg.business_name.as_deref())
                .await;
            results.push(BulkItemOutcome {
                to: msg.to.clone(),
                outcome,
            });
            // Pace requests to stay under the provider rate limit
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        BulkOutcome {
            success: results.iter().all(|r| r.outcome.success),
            results,
        }
    }
}

// ============================================================================
// Mock provider (development / testing)
// ============================================================================

pub struct MockEmailProvider;

#[async_trait]
impl EmailProvider for MockEmailProvider {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        _body: &str,
        business_name: Option<&str>,
    ) -> SendOutcome {
        tracing::info!(
            "[MOCK EMAIL] to={} subject={} business={}",
            to,
            subject,
            business_name.unwrap_or("-")
        );
        SendOutcome::ok(format!("mock-email-{}", uuid::Uuid::new_v4()))
    }

    async fn send_bulk(&self, messages: &[EmailMessage]) -> BulkOutcome {
        tracing::info!("[MOCK EMAIL] bulk send to {} recipients", messages.len());

        let mut results = Vec::with_capacity(messages.len());
        for msg in messages {
            let outcome = self
                .send_email(&msg.to, &msg.subject, &msg.body, msg.business_name.as_deref())
                .await;
            results.push(BulkItemOutcome {
                to: msg.to.clone(),
                outcome,
            });
        }

        BulkOutcome {
            success: true,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> SendGridProvider {
        SendGridProvider {
            client: reqwest::Client::new(),
            api_key: "test-key".to_string(),
            from_email: "noreply@klario.se".to_string(),
        }
    }

    #[test]
    fn local_part_keeps_ascii_alphanumerics() {
        assert_eq!(sanitize_local_part("Stockholm Flower Shop"), "stockholmflowershop");
        assert_eq!(sanitize_local_part("Cafe 21!"), "cafe21");
    }

    #[test]
    fn from_address_derived_from_business_name() {
        assert_eq!(
            provider().from_address(Some("Cafe 21")),
            "cafe21@klario.se"
        );
    }

    #[test]
    fn from_address_falls_back_when_name_sanitizes_empty() {
        assert_eq!(provider().from_address(Some("ÅÄÖ !!")), "noreply@klario.se");
        assert_eq!(provider().from_address(None), "noreply@klario.se");
    }

    #[test]
    fn strip_html_removes_tags() {
        assert_eq!(strip_html("<p>Hi <b>Anna</b></p>"), "Hi Anna");
        assert_eq!(strip_html("no markup"), "no markup");
    }

    #[tokio::test]
    async fn mock_provider_always_succeeds() {
        let outcome = MockEmailProvider
            .send_email("a@b.se", "Hello", "body", Some("Cafe"))
            .await;
        assert!(outcome.success);
        assert!(outcome.message_id.unwrap().starts_with("mock-email-"));
    }
}
