//! SMS channel providers. `HelloSmsProvider` talks to the HelloSMS gateway;
//! `MockSmsProvider` keeps the system functional with zero external
//! configuration. Selection happens once at startup (see `services::init`).

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::config::HelloSmsConfig;
use crate::error::{AppError, AppResult};

/// Hard gateway constraint on the "from" label.
pub const SENDER_LABEL_MAX_CHARS: usize = 11;

/// Outcome of one send attempt. Transport errors and upstream rejections
/// both land here as `success: false`; nothing is retried automatically.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendOutcome {
    pub fn ok(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: Some(message_id.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmsMessage {
    pub to: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkItemOutcome {
    pub to: String,
    #[serde(flatten)]
    pub outcome: SendOutcome,
}

/// Aggregate of a bulk send: `success` is true only when every item
/// succeeded; per-item detail is always returned for partial failures.
#[derive(Debug, Clone, Serialize)]
pub struct BulkOutcome {
    pub success: bool,
    pub results: Vec<BulkItemOutcome>,
}

#[async_trait]
pub trait SmsProvider: Send + Sync {
    async fn send_sms(&self, to: &str, message: &str, from: Option<&str>) -> SendOutcome;

    async fn send_bulk(&self, messages: &[SmsMessage], from: Option<&str>) -> BulkOutcome;
}

/// Strip formatting from a phone number, keeping digits and a leading `+`.
pub fn clean_phone(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect()
}

/// Validate a user-supplied sender label. Explicit input is rejected rather
/// than silently truncated; only derived labels go through
/// [`derive_sender_label`].
pub fn validate_sender_label(label: &str) -> AppResult<()> {
    if label.trim().is_empty() {
        return Err(AppError::Validation(
            "SMS sender name must not be empty".to_string(),
        ));
    }
    if label.chars().count() > SENDER_LABEL_MAX_CHARS {
        return Err(AppError::Validation(format!(
            "SMS sender name must be at most {SENDER_LABEL_MAX_CHARS} characters"
        )));
    }
    if !label
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == ' ')
    {
        return Err(AppError::Validation(
            "SMS sender name may only contain letters, digits and spaces".to_string(),
        ));
    }
    Ok(())
}

/// Truncate an automatically-derived sender label (e.g. a business name) to
/// the gateway limit.
pub fn derive_sender_label(label: &str) -> String {
    label.chars().take(SENDER_LABEL_MAX_CHARS).collect()
}

// ============================================================================
// HelloSMS
// ============================================================================

#[derive(Serialize)]
struct HelloSmsRequest<'a> {
    to: Vec<String>,
    message: &'a str,
    from: String,
}

#[derive(Deserialize)]
struct HelloSmsResponse {
    status: String,
    #[serde(rename = "messageIds", default)]
    message_ids: Vec<HelloSmsMessageId>,
}

#[derive(Deserialize)]
struct HelloSmsMessageId {
    #[serde(rename = "apiMessageId")]
    api_message_id: String,
}

pub struct HelloSmsProvider {
    client: reqwest::Client,
    api_url: String,
    username: String,
    password: String,
    default_sender: String,
}

impl HelloSmsProvider {
    pub fn new(config: &HelloSmsConfig) -> AppResult<Self> {
        let (username, password) = match (&config.username, &config.password) {
            (Some(u), Some(p)) => (u.clone(), p.clone()),
            _ => {
                return Err(AppError::NotConfigured(
                    "HelloSMS credentials are not configured".to_string(),
                ))
            }
        };

        Ok(Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            username,
            password,
            default_sender: config.default_sender.clone(),
        })
    }

    fn auth_header(&self) -> String {
        let credentials = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.username, self.password));
        format!("Basic {credentials}")
    }

    async fn try_send(&self, to: &str, message: &str, from: Option<&str>) -> AppResult<SendOutcome> {
        let sender = derive_sender_label(from.unwrap_or(&self.default_sender));
        let body = HelloSmsRequest {
            to: vec![clean_phone(to)],
            message,
            from: sender,
        };

        tracing::debug!("Sending SMS via HelloSMS to {}", to);

        let response = self
            .client
            .post(format!("{}/sms/send", self.api_url))
            .header(http::header::AUTHORIZATION, self.auth_header())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
                .unwrap_or_else(|| format!("HTTP {status}: {text}"));
            return Ok(SendOutcome::failed(message));
        }

        let parsed: HelloSmsResponse = response.json().await?;
        if parsed.status == "success" {
            let message_id = parsed
                .message_ids
                .into_iter()
                .next()
                .map(|m| m.api_message_id)
                .unwrap_or_default();
            Ok(SendOutcome::ok(message_id))
        } else {
            Ok(SendOutcome::failed(format!(
                "HelloSMS rejected the message (status: {})",
                parsed.status
            )))
        }
    }
}

#[async_trait]
impl SmsProvider for HelloSmsProvider {
    async fn send_sms(&self, to: &str, message: &str, from: Option<&str>) -> SendOutcome {
        match self.try_send(to, message, from).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("HelloSMS send to {} failed: {}", to, e);
                SendOutcome::failed(e.to_string())
            }
        }
    }

    async fn send_bulk(&self, messages: &[SmsMessage], from: Option<&str>) -> BulkOutcome {
        let mut results = Vec::with_capacity(messages.len());

        for msg in messages {
            let outcome = self.send_sms(&msg.to, &msg.message, from).await;
            results.push(BulkItemOutcome {
                to: msg.to.clone(),
                outcome,
            });
            // Pace requests against the gateway
            tokio::time::sleep(Duration::from_millis(200)).await;
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

pub struct MockSmsProvider;

#[async_trait]
impl SmsProvider for MockSmsProvider {
    async fn send_sms(&self, to: &str, message: &str, from: Option<&str>) -> SendOutcome {
        tracing::info!(
            "[MOCK SMS] to={} from={} message={}",
            to,
            from.unwrap_or("Klario"),
            message
        );
        SendOutcome::ok(format!("mock-sms-{}", uuid::Uuid::new_v4()))
    }

    async fn send_bulk(&self, messages: &[SmsMessage], from: Option<&str>) -> BulkOutcome {
        tracing::info!("[MOCK SMS] bulk send to {} recipients", messages.len());

        let mut results = Vec::with_capacity(messages.len());
        for msg in messages {
            let outcome = self.send_sms(&msg.to, &msg.message, from).await;
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

    #[test]
    fn clean_phone_strips_formatting() {
        assert_eq!(clean_phone("+46 70-123 45 67"), "+46701234567");
        assert_eq!(clean_phone("(070) 123.45.67"), "0701234567");
    }

    #[test]
    fn sender_label_accepts_valid_names() {
        assert!(validate_sender_label("Klario").is_ok());
        assert!(validate_sender_label("Cafe 21").is_ok());
        assert!(validate_sender_label("ABCDEFGHIJK").is_ok()); // exactly 11
    }

    #[test]
    fn sender_label_rejects_too_long() {
        assert!(validate_sender_label("ABCDEFGHIJKL").is_err()); // 12 chars
    }

    #[test]
    fn sender_label_rejects_invalid_chars() {
        assert!(validate_sender_label("Café").is_err());
        assert!(validate_sender_label("Shop!").is_err());
        assert!(validate_sender_label("a_b").is_err());
    }

    #[test]
    fn sender_label_rejects_empty() {
        assert!(validate_sender_label("").is_err());
        assert!(validate_sender_label("   ").is_err());
    }

    #[test]
    fn derived_label_truncated_to_limit() {
        assert_eq!(derive_sender_label("Stockholm Flower Shop"), "Stockholm F");
        assert_eq!(derive_sender_label("Short"), "Short");
    }

    #[tokio::test]
    async fn mock_provider_always_succeeds() {
        let provider = MockSmsProvider;
        let outcome = provider.send_sms("+46701234567", "hello", None).await;
        assert!(outcome.success);
        assert!(outcome.message_id.unwrap().starts_with("mock-sms-"));
    }

    #[tokio::test]
    async fn bulk_outcome_reports_every_item() {
        let provider = MockSmsProvider;
        let messages = vec![
            SmsMessage {
                to: "+461".to_string(),
                message: "a".to_string(),
            },
            SmsMessage {
                to: "+462".to_string(),
                message: "b".to_string(),
            },
        ];
        let bulk = provider.send_bulk(&messages, None).await;
        assert!(bulk.success);
        assert_eq!(bulk.results.len(), 2);
        assert_eq!(bulk.results[0].to, "+461");
    }
}
