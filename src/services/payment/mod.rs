//! Payment provider abstraction. Two divergent upstream networks (Klarna:
//! redirect/token checkout, Swish: QR/callback mobile payment) are normalized
//! behind one trait and one result shape so callers never branch on provider
//! identity — only the normalized `status` and the optional
//! `redirect_url`/`qr_code` matter downstream.

pub mod klarna;
pub mod swish;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::PaymentConfig;

pub use klarna::KlarnaProvider;
pub use swish::SwishProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

/// Customer/plan context forwarded to the provider when a checkout starts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMetadata {
    pub plan_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
}

/// Uniform result shape for every provider operation. Transport failures are
/// caught inside the providers and surface here as `status: failed` with an
/// error message; provider calls never propagate an exception.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
    pub success: bool,
    pub payment_id: String,
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_data: Option<serde_json::Value>,
}

impl PaymentResult {
    pub fn failure(payment_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            payment_id: payment_id.into(),
            status: PaymentStatus::Failed,
            redirect_url: None,
            qr_code: None,
            error: Some(error.into()),
            provider_data: None,
        }
    }
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_payment(
        &self,
        amount: i64,
        currency: &str,
        metadata: &PaymentMetadata,
    ) -> PaymentResult;

    async fn capture_payment(&self, payment_id: &str) -> PaymentResult;

    async fn refund_payment(&self, payment_id: &str, amount: Option<i64>) -> PaymentResult;

    async fn payment_status(&self, payment_id: &str) -> PaymentResult;
}

/// Method-keyed provider registry, built once at startup. Unknown methods
/// answer with a failed result rather than an error or panic.
pub struct PaymentService {
    providers: HashMap<String, Arc<dyn PaymentProvider>>,
}

impl PaymentService {
    pub fn new(config: &PaymentConfig, base_url: &str) -> Self {
        let mut providers: HashMap<String, Arc<dyn PaymentProvider>> = HashMap::new();
        providers.insert(
            "klarna".to_string(),
            Arc::new(KlarnaProvider::new(&config.klarna, base_url)),
        );
        providers.insert(
            "swish".to_string(),
            Arc::new(SwishProvider::new(&config.swish, base_url)),
        );
        Self { providers }
    }

    pub fn provider(&self, method: &str) -> Option<&Arc<dyn PaymentProvider>> {
        self.providers.get(method)
    }

    pub async fn create_payment(
        &self,
        method: &str,
        amount: i64,
        currency: &str,
        metadata: &PaymentMetadata,
    ) -> PaymentResult {
        match self.provider(method) {
            Some(provider) => provider.create_payment(amount, currency, metadata).await,
            None => PaymentResult::failure("", format!("Unsupported payment method: {method}")),
        }
    }

    pub async fn capture_payment(&self, method: &str, payment_id: &str) -> PaymentResult {
        match self.provider(method) {
            Some(provider) => provider.capture_payment(payment_id).await,
            None => {
                PaymentResult::failure(payment_id, format!("Unsupported payment method: {method}"))
            }
        }
    }

    pub async fn refund_payment(
        &self,
        method: &str,
        payment_id: &str,
        amount: Option<i64>,
    ) -> PaymentResult {
        match self.provider(method) {
            Some(provider) => provider.refund_payment(payment_id, amount).await,
            None => {
                PaymentResult::failure(payment_id, format!("Unsupported payment method: {method}"))
            }
        }
    }

    pub async fn payment_status(&self, method: &str, payment_id: &str) -> PaymentResult {
        match self.provider(method) {
            Some(provider) => provider.payment_status(payment_id).await,
            None => {
                PaymentResult::failure(payment_id, format!("Unsupported payment method: {method}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PaymentConfig;

    fn service() -> PaymentService {
        let config = PaymentConfig {
            klarna: crate::config::KlarnaConfig {
                username: "u".to_string(),
                password: "p".to_string(),
                environment: "playground".to_string(),
            },
            swish: crate::config::SwishConfig {
                payee_alias: "1231111111".to_string(),
                environment: "test".to_string(),
            },
        };
        PaymentService::new(&config, "http://localhost:8080")
    }

    #[test]
    fn known_methods_are_registered() {
        let svc = service();
        assert!(svc.provider("klarna").is_some());
        assert!(svc.provider("swish").is_some());
        assert!(svc.provider("paypal").is_none());
    }

    #[tokio::test]
    async fn unknown_method_yields_failed_result() {
        let svc = service();
        let result = svc
            .create_payment("paypal", 399, "SEK", &PaymentMetadata::default())
            .await;
        assert!(!result.success);
        assert_eq!(result.status, PaymentStatus::Failed);
        assert!(result.error.unwrap().contains("paypal"));
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Completed).unwrap(),
            "\"completed\""
        );
        assert_eq!(PaymentStatus::Refunded.as_str(), "refunded");
    }
}
