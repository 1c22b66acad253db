//! Swish: QR/callback-style mobile payment. A payment request is keyed by a
//! merchant-generated idempotent reference and answered with a QR payload;
//! completion arrives through the callback URL (or polling).

use async_trait::async_trait;
use serde_json::json;

use crate::config::SwishConfig;
use crate::error::AppResult;
use crate::services::payment::{
    PaymentMetadata, PaymentProvider, PaymentResult, PaymentStatus,
};

/// Map Swish payment-request statuses onto the normalized enum. Unknown
/// values default to `pending` rather than failing.
pub(crate) fn map_swish_status(status: &str) -> PaymentStatus {
    match status {
        "CREATED" => PaymentStatus::Pending,
        "PAID" => PaymentStatus::Completed,
        "DECLINED" | "ERROR" => PaymentStatus::Failed,
        "CANCELLED" => PaymentStatus::Cancelled,
        _ => PaymentStatus::Pending,
    }
}

/// Merchant-side idempotent reference for a payment or refund request.
fn payment_reference(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}

pub struct SwishProvider {
    client: reqwest::Client,
    base_url: String,
    payee_alias: String,
    callback_base: String,
}

impl SwishProvider {
    pub fn new(config: &SwishConfig, callback_base: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.api_base().to_string(),
            payee_alias: config.payee_alias.clone(),
            callback_base: callback_base.to_string(),
        }
    }

    /// Payment id arrives as the last segment of the Location header.
    fn id_from_location(response: &reqwest::Response) -> String {
        response
            .headers()
            .get(http::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|loc| loc.rsplit('/').next())
            .unwrap_or_default()
            .to_string()
    }

    async fn try_create(
        &self,
        amount: i64,
        currency: &str,
        metadata: &PaymentMetadata,
    ) -> AppResult<PaymentResult> {
        let reference = payment_reference("klario");

        let payload = json!({
            "payeePaymentReference": reference,
            "callbackUrl": format!("{}/api/payment/swish/webhook", self.callback_base),
            "payeeAlias": self.payee_alias,
            "amount": amount.to_string(),
            "currency": currency,
            "message": format!(
                "Klario - {}",
                metadata.plan_name.as_deref().unwrap_or("Subscription")
            ),
        });

        let response = self
            .client
            .post(format!(
                "{}/swish-cpcapi/api/v2/paymentrequests",
                self.base_url
            ))
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let body: serde_json::Value = response.json().await.unwrap_or(json!({}));
            let message = body
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("Failed to create Swish payment");
            return Ok(PaymentResult::failure("", message));
        }

        let payment_id = Self::id_from_location(&response);

        // QR payload for mobile-to-mobile payment; best effort, the payment
        // request itself already exists.
        let qr_code = match self
            .client
            .post(format!(
                "{}/swish-cpcapi/api/v1/paymentrequests/{}/qrcodes",
                self.base_url, payment_id
            ))
            .json(&json!({ "format": "png", "size": 300 }))
            .send()
            .await
        {
            Ok(qr_response) if qr_response.status().is_success() => {
                qr_response.text().await.ok()
            }
            _ => None,
        };

        Ok(PaymentResult {
            success: true,
            payment_id,
            status: PaymentStatus::Pending,
            redirect_url: None,
            qr_code,
            error: None,
            provider_data: Some(json!({
                "paymentReference": reference,
                "payeeAlias": self.payee_alias,
            })),
        })
    }

    async fn try_refund(&self, payment_id: &str, amount: Option<i64>) -> AppResult<PaymentResult> {
        let reference = payment_reference("klario-refund");

        let payload = json!({
            "payerPaymentReference": reference,
            "originalPaymentReference": payment_id,
            "payerAlias": self.payee_alias,
            "amount": amount.map(|a| a.to_string()),
            "currency": "SEK",
            "message": "Klario Refund",
        });

        let response = self
            .client
            .post(format!("{}/swish-cpcapi/api/v1/refunds", self.base_url))
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(PaymentResult::failure(
                payment_id,
                "Failed to create Swish refund",
            ));
        }

        let refund_id = Self::id_from_location(&response);

        Ok(PaymentResult {
            success: true,
            payment_id: refund_id,
            status: PaymentStatus::Refunded,
            redirect_url: None,
            qr_code: None,
            error: None,
            provider_data: Some(json!({
                "refundReference": reference,
                "originalPaymentReference": payment_id,
            })),
        })
    }

    async fn try_status(&self, payment_id: &str) -> AppResult<PaymentResult> {
        let response = self
            .client
            .get(format!(
                "{}/swish-cpcapi/api/v1/paymentrequests/{}",
                self.base_url, payment_id
            ))
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(PaymentResult::failure(
                payment_id,
                "Failed to get Swish payment status",
            ));
        }

        let payment_data: serde_json::Value = response.json().await?;
        let mapped = map_swish_status(
            payment_data
                .get("status")
                .and_then(|v| v.as_str())
                .unwrap_or(""),
        );

        Ok(PaymentResult {
            success: true,
            payment_id: payment_id.to_string(),
            status: mapped,
            redirect_url: None,
            qr_code: None,
            error: None,
            provider_data: Some(payment_data),
        })
    }
}

#[async_trait]
impl PaymentProvider for SwishProvider {
    async fn create_payment(
        &self,
        amount: i64,
        currency: &str,
        metadata: &PaymentMetadata,
    ) -> PaymentResult {
        match self.try_create(amount, currency, metadata).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Swish payment creation error: {}", e);
                PaymentResult::failure("", "Network error creating Swish payment")
            }
        }
    }

    /// Swish payments are captured automatically on completion; capture is a
    /// status read.
    async fn capture_payment(&self, payment_id: &str) -> PaymentResult {
        self.payment_status(payment_id).await
    }

    async fn refund_payment(&self, payment_id: &str, amount: Option<i64>) -> PaymentResult {
        match self.try_refund(payment_id, amount).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Swish refund error: {}", e);
                PaymentResult::failure(payment_id, "Network error processing Swish refund")
            }
        }
    }

    async fn payment_status(&self, payment_id: &str) -> PaymentResult {
        match self.try_status(payment_id).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Swish status check error: {}", e);
                PaymentResult::failure(payment_id, "Network error checking Swish status")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_statuses_map_exhaustively() {
        assert_eq!(map_swish_status("CREATED"), PaymentStatus::Pending);
        assert_eq!(map_swish_status("PAID"), PaymentStatus::Completed);
        assert_eq!(map_swish_status("DECLINED"), PaymentStatus::Failed);
        assert_eq!(map_swish_status("ERROR"), PaymentStatus::Failed);
        assert_eq!(map_swish_status("CANCELLED"), PaymentStatus::Cancelled);
    }

    #[test]
    fn unknown_statuses_default_to_pending() {
        assert_eq!(map_swish_status("VALIDATED"), PaymentStatus::Pending);
        assert_eq!(map_swish_status(""), PaymentStatus::Pending);
    }

    #[test]
    fn payment_references_are_unique() {
        let a = payment_reference("klario");
        let b = payment_reference("klario");
        assert!(a.starts_with("klario-"));
        assert_ne!(a, b);
    }
}
