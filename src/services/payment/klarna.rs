//! Klarna: redirect/token-style checkout. A payment session plus client
//! authorization token is created up front; a later explicit capture call
//! places the order.

use async_trait::async_trait;
use base64::Engine;
use serde_json::json;

use crate::config::KlarnaConfig;
use crate::error::AppResult;
use crate::services::payment::{
    PaymentMetadata, PaymentProvider, PaymentResult, PaymentStatus,
};

/// Map Klarna's order-management vocabulary onto the normalized status enum.
/// Unknown values default to `pending` rather than failing.
pub(crate) fn map_klarna_status(status: &str) -> PaymentStatus {
    match status {
        "AUTHORIZED" => PaymentStatus::Pending,
        "CAPTURED" => PaymentStatus::Completed,
        "CANCELLED" => PaymentStatus::Cancelled,
        "EXPIRED" => PaymentStatus::Failed,
        _ => PaymentStatus::Pending,
    }
}

pub struct KlarnaProvider {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    /// Public base URL of this service, used for confirmation/webhook URLs.
    callback_base: String,
}

impl KlarnaProvider {
    pub fn new(config: &KlarnaConfig, callback_base: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.api_base().to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            callback_base: callback_base.to_string(),
        }
    }

    fn auth_header(&self) -> String {
        let credentials = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.username, self.password));
        format!("Basic {credentials}")
    }

    fn join_error_messages(body: &serde_json::Value, fallback: &str) -> String {
        body.get("error_messages")
            .and_then(|m| m.as_array())
            .map(|msgs| {
                msgs.iter()
                    .filter_map(|m| m.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .filter(|joined| !joined.is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }

    async fn try_create(
        &self,
        amount: i64,
        currency: &str,
        metadata: &PaymentMetadata,
    ) -> AppResult<PaymentResult> {
        // Klarna wants minor units (öre); tax amount assumes 25% Swedish VAT.
        let minor = amount * 100;
        let session_payload = json!({
            "purchase_country": "SE",
            "purchase_currency": currency,
            "locale": "sv-SE",
            "order_amount": minor,
            "order_lines": [{
                "type": "digital",
                "name": metadata.plan_name.as_deref().unwrap_or("Klario Subscription"),
                "quantity": 1,
                "unit_price": minor,
                "total_amount": minor,
                "tax_rate": 2500,
                "total_tax_amount": minor / 5,
            }],
            "merchant_urls": {
                "confirmation": format!("{}/payment/klarna/confirm", self.callback_base),
                "notification": format!("{}/api/payment/klarna/webhook", self.callback_base),
            },
            "billing_address": {
                "given_name": metadata.first_name.as_deref().unwrap_or(""),
                "family_name": metadata.last_name.as_deref().unwrap_or(""),
                "email": metadata.email.as_deref().unwrap_or(""),
                "street_address": metadata.address.as_deref().unwrap_or(""),
                "postal_code": metadata.postal_code.as_deref().unwrap_or(""),
                "city": metadata.city.as_deref().unwrap_or(""),
                "country": "SE",
            },
        });

        let response = self
            .client
            .post(format!("{}/payments/v1/sessions", self.base_url))
            .header(http::header::AUTHORIZATION, self.auth_header())
            .json(&session_payload)
            .send()
            .await?;

        let status = response.status();
        let session_data: serde_json::Value = response.json().await?;

        if !status.is_success() {
            return Ok(PaymentResult::failure(
                "",
                Self::join_error_messages(&session_data, "Failed to create Klarna session"),
            ));
        }

        let session_id = session_data
            .get("session_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        // Authorization token for the client-side widget
        let token_response = self
            .client
            .post(format!(
                "{}/payments/v1/sessions/{}/authorization-token",
                self.base_url, session_id
            ))
            .header(http::header::AUTHORIZATION, self.auth_header())
            .send()
            .await?;
        let token_data: serde_json::Value = token_response.json().await?;

        Ok(PaymentResult {
            success: true,
            payment_id: session_id.clone(),
            status: PaymentStatus::Pending,
            redirect_url: None,
            qr_code: None,
            error: None,
            provider_data: Some(json!({
                "sessionId": session_id,
                "clientToken": token_data.get("authorization_token"),
                "paymentMethodCategories": session_data.get("payment_method_categories"),
            })),
        })
    }

    async fn try_capture(&self, authorization_token: &str) -> AppResult<PaymentResult> {
        let response = self
            .client
            .post(format!("{}/ordermanagement/v1/orders", self.base_url))
            .header(http::header::AUTHORIZATION, self.auth_header())
            .header(
                "Klarna-Idempotency-Key",
                format!("klario-{}", uuid::Uuid::new_v4()),
            )
            .json(&json!({
                "authorization_token": authorization_token,
                "purchase_country": "SE",
                "purchase_currency": "SEK",
                "locale": "sv-SE",
            }))
            .send()
            .await?;

        let status = response.status();
        let order_data: serde_json::Value = response.json().await?;

        if !status.is_success() {
            return Ok(PaymentResult::failure(
                authorization_token,
                Self::join_error_messages(&order_data, "Failed to capture Klarna payment"),
            ));
        }

        let order_id = order_data
            .get("order_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        Ok(PaymentResult {
            success: true,
            payment_id: order_id,
            status: PaymentStatus::Completed,
            redirect_url: None,
            qr_code: None,
            error: None,
            provider_data: Some(order_data),
        })
    }

    async fn try_refund(&self, order_id: &str, amount: Option<i64>) -> AppResult<PaymentResult> {
        let payload = match amount {
            Some(a) => json!({ "refunded_amount": a * 100 }),
            None => json!({}),
        };

        let response = self
            .client
            .post(format!(
                "{}/ordermanagement/v1/orders/{}/refunds",
                self.base_url, order_id
            ))
            .header(http::header::AUTHORIZATION, self.auth_header())
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(PaymentResult::failure(
                order_id,
                "Failed to refund Klarna payment",
            ));
        }

        let refund_data: serde_json::Value = response.json().await.unwrap_or(json!({}));

        Ok(PaymentResult {
            success: true,
            payment_id: order_id.to_string(),
            status: PaymentStatus::Refunded,
            redirect_url: None,
            qr_code: None,
            error: None,
            provider_data: Some(refund_data),
        })
    }

    async fn try_status(&self, order_id: &str) -> AppResult<PaymentResult> {
        let response = self
            .client
            .get(format!(
                "{}/ordermanagement/v1/orders/{}",
                self.base_url, order_id
            ))
            .header(http::header::AUTHORIZATION, self.auth_header())
            .send()
            .await?;

        let status = response.status();
        let order_data: serde_json::Value = response.json().await?;

        if !status.is_success() {
            return Ok(PaymentResult::failure(
                order_id,
                "Failed to get Klarna order status",
            ));
        }

        let mapped = map_klarna_status(
            order_data
                .get("status")
                .and_then(|v| v.as_str())
                .unwrap_or(""),
        );

        Ok(PaymentResult {
            success: true,
            payment_id: order_id.to_string(),
            status: mapped,
            redirect_url: None,
            qr_code: None,
            error: None,
            provider_data: Some(order_data),
        })
    }
}

#[async_trait]
impl PaymentProvider for KlarnaProvider {
    async fn create_payment(
        &self,
        amount: i64,
        currency: &str,
        metadata: &PaymentMetadata,
    ) -> PaymentResult {
        match self.try_create(amount, currency, metadata).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Klarna payment creation error: {}", e);
                PaymentResult::failure("", "Network error creating Klarna payment")
            }
        }
    }

    async fn capture_payment(&self, payment_id: &str) -> PaymentResult {
        match self.try_capture(payment_id).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Klarna payment capture error: {}", e);
                PaymentResult::failure(payment_id, "Network error capturing Klarna payment")
            }
        }
    }

    async fn refund_payment(&self, payment_id: &str, amount: Option<i64>) -> PaymentResult {
        match self.try_refund(payment_id, amount).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Klarna refund error: {}", e);
                PaymentResult::failure(payment_id, "Network error processing Klarna refund")
            }
        }
    }

    async fn payment_status(&self, payment_id: &str) -> PaymentResult {
        match self.try_status(payment_id).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Klarna status check error: {}", e);
                PaymentResult::failure(payment_id, "Network error checking Klarna status")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_statuses_map_exhaustively() {
        assert_eq!(map_klarna_status("AUTHORIZED"), PaymentStatus::Pending);
        assert_eq!(map_klarna_status("CAPTURED"), PaymentStatus::Completed);
        assert_eq!(map_klarna_status("CANCELLED"), PaymentStatus::Cancelled);
        assert_eq!(map_klarna_status("EXPIRED"), PaymentStatus::Failed);
    }

    #[test]
    fn unknown_statuses_default_to_pending() {
        assert_eq!(map_klarna_status("PART_CAPTURED"), PaymentStatus::Pending);
        assert_eq!(map_klarna_status(""), PaymentStatus::Pending);
        assert_eq!(map_klarna_status("garbage"), PaymentStatus::Pending);
    }

    #[test]
    fn error_messages_joined_with_fallback() {
        let body = serde_json::json!({ "error_messages": ["bad country", "bad amount"] });
        assert_eq!(
            KlarnaProvider::join_error_messages(&body, "fallback"),
            "bad country, bad amount"
        );
        let empty = serde_json::json!({});
        assert_eq!(
            KlarnaProvider::join_error_messages(&empty, "fallback"),
            "fallback"
        );
    }
}
