use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One row per payment attempt, carrying the normalized status. Provider
/// native identifiers and payloads live in the provider-specific sub-records.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTransaction {
    pub id: String,
    pub business_id: Option<i64>,
    /// Whole currency units (SEK)
    pub amount: i64,
    pub currency: String,
    /// pending, completed, failed, cancelled, refunded
    pub status: String,
    /// klarna, swish
    pub payment_method: String,
    pub provider_transaction_id: Option<String>,
    pub description: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct CreatePaymentTransaction {
    pub business_id: Option<i64>,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub payment_method: String,
    pub provider_transaction_id: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KlarnaOrder {
    pub id: String,
    pub transaction_id: String,
    pub session_id: String,
    pub client_token: Option<String>,
    pub raw_response: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwishPayment {
    pub id: String,
    pub transaction_id: String,
    pub swish_payment_id: String,
    /// Merchant-generated idempotent reference
    pub payment_reference: String,
    pub qr_code: Option<String>,
    pub raw_response: Option<String>,
    pub created_at: NaiveDateTime,
}
