use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::db::models::CreatePaymentTransaction;
use crate::db::repository::{
    KlarnaOrderRepository, PaymentTransactionRepository, SwishPaymentRepository,
};
use crate::error::{AppError, AppResult};
use crate::services::payment::klarna::map_klarna_status;
use crate::services::payment::swish::map_swish_status;
use crate::services::payment::{PaymentMetadata, PaymentResult};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:method/create", post(create_payment))
        .route("/:method/capture", post(capture_payment))
        .route("/:method/refund", post(refund_payment))
        .route("/:method/status/:payment_id", get(payment_status))
}

/// Provider callback receivers, rate limited separately in `main`.
pub fn webhook_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/klarna/webhook", post(klarna_webhook))
        .route("/swish/webhook", post(swish_webhook))
}

/// Subscription plan catalog; checkout amounts come from here, not from the
/// client.
fn plan_pricing(plan: &str) -> Option<(i64, &'static str)> {
    match plan {
        "starter" => Some((399, "Starter Plan")),
        "professional" => Some((799, "Professional Plan")),
        "enterprise" => Some((1999, "Enterprise Plan")),
        _ => None,
    }
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub amount: Option<i64>,
    pub plan: Option<String>,
    #[serde(default)]
    pub customer_info: PaymentMetadata,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturePaymentRequest {
    pub payment_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundPaymentRequest {
    pub payment_id: String,
    pub amount: Option<i64>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn create_payment(
    State(state): State<Arc<AppState>>,
    Path(method): Path<String>,
    Json(body): Json<CreatePaymentRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let (amount, description) = match &body.plan {
        Some(plan) => plan_pricing(plan)
            .map(|(amount, name)| (amount, name.to_string()))
            .ok_or_else(|| AppError::Validation("Invalid plan selected".to_string()))?,
        None => {
            let amount = body
                .amount
                .filter(|a| *a > 0)
                .ok_or_else(|| AppError::Validation("A positive amount is required".to_string()))?;
            (amount, "Klario Subscription".to_string())
        }
    };

    let mut metadata = body.customer_info;
    metadata.plan_name = Some(description.clone());

    let result = state
        .payments
        .create_payment(&method, amount, "SEK", &metadata)
        .await;

    let transaction = PaymentTransactionRepository::create(
        &state.db,
        CreatePaymentTransaction {
            business_id: None,
            amount,
            currency: "SEK".to_string(),
            status: result.status.as_str().to_string(),
            payment_method: method.clone(),
            provider_transaction_id: (!result.payment_id.is_empty())
                .then(|| result.payment_id.clone()),
            description,
        },
    )
    .await?;

    if result.success {
        record_provider_details(&state, &method, &transaction.id, &result).await?;
    }

    let mut response = serde_json::to_value(&result)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Serialization failed: {e}")))?;
    response["transactionId"] = json!(transaction.id);
    Ok(Json(response))
}

async fn record_provider_details(
    state: &AppState,
    method: &str,
    transaction_id: &str,
    result: &PaymentResult,
) -> AppResult<()> {
    let raw = result
        .provider_data
        .as_ref()
        .map(|d| d.to_string());

    match method {
        "klarna" => {
            let client_token = result
                .provider_data
                .as_ref()
                .and_then(|d| d.get("clientToken"))
                .and_then(|t| t.as_str())
                .map(String::from);
            KlarnaOrderRepository::create(
                &state.db,
                transaction_id,
                &result.payment_id,
                client_token.as_deref(),
                raw.as_deref(),
            )
            .await?;
        }
        "swish" => {
            let reference = result
                .provider_data
                .as_ref()
                .and_then(|d| d.get("paymentReference"))
                .and_then(|r| r.as_str())
                .unwrap_or_default()
                .to_string();
            SwishPaymentRepository::create(
                &state.db,
                transaction_id,
                &result.payment_id,
                &reference,
                result.qr_code.as_deref(),
                raw.as_deref(),
            )
            .await?;
        }
        _ => {}
    }
    Ok(())
}

async fn capture_payment(
    State(state): State<Arc<AppState>>,
    Path(method): Path<String>,
    Json(body): Json<CapturePaymentRequest>,
) -> AppResult<Json<PaymentResult>> {
    let result = state
        .payments
        .capture_payment(&method, &body.payment_id)
        .await;

    sync_transaction_status(&state, &body.payment_id, &result).await?;
    Ok(Json(result))
}

async fn refund_payment(
    State(state): State<Arc<AppState>>,
    Path(method): Path<String>,
    Json(body): Json<RefundPaymentRequest>,
) -> AppResult<Json<PaymentResult>> {
    let result = state
        .payments
        .refund_payment(&method, &body.payment_id, body.amount)
        .await;

    sync_transaction_status(&state, &body.payment_id, &result).await?;
    Ok(Json(result))
}

async fn payment_status(
    State(state): State<Arc<AppState>>,
    Path((method, payment_id)): Path<(String, String)>,
) -> AppResult<Json<PaymentResult>> {
    let result = state.payments.payment_status(&method, &payment_id).await;

    sync_transaction_status(&state, &payment_id, &result).await?;
    Ok(Json(result))
}

/// Keep the stored transaction in step with what the provider reported.
/// Lookups are by the provider's native id; unknown ids are ignored (the
/// provider may know payments this instance never created).
async fn sync_transaction_status(
    state: &AppState,
    provider_payment_id: &str,
    result: &PaymentResult,
) -> AppResult<()> {
    if !result.success {
        return Ok(());
    }
    if let Some(transaction) =
        PaymentTransactionRepository::find_by_provider_id(&state.db, provider_payment_id).await?
    {
        PaymentTransactionRepository::update_status(
            &state.db,
            &transaction.id,
            result.status.as_str(),
            Some(&result.payment_id),
        )
        .await?;
    }
    Ok(())
}

// ============================================================================
// Webhooks
// ============================================================================

async fn klarna_webhook(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> AppResult<Json<serde_json::Value>> {
    let order_id = payload
        .get("order_id")
        .or_else(|| payload.get("session_id"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| AppError::BadRequest("Missing order id in webhook".to_string()))?;
    let status = map_klarna_status(
        payload
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or(""),
    );

    tracing::info!("Klarna webhook for {}: {}", order_id, status.as_str());

    if let Some(transaction) =
        PaymentTransactionRepository::find_by_provider_id(&state.db, order_id).await?
    {
        PaymentTransactionRepository::update_status(
            &state.db,
            &transaction.id,
            status.as_str(),
            None,
        )
        .await?;
    } else {
        tracing::warn!("Klarna webhook for unknown order {}", order_id);
    }

    Ok(Json(json!({ "received": true })))
}

async fn swish_webhook(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> AppResult<Json<serde_json::Value>> {
    let payment_id = payload
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AppError::BadRequest("Missing payment id in webhook".to_string()))?;
    let status = map_swish_status(
        payload
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or(""),
    );

    tracing::info!("Swish webhook for {}: {}", payment_id, status.as_str());

    if let Some(transaction) =
        PaymentTransactionRepository::find_by_provider_id(&state.db, payment_id).await?
    {
        PaymentTransactionRepository::update_status(
            &state.db,
            &transaction.id,
            status.as_str(),
            None,
        )
        .await?;
    } else {
        tracing::warn!("Swish webhook for unknown payment {}", payment_id);
    }

    Ok(Json(json!({ "received": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_catalog_prices() {
        assert_eq!(plan_pricing("starter"), Some((399, "Starter Plan")));
        assert_eq!(plan_pricing("professional"), Some((799, "Professional Plan")));
        assert_eq!(plan_pricing("enterprise"), Some((1999, "Enterprise Plan")));
        assert_eq!(plan_pricing("free"), None);
    }
}
