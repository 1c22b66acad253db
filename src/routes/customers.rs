use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::db::repository::{CreateCustomer, CustomerRepository, UpdateCustomer};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthBusiness;
use crate::services::campaign::CampaignService;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_customers).post(create_customer))
        .route("/:id", axum::routing::put(update_customer).delete(delete_customer))
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerRequest {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub consent_given: bool,
    pub source: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// When set, a one-off welcome message goes out over any eligible channel.
    #[serde(default)]
    pub send_welcome: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCustomerRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub consent_given: Option<bool>,
    pub status: Option<String>,
    pub tags: Option<Vec<String>>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_customers(
    State(state): State<Arc<AppState>>,
    AuthBusiness(business): AuthBusiness,
) -> AppResult<Json<serde_json::Value>> {
    let customers = CustomerRepository::find_by_business(&state.db, business.id).await?;
    Ok(Json(json!({ "customers": customers })))
}

async fn create_customer(
    State(state): State<Arc<AppState>>,
    AuthBusiness(business): AuthBusiness,
    Json(body): Json<CreateCustomerRequest>,
) -> AppResult<Json<serde_json::Value>> {
    if body.name.trim().is_empty() {
        return Err(AppError::Validation("Customer name is required".to_string()));
    }

    let customer = CustomerRepository::create(
        &state.db,
        CreateCustomer {
            business_id: business.id,
            name: body.name,
            email: body.email,
            phone: body.phone,
            consent_given: body.consent_given,
            consent_date: body.consent_given.then(|| Utc::now().naive_utc()),
            source: body.source,
            tags: body.tags,
        },
    )
    .await?;

    // Welcome messages are best effort; the customer record is already in.
    if body.send_welcome {
        let service =
            CampaignService::new(state.db.clone(), state.sms.clone(), state.email.clone());
        let sms_sent = service.send_welcome_sms(&customer, &business).await;
        let email_sent = service.send_welcome_email(&customer, &business).await;
        tracing::info!(
            "Welcome messages for customer {}: sms={} email={}",
            customer.id,
            sms_sent,
            email_sent
        );
    }

    Ok(Json(json!({ "customer": customer })))
}

async fn update_customer(
    State(state): State<Arc<AppState>>,
    AuthBusiness(business): AuthBusiness,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCustomerRequest>,
) -> AppResult<Json<serde_json::Value>> {
    // Tenant check before any mutation; a foreign id reads as absent.
    CustomerRepository::find_by_id_for_business(&state.db, id, business.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Customer not found".to_string()))?;

    let customer = CustomerRepository::update(
        &state.db,
        id,
        UpdateCustomer {
            name: body.name,
            email: body.email,
            phone: body.phone,
            consent_given: body.consent_given,
            status: body.status,
            tags: body.tags,
        },
    )
    .await?;

    Ok(Json(json!({ "customer": customer })))
}

async fn delete_customer(
    State(state): State<Arc<AppState>>,
    AuthBusiness(business): AuthBusiness,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    CustomerRepository::find_by_id_for_business(&state.db, id, business.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Customer not found".to_string()))?;

    CustomerRepository::delete(&state.db, id).await?;
    Ok(Json(json!({ "message": "Customer deleted successfully" })))
}
