use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::db::models::campaign::{is_known_channel, STATUS_DRAFT};
use crate::db::repository::{
    CampaignDeliveryRepository, CampaignRepository, CreateCampaign, UpdateCampaign,
};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthBusiness;
use crate::services::campaign::{CampaignService, SendEmailOptions, SendSmsOptions};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_campaigns).post(create_campaign))
        .route(
            "/:id",
            axum::routing::put(update_campaign).delete(delete_campaign),
        )
        .route("/:id/duplicate", post(duplicate_campaign))
        .route("/:id/send-sms", post(send_sms_campaign))
        .route("/:id/send-email", post(send_email_campaign))
        .route("/:id/deliveries", get(list_deliveries))
        .route(
            "/:id/deliveries/:delivery_id/status",
            post(upgrade_delivery_status),
        )
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignRequest {
    pub name: Option<String>,
    /// Some clients send the campaign name as `title`
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub campaign_type: String,
    pub subject: Option<String>,
    pub message: String,
    pub status: Option<String>,
    #[serde(default)]
    pub target_audience: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCampaignRequest {
    pub name: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub campaign_type: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
    pub status: Option<String>,
}

// ============================================================================
// CRUD Handlers
// ============================================================================

async fn list_campaigns(
    State(state): State<Arc<AppState>>,
    AuthBusiness(business): AuthBusiness,
) -> AppResult<Json<serde_json::Value>> {
    let campaigns = CampaignRepository::find_by_business(&state.db, business.id).await?;
    Ok(Json(json!({ "campaigns": campaigns })))
}

async fn create_campaign(
    State(state): State<Arc<AppState>>,
    AuthBusiness(business): AuthBusiness,
    Json(body): Json<CreateCampaignRequest>,
) -> AppResult<Json<serde_json::Value>> {
    if !is_known_channel(&body.campaign_type) {
        return Err(AppError::Validation(format!(
            "Unknown campaign type: {}",
            body.campaign_type
        )));
    }
    if body.message.trim().is_empty() {
        return Err(AppError::Validation(
            "Campaign message is required".to_string(),
        ));
    }

    let name = body
        .title
        .or(body.name)
        .unwrap_or_else(|| "Untitled Campaign".to_string());

    let campaign = CampaignRepository::create(
        &state.db,
        CreateCampaign {
            business_id: business.id,
            name,
            campaign_type: body.campaign_type,
            subject: body.subject,
            message: body.message,
            status: body.status.unwrap_or_else(|| STATUS_DRAFT.to_string()),
            target_audience: body.target_audience,
        },
    )
    .await?;

    Ok(Json(json!({ "campaign": campaign })))
}

async fn update_campaign(
    State(state): State<Arc<AppState>>,
    AuthBusiness(business): AuthBusiness,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCampaignRequest>,
) -> AppResult<Json<serde_json::Value>> {
    CampaignRepository::find_by_id_for_business(&state.db, id, business.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Campaign not found".to_string()))?;

    if let Some(channel) = &body.campaign_type {
        if !is_known_channel(channel) {
            return Err(AppError::Validation(format!(
                "Unknown campaign type: {channel}"
            )));
        }
    }

    let campaign = CampaignRepository::update(
        &state.db,
        id,
        UpdateCampaign {
            name: body.name.or(body.title),
            campaign_type: body.campaign_type,
            subject: body.subject,
            message: body.message,
            status: body.status,
        },
    )
    .await?;

    Ok(Json(json!({ "campaign": campaign })))
}

async fn delete_campaign(
    State(state): State<Arc<AppState>>,
    AuthBusiness(business): AuthBusiness,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    CampaignRepository::find_by_id_for_business(&state.db, id, business.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Campaign not found".to_string()))?;

    CampaignRepository::delete(&state.db, id).await?;
    Ok(Json(json!({ "message": "Campaign deleted successfully" })))
}

async fn duplicate_campaign(
    State(state): State<Arc<AppState>>,
    AuthBusiness(business): AuthBusiness,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    let original = CampaignRepository::find_by_id_for_business(&state.db, id, business.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Campaign not found".to_string()))?;

    let duplicate = CampaignRepository::create(
        &state.db,
        CreateCampaign {
            business_id: business.id,
            name: format!("{} (Copy)", original.name),
            campaign_type: original.campaign_type,
            subject: original.subject,
            message: original.message,
            status: STATUS_DRAFT.to_string(),
            target_audience: original.target_audience,
        },
    )
    .await?;

    Ok(Json(json!({ "campaign": duplicate })))
}

// ============================================================================
// Delivery Handlers
// ============================================================================

async fn send_sms_campaign(
    State(state): State<Arc<AppState>>,
    AuthBusiness(business): AuthBusiness,
    Path(id): Path<i64>,
    Json(options): Json<SendSmsOptions>,
) -> AppResult<Json<serde_json::Value>> {
    let service = CampaignService::new(state.db.clone(), state.sms.clone(), state.email.clone());
    let report = service.send_sms_campaign(business.id, id, options).await?;
    Ok(Json(json!(report)))
}

async fn send_email_campaign(
    State(state): State<Arc<AppState>>,
    AuthBusiness(business): AuthBusiness,
    Path(id): Path<i64>,
    Json(options): Json<SendEmailOptions>,
) -> AppResult<Json<serde_json::Value>> {
    let service = CampaignService::new(state.db.clone(), state.sms.clone(), state.email.clone());
    let report = service.send_email_campaign(business.id, id, options).await?;
    Ok(Json(json!(report)))
}

async fn list_deliveries(
    State(state): State<Arc<AppState>>,
    AuthBusiness(business): AuthBusiness,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    CampaignRepository::find_by_id_for_business(&state.db, id, business.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Campaign not found".to_string()))?;

    let deliveries = CampaignDeliveryRepository::find_by_campaign(&state.db, id).await?;
    Ok(Json(json!({ "deliveries": deliveries })))
}

#[derive(Debug, Deserialize)]
pub struct UpgradeDeliveryRequest {
    pub status: String,
}

/// Open/click tracking upgrade of a single delivery record.
async fn upgrade_delivery_status(
    State(state): State<Arc<AppState>>,
    AuthBusiness(business): AuthBusiness,
    Path((id, delivery_id)): Path<(i64, i64)>,
    Json(body): Json<UpgradeDeliveryRequest>,
) -> AppResult<Json<serde_json::Value>> {
    CampaignRepository::find_by_id_for_business(&state.db, id, business.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Campaign not found".to_string()))?;

    let delivery =
        CampaignDeliveryRepository::upgrade_status(&state.db, delivery_id, id, &body.status)
            .await?
            .ok_or_else(|| AppError::NotFound("Delivery not found".to_string()))?;

    Ok(Json(json!({ "delivery": delivery })))
}
