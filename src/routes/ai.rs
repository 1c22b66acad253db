use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthBusiness;
use crate::services::ai::{AiCampaignService, EnhancementRequest, GenerationRequest};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/generate", post(generate))
        .route("/enhance", post(enhance))
        .route("/variations", post(variations))
}

/// The AI service is optional; its absence is a configuration condition the
/// client can act on ("add your API key"), not a send failure.
fn ai_service(state: &AppState) -> AppResult<&AiCampaignService> {
    state.ai.as_ref().ok_or_else(|| {
        AppError::NotConfigured(
            "OpenAI API key not configured. Please add your API key to use AI features."
                .to_string(),
        )
    })
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhanceRequest {
    pub message: String,
    #[serde(rename = "type")]
    pub campaign_type: String,
    #[serde(default)]
    pub improvements: Vec<String>,
    pub target_audience: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariationsRequest {
    pub original_message: String,
    pub count: Option<usize>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn generate(
    State(state): State<Arc<AppState>>,
    AuthBusiness(_business): AuthBusiness,
    Json(body): Json<GenerationRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let result = ai_service(&state)?.generate_campaign(&body).await?;
    Ok(Json(json!({ "campaign": result })))
}

async fn enhance(
    State(state): State<Arc<AppState>>,
    AuthBusiness(business): AuthBusiness,
    Json(body): Json<EnhanceRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let improvements = if body.improvements.is_empty() {
        vec![
            "engagement".to_string(),
            "clarity".to_string(),
            "personalization".to_string(),
        ]
    } else {
        body.improvements
    };

    let request = EnhancementRequest {
        original_message: body.message,
        campaign_type: body.campaign_type,
        improvements,
        business_name: business.name,
        target_audience: body.target_audience,
    };

    let result = ai_service(&state)?.enhance_campaign(&request).await?;
    Ok(Json(json!({ "campaign": result })))
}

async fn variations(
    State(state): State<Arc<AppState>>,
    AuthBusiness(_business): AuthBusiness,
    Json(body): Json<VariationsRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let variations = ai_service(&state)?
        .campaign_variations(&body.original_message, body.count.unwrap_or(3))
        .await?;
    Ok(Json(json!({ "variations": variations })))
}
