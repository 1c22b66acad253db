use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Per-recipient audit record of a campaign fan-out. Created at send time;
/// afterwards only webhook-driven status upgrades touch it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignDelivery {
    pub id: i64,
    pub campaign_id: i64,
    pub customer_id: i64,
    /// sent, delivered, failed, opened, clicked
    pub status: String,
    pub sent_at: Option<NaiveDateTime>,
    pub delivered_at: Option<NaiveDateTime>,
    pub opened_at: Option<NaiveDateTime>,
    pub clicked_at: Option<NaiveDateTime>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateCampaignDelivery {
    pub campaign_id: i64,
    pub customer_id: i64,
    pub status: String,
    pub error_message: Option<String>,
}
