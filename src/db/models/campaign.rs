use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Campaign statuses `scheduled` and `completed` are part of the declared
/// vocabulary but the delivery engine only ever moves `draft` to `sent`.
pub const STATUS_DRAFT: &str = "draft";

/// Channel types accepted on campaigns. `whatsapp` is declared but has no
/// deliverable path.
pub const CHANNEL_SMS: &str = "sms";
pub const CHANNEL_EMAIL: &str = "email";
pub const CHANNEL_WHATSAPP: &str = "whatsapp";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: i64,
    pub business_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub campaign_type: String,
    pub subject: Option<String>,
    /// May contain {{name}}, {{email}}, {{phone}} placeholders
    pub message: String,
    pub status: String,
    pub scheduled_at: Option<NaiveDateTime>,
    pub sent_at: Option<NaiveDateTime>,
    /// Customer tags to target; declared, unused by delivery
    pub target_audience: Vec<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

pub fn is_known_channel(channel: &str) -> bool {
    matches!(channel, CHANNEL_SMS | CHANNEL_EMAIL | CHANNEL_WHATSAPP)
}
