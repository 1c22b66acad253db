use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Business {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    /// bcrypt hash, never serialized into API responses
    #[serde(skip_serializing)]
    pub password: String,
    /// Optional SMS sender override; the gateway caps sender names at 11 chars
    pub sms_from_name: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
