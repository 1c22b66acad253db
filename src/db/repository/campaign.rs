use chrono::{NaiveDateTime, Utc};
use sqlx::Row;
use sqlx::SqlitePool;

use crate::db::models::Campaign;
use crate::error::{AppError, AppResult};

// ============================================================================
// Campaign Repository
// ============================================================================

const CAMPAIGN_COLUMNS: &str = r#"
    id, business_id, name, campaign_type, subject, message,
    status, scheduled_at, sent_at, target_audience, created_at, updated_at
"#;

pub struct CreateCampaign {
    pub business_id: i64,
    pub name: String,
    pub campaign_type: String,
    pub subject: Option<String>,
    pub message: String,
    pub status: String,
    pub target_audience: Vec<String>,
}

/// Partial update; `None` fields keep their stored value.
#[derive(Default)]
pub struct UpdateCampaign {
    pub name: Option<String>,
    pub campaign_type: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
    pub status: Option<String>,
}

pub struct CampaignRepository;

impl CampaignRepository {
    fn map_row(r: sqlx::sqlite::SqliteRow) -> Campaign {
        let audience_json: String = r.get("target_audience");
        Campaign {
            id: r.get("id"),
            business_id: r.get("business_id"),
            name: r.get("name"),
            campaign_type: r.get("campaign_type"),
            subject: r.get("subject"),
            message: r.get("message"),
            status: r.get("status"),
            scheduled_at: r.get("scheduled_at"),
            sent_at: r.get("sent_at"),
            target_audience: serde_json::from_str(&audience_json).unwrap_or_default(),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }
    }

    /// Tenant-scoped lookup: cross-tenant ids resolve to `None` so callers
    /// answer 404 without revealing whether the campaign exists elsewhere.
    pub async fn find_by_id_for_business(
        pool: &SqlitePool,
        id: i64,
        business_id: i64,
    ) -> AppResult<Option<Campaign>> {
        let row = sqlx::query(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ? AND business_id = ?"
        ))
        .bind(id)
        .bind(business_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(Self::map_row))
    }

    pub async fn find_by_business(pool: &SqlitePool, business_id: i64) -> AppResult<Vec<Campaign>> {
        let rows = sqlx::query(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE business_id = ? ORDER BY created_at DESC"
        ))
        .bind(business_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows.into_iter().map(Self::map_row).collect())
    }

    pub async fn create(pool: &SqlitePool, campaign: CreateCampaign) -> AppResult<Campaign> {
        let now = Utc::now().naive_utc();
        let audience_json =
            serde_json::to_string(&campaign.target_audience).unwrap_or_else(|_| "[]".to_string());

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO campaigns (
                business_id, name, campaign_type, subject, message,
                status, scheduled_at, sent_at, target_audience, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, NULL, NULL, ?, ?, ?)
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        ))
        .bind(campaign.business_id)
        .bind(&campaign.name)
        .bind(&campaign.campaign_type)
        .bind(&campaign.subject)
        .bind(&campaign.message)
        .bind(&campaign.status)
        .bind(&audience_json)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(Self::map_row(row))
    }

    pub async fn update(
        pool: &SqlitePool,
        id: i64,
        updates: UpdateCampaign,
    ) -> AppResult<Campaign> {
        let now = Utc::now().naive_utc();

        let row = sqlx::query(&format!(
            r#"
            UPDATE campaigns
            SET
                name = COALESCE(?, name),
                campaign_type = COALESCE(?, campaign_type),
                subject = COALESCE(?, subject),
                message = COALESCE(?, message),
                status = COALESCE(?, status),
                updated_at = ?
            WHERE id = ?
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        ))
        .bind(&updates.name)
        .bind(&updates.campaign_type)
        .bind(&updates.subject)
        .bind(&updates.message)
        .bind(&updates.status)
        .bind(now)
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(Self::map_row(row))
    }

    /// Terminal transition of a send attempt. Set unconditionally after the
    /// fan-out loop, even when every individual delivery failed.
    pub async fn mark_sent(
        pool: &SqlitePool,
        id: i64,
        sent_at: NaiveDateTime,
    ) -> AppResult<Campaign> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE campaigns
            SET status = 'sent', sent_at = ?, updated_at = ?
            WHERE id = ?
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        ))
        .bind(sent_at)
        .bind(sent_at)
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(Self::map_row(row))
    }

    pub async fn delete(pool: &SqlitePool, id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM campaigns WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }
}
