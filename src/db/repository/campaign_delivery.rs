use chrono::Utc;
use sqlx::Row;
use sqlx::SqlitePool;

use crate::db::models::{CampaignDelivery, CreateCampaignDelivery};
use crate::error::{AppError, AppResult};

// ============================================================================
// Campaign Delivery Repository
// ============================================================================

const DELIVERY_COLUMNS: &str = r#"
    id, campaign_id, customer_id, status,
    sent_at, delivered_at, opened_at, clicked_at, error_message
"#;

pub struct CampaignDeliveryRepository;

impl CampaignDeliveryRepository {
    fn map_row(r: sqlx::sqlite::SqliteRow) -> CampaignDelivery {
        CampaignDelivery {
            id: r.get("id"),
            campaign_id: r.get("campaign_id"),
            customer_id: r.get("customer_id"),
            status: r.get("status"),
            sent_at: r.get("sent_at"),
            delivered_at: r.get("delivered_at"),
            opened_at: r.get("opened_at"),
            clicked_at: r.get("clicked_at"),
            error_message: r.get("error_message"),
        }
    }

    pub async fn create(
        pool: &SqlitePool,
        delivery: CreateCampaignDelivery,
    ) -> AppResult<CampaignDelivery> {
        let now = Utc::now().naive_utc();

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO campaign_deliveries (
                campaign_id, customer_id, status, sent_at, error_message
            )
            VALUES (?, ?, ?, ?, ?)
            RETURNING {DELIVERY_COLUMNS}
            "#
        ))
        .bind(delivery.campaign_id)
        .bind(delivery.customer_id)
        .bind(&delivery.status)
        .bind(now)
        .bind(&delivery.error_message)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(Self::map_row(row))
    }

    pub async fn find_by_campaign(
        pool: &SqlitePool,
        campaign_id: i64,
    ) -> AppResult<Vec<CampaignDelivery>> {
        let rows = sqlx::query(&format!(
            "SELECT {DELIVERY_COLUMNS} FROM campaign_deliveries WHERE campaign_id = ?"
        ))
        .bind(campaign_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows.into_iter().map(Self::map_row).collect())
    }

    /// Webhook-driven status upgrade (delivered / opened / clicked). Stamps
    /// the matching timestamp column alongside the new status. Scoped by
    /// campaign id so a delivery of another campaign reads as absent.
    pub async fn upgrade_status(
        pool: &SqlitePool,
        id: i64,
        campaign_id: i64,
        status: &str,
    ) -> AppResult<Option<CampaignDelivery>> {
        let now = Utc::now().naive_utc();
        let timestamp_column = match status {
            "delivered" => "delivered_at",
            "opened" => "opened_at",
            "clicked" => "clicked_at",
            other => {
                return Err(AppError::BadRequest(format!(
                    "Unknown delivery status upgrade: {other}"
                )))
            }
        };

        let row = sqlx::query(&format!(
            r#"
            UPDATE campaign_deliveries
            SET status = ?, {timestamp_column} = ?
            WHERE id = ? AND campaign_id = ?
            RETURNING {DELIVERY_COLUMNS}
            "#
        ))
        .bind(status)
        .bind(now)
        .bind(id)
        .bind(campaign_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(Self::map_row))
    }
}
