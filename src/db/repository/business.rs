use chrono::Utc;
use sqlx::Row;
use sqlx::SqlitePool;

use crate::db::models::Business;
use crate::error::{AppError, AppResult};

// ============================================================================
// Business Repository
// ============================================================================

pub struct CreateBusiness {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    /// Already bcrypt-hashed by the caller
    pub password: String,
    pub sms_from_name: Option<String>,
}

pub struct BusinessRepository;

impl BusinessRepository {
    fn map_row(r: sqlx::sqlite::SqliteRow) -> Business {
        Business {
            id: r.get("id"),
            name: r.get("name"),
            email: r.get("email"),
            phone: r.get("phone"),
            password: r.get("password"),
            sms_from_name: r.get("sms_from_name"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> AppResult<Option<Business>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, email, phone, password, sms_from_name, created_at, updated_at
            FROM businesses
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(Self::map_row))
    }

    pub async fn find_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<Business>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, email, phone, password, sms_from_name, created_at, updated_at
            FROM businesses
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(Self::map_row))
    }

    pub async fn create(pool: &SqlitePool, business: CreateBusiness) -> AppResult<Business> {
        let now = Utc::now().naive_utc();

        let row = sqlx::query(
            r#"
            INSERT INTO businesses (name, email, phone, password, sms_from_name, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, name, email, phone, password, sms_from_name, created_at, updated_at
            "#,
        )
        .bind(&business.name)
        .bind(&business.email)
        .bind(&business.phone)
        .bind(&business.password)
        .bind(&business.sms_from_name)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(Self::map_row(row))
    }

    pub async fn update_profile(
        pool: &SqlitePool,
        id: i64,
        name: Option<&str>,
        phone: Option<&str>,
        sms_from_name: Option<&str>,
    ) -> AppResult<Business> {
        let now = Utc::now().naive_utc();

        let row = sqlx::query(
            r#"
            UPDATE businesses
            SET
                name = COALESCE(?, name),
                phone = COALESCE(?, phone),
                sms_from_name = COALESCE(?, sms_from_name),
                updated_at = ?
            WHERE id = ?
            RETURNING id, name, email, phone, password, sms_from_name, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(phone)
        .bind(sms_from_name)
        .bind(now)
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(Self::map_row(row))
    }
}
