use chrono::{NaiveDateTime, Utc};
use sqlx::Row;
use sqlx::SqlitePool;

use crate::db::models::Customer;
use crate::error::{AppError, AppResult};

// ============================================================================
// Customer Repository
// ============================================================================

const CUSTOMER_COLUMNS: &str = r#"
    id, business_id, name, email, phone,
    consent_given, consent_date, source, status,
    last_contact, tags, created_at, updated_at
"#;

pub struct CreateCustomer {
    pub business_id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub consent_given: bool,
    pub consent_date: Option<NaiveDateTime>,
    pub source: Option<String>,
    pub tags: Vec<String>,
}

/// Partial update; `None` fields keep their stored value.
#[derive(Default)]
pub struct UpdateCustomer {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub consent_given: Option<bool>,
    pub status: Option<String>,
    pub tags: Option<Vec<String>>,
}

pub struct CustomerRepository;

impl CustomerRepository {
    fn map_row(r: sqlx::sqlite::SqliteRow) -> Customer {
        let tags_json: String = r.get("tags");
        Customer {
            id: r.get("id"),
            business_id: r.get("business_id"),
            name: r.get("name"),
            email: r.get("email"),
            phone: r.get("phone"),
            consent_given: r.get("consent_given"),
            consent_date: r.get("consent_date"),
            source: r.get("source"),
            status: r.get("status"),
            last_contact: r.get("last_contact"),
            tags: serde_json::from_str(&tags_json).unwrap_or_default(),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> AppResult<Option<Customer>> {
        let row = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(Self::map_row))
    }

    /// Tenant-scoped lookup: returns the customer only when it belongs to the
    /// given business. Cross-tenant ids resolve to `None`, never an error.
    pub async fn find_by_id_for_business(
        pool: &SqlitePool,
        id: i64,
        business_id: i64,
    ) -> AppResult<Option<Customer>> {
        let row = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ? AND business_id = ?"
        ))
        .bind(id)
        .bind(business_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(Self::map_row))
    }

    pub async fn find_by_business(pool: &SqlitePool, business_id: i64) -> AppResult<Vec<Customer>> {
        let rows = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE business_id = ? ORDER BY created_at DESC"
        ))
        .bind(business_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows.into_iter().map(Self::map_row).collect())
    }

    pub async fn create(pool: &SqlitePool, customer: CreateCustomer) -> AppResult<Customer> {
        let now = Utc::now().naive_utc();
        let tags_json =
            serde_json::to_string(&customer.tags).unwrap_or_else(|_| "[]".to_string());

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO customers (
                business_id, name, email, phone,
                consent_given, consent_date, source, status,
                last_contact, tags, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, 'active', NULL, ?, ?, ?)
            RETURNING {CUSTOMER_COLUMNS}
            "#
        ))
        .bind(customer.business_id)
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(customer.consent_given)
        .bind(customer.consent_date)
        .bind(&customer.source)
        .bind(&tags_json)
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
        updates: UpdateCustomer,
    ) -> AppResult<Customer> {
        let now = Utc::now().naive_utc();
        let tags_json = updates
            .tags
            .map(|t| serde_json::to_string(&t).unwrap_or_else(|_| "[]".to_string()));

        let row = sqlx::query(&format!(
            r#"
            UPDATE customers
            SET
                name = COALESCE(?, name),
                email = COALESCE(?, email),
                phone = COALESCE(?, phone),
                consent_given = COALESCE(?, consent_given),
                status = COALESCE(?, status),
                tags = COALESCE(?, tags),
                updated_at = ?
            WHERE id = ?
            RETURNING {CUSTOMER_COLUMNS}
            "#
        ))
        .bind(&updates.name)
        .bind(&updates.email)
        .bind(&updates.phone)
        .bind(updates.consent_given)
        .bind(&updates.status)
        .bind(&tags_json)
        .bind(now)
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(Self::map_row(row))
    }

    /// Record a contact attempt; called by the delivery engine after each
    /// successful send.
    pub async fn touch_last_contact(
        pool: &SqlitePool,
        id: i64,
        at: NaiveDateTime,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE customers
            SET last_contact = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(at)
        .bind(at)
        .bind(id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }

    pub async fn delete(pool: &SqlitePool, id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM customers WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }
}
