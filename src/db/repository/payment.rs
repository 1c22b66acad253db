use chrono::Utc;
use sqlx::Row;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{
    CreatePaymentTransaction, KlarnaOrder, PaymentTransaction, SwishPayment,
};
use crate::error::{AppError, AppResult};

// ============================================================================
// Payment Transaction Repository
// ============================================================================

const TRANSACTION_COLUMNS: &str = r#"
    id, business_id, amount, currency, status, payment_method,
    provider_transaction_id, description, created_at, updated_at
"#;

pub struct PaymentTransactionRepository;

impl PaymentTransactionRepository {
    fn map_row(r: sqlx::sqlite::SqliteRow) -> PaymentTransaction {
        PaymentTransaction {
            id: r.get("id"),
            business_id: r.get("business_id"),
            amount: r.get("amount"),
            currency: r.get("currency"),
            status: r.get("status"),
            payment_method: r.get("payment_method"),
            provider_transaction_id: r.get("provider_transaction_id"),
            description: r.get("description"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }
    }

    pub async fn create(
        pool: &SqlitePool,
        transaction: CreatePaymentTransaction,
    ) -> AppResult<PaymentTransaction> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO payment_transactions (
                id, business_id, amount, currency, status, payment_method,
                provider_transaction_id, description, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(&id)
        .bind(transaction.business_id)
        .bind(transaction.amount)
        .bind(&transaction.currency)
        .bind(&transaction.status)
        .bind(&transaction.payment_method)
        .bind(&transaction.provider_transaction_id)
        .bind(&transaction.description)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(Self::map_row(row))
    }

    /// Lookup by the provider's native identifier, used by webhook handlers.
    pub async fn find_by_provider_id(
        pool: &SqlitePool,
        provider_transaction_id: &str,
    ) -> AppResult<Option<PaymentTransaction>> {
        let row = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM payment_transactions WHERE provider_transaction_id = ?"
        ))
        .bind(provider_transaction_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(Self::map_row))
    }

    pub async fn update_status(
        pool: &SqlitePool,
        id: &str,
        status: &str,
        provider_transaction_id: Option<&str>,
    ) -> AppResult<PaymentTransaction> {
        let now = Utc::now().naive_utc();

        let row = sqlx::query(&format!(
            r#"
            UPDATE payment_transactions
            SET
                status = ?,
                provider_transaction_id = COALESCE(?, provider_transaction_id),
                updated_at = ?
            WHERE id = ?
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(status)
        .bind(provider_transaction_id)
        .bind(now)
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(Self::map_row(row))
    }
}

// ============================================================================
// Provider-specific sub-records
// ============================================================================

pub struct KlarnaOrderRepository;

impl KlarnaOrderRepository {
    pub async fn create(
        pool: &SqlitePool,
        transaction_id: &str,
        session_id: &str,
        client_token: Option<&str>,
        raw_response: Option<&str>,
    ) -> AppResult<KlarnaOrder> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let row = sqlx::query(
            r#"
            INSERT INTO klarna_orders (id, transaction_id, session_id, client_token, raw_response, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, transaction_id, session_id, client_token, raw_response, created_at
            "#,
        )
        .bind(&id)
        .bind(transaction_id)
        .bind(session_id)
        .bind(client_token)
        .bind(raw_response)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(KlarnaOrder {
            id: row.get("id"),
            transaction_id: row.get("transaction_id"),
            session_id: row.get("session_id"),
            client_token: row.get("client_token"),
            raw_response: row.get("raw_response"),
            created_at: row.get("created_at"),
        })
    }
}

pub struct SwishPaymentRepository;

impl SwishPaymentRepository {
    pub async fn create(
        pool: &SqlitePool,
        transaction_id: &str,
        swish_payment_id: &str,
        payment_reference: &str,
        qr_code: Option<&str>,
        raw_response: Option<&str>,
    ) -> AppResult<SwishPayment> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let row = sqlx::query(
            r#"
            INSERT INTO swish_payments (
                id, transaction_id, swish_payment_id, payment_reference, qr_code, raw_response, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, transaction_id, swish_payment_id, payment_reference, qr_code, raw_response, created_at
            "#,
        )
        .bind(&id)
        .bind(transaction_id)
        .bind(swish_payment_id)
        .bind(payment_reference)
        .bind(qr_code)
        .bind(raw_response)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(SwishPayment {
            id: row.get("id"),
            transaction_id: row.get("transaction_id"),
            swish_payment_id: row.get("swish_payment_id"),
            payment_reference: row.get("payment_reference"),
            qr_code: row.get("qr_code"),
            raw_response: row.get("raw_response"),
            created_at: row.get("created_at"),
        })
    }
}
