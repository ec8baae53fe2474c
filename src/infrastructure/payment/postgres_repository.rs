//! PostgreSQL payment repository implementation

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::payment::{Payment, PaymentMethod, PaymentRepository, PaymentStatus};
use crate::domain::DomainError;

const PAYMENT_COLUMNS: &str = "id, account_id, amount, method, status, transaction_id, \
                               paid_at, created_by, created_at, updated_at";

/// PostgreSQL implementation of PaymentRepository
#[derive(Debug, Clone)]
pub struct PostgresPaymentRepository {
    pool: PgPool,
}

impl PostgresPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Ensures the payments table exists
    pub async fn ensure_table(&self) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS payments (
                id UUID PRIMARY KEY,
                account_id UUID NOT NULL,
                amount BIGINT NOT NULL,
                method TEXT NOT NULL,
                status TEXT NOT NULL,
                transaction_id TEXT UNIQUE,
                paid_at TIMESTAMPTZ NOT NULL,
                created_by UUID NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create payments table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS payments_account_paid_at \
             ON payments (account_id, paid_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create payments index: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl PaymentRepository for PostgresPaymentRepository {
    async fn insert(&self, payment: &Payment) -> Result<Payment, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, account_id, amount, method, status, transaction_id,
                                  paid_at, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(payment.id)
        .bind(payment.account_id)
        .bind(payment.amount)
        .bind(payment.method.as_str())
        .bind(payment.status.as_str())
        .bind(&payment.transaction_id)
        .bind(payment.paid_at)
        .bind(payment.created_by)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let msg = e.to_string();
            if msg.contains("transaction_id") {
                DomainError::conflict("Duplicate transaction ID")
            } else {
                DomainError::storage(format!("Failed to insert payment: {e}"))
            }
        })?;

        Ok(payment.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get payment: {e}")))?;

        row.as_ref().map(row_to_payment).transpose()
    }

    async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Payment>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE transaction_id = $1"
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get payment by transaction: {e}")))?;

        row.as_ref().map(row_to_payment).transpose()
    }

    async fn find_by_account(
        &self,
        account_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Payment>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE account_id = $1 \
             ORDER BY paid_at DESC \
             OFFSET $2 LIMIT $3"
        ))
        .bind(account_id)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to list payments: {e}")))?;

        rows.iter().map(row_to_payment).collect()
    }

    async fn count_by_account(&self, account_id: Uuid) -> Result<u64, DomainError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE account_id = $1")
                .bind(account_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| DomainError::storage(format!("Failed to count payments: {e}")))?;

        Ok(count as u64)
    }

    async fn find_by_accounts(
        &self,
        account_ids: &[Uuid],
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Payment>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE account_id = ANY($1) \
             ORDER BY paid_at DESC \
             OFFSET $2 LIMIT $3"
        ))
        .bind(account_ids)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to list bulk payments: {e}")))?;

        rows.iter().map(row_to_payment).collect()
    }

    async fn count_by_accounts(&self, account_ids: &[Uuid]) -> Result<u64, DomainError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE account_id = ANY($1)")
                .bind(account_ids)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    DomainError::storage(format!("Failed to count bulk payments: {e}"))
                })?;

        Ok(count as u64)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<Option<Payment>, DomainError> {
        let row = sqlx::query(&format!(
            "UPDATE payments SET status = $2, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to update payment status: {e}")))?;

        row.as_ref().map(row_to_payment).transpose()
    }
}

fn row_to_payment(row: &sqlx::postgres::PgRow) -> Result<Payment, DomainError> {
    let method: String = row.get("method");
    let status: String = row.get("status");

    Ok(Payment {
        id: row.get("id"),
        account_id: row.get("account_id"),
        amount: row.get("amount"),
        method: PaymentMethod::parse(&method)
            .ok_or_else(|| DomainError::storage(format!("Invalid method in database: {method}")))?,
        status: PaymentStatus::parse(&status)
            .ok_or_else(|| DomainError::storage(format!("Invalid status in database: {status}")))?,
        transaction_id: row.get("transaction_id"),
        paid_at: row.get("paid_at"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
