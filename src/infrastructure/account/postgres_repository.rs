//! PostgreSQL account repository implementation

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::account::{
    Account, AccountFilter, AccountPatch, AccountRepository, AccountSort, AccountStatus, Address,
};
use crate::domain::DomainError;

const ACCOUNT_COLUMNS: &str = "id, name, email, phone, address, balance, status, created_by, \
                               is_deleted, created_at, updated_at";

/// PostgreSQL implementation of AccountRepository
#[derive(Debug, Clone)]
pub struct PostgresAccountRepository {
    pool: PgPool,
}

impl PostgresAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Ensures the accounts table exists
    pub async fn ensure_table(&self) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                phone TEXT NOT NULL,
                address JSONB,
                balance BIGINT NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'ACTIVE',
                created_by UUID NOT NULL,
                is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create accounts table: {e}")))?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS accounts_email_live \
             ON accounts (email) WHERE NOT is_deleted",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create email index: {e}")))?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS accounts_phone_live \
             ON accounts (phone) WHERE NOT is_deleted",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create phone index: {e}")))?;

        Ok(())
    }
}

fn sort_column(sort: AccountSort) -> &'static str {
    match sort {
        AccountSort::CreatedAt => "created_at",
        AccountSort::Name => "name",
        AccountSort::Email => "email",
        AccountSort::Balance => "balance",
    }
}

#[async_trait]
impl AccountRepository for PostgresAccountRepository {
    async fn insert(&self, account: &Account) -> Result<Account, DomainError> {
        let address = account
            .address
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| DomainError::storage(format!("Failed to serialize address: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO accounts (id, name, email, phone, address, balance, status,
                                  created_by, is_deleted, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(account.id)
        .bind(&account.name)
        .bind(&account.email)
        .bind(&account.phone)
        .bind(address)
        .bind(account.balance)
        .bind(account.status.as_str())
        .bind(account.created_by)
        .bind(account.is_deleted)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let msg = e.to_string();
            if msg.contains("accounts_email_live") {
                DomainError::conflict("Email already exists")
            } else if msg.contains("accounts_phone_live") {
                DomainError::conflict("Phone number already exists")
            } else {
                DomainError::storage(format!("Failed to insert account: {e}"))
            }
        })?;

        Ok(account.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get account: {e}")))?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1 AND NOT is_deleted"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get account by email: {e}")))?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn find_by_phone(
        &self,
        phone: &str,
        exclude: Option<Uuid>,
    ) -> Result<Option<Account>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts \
             WHERE phone = $1 AND NOT is_deleted AND ($2::uuid IS NULL OR id <> $2)"
        ))
        .bind(phone)
        .bind(exclude)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get account by phone: {e}")))?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn find(
        &self,
        filter: &AccountFilter,
        sort: AccountSort,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Account>, DomainError> {
        let query = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts \
             WHERE NOT is_deleted AND ($1::text IS NULL OR status = $1) \
             ORDER BY {} ASC \
             OFFSET $2 LIMIT $3",
            sort_column(sort)
        );

        let rows = sqlx::query(&query)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(offset)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to list accounts: {e}")))?;

        rows.iter().map(row_to_account).collect()
    }

    async fn count(&self, filter: &AccountFilter) -> Result<u64, DomainError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM accounts \
             WHERE NOT is_deleted AND ($1::text IS NULL OR status = $1)",
        )
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to count accounts: {e}")))?;

        Ok(count as u64)
    }

    async fn update(
        &self,
        id: Uuid,
        patch: &AccountPatch,
    ) -> Result<Option<Account>, DomainError> {
        let address = patch
            .address
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| DomainError::storage(format!("Failed to serialize address: {e}")))?;

        let row = sqlx::query(&format!(
            "UPDATE accounts SET \
                 name = COALESCE($2, name), \
                 phone = COALESCE($3, phone), \
                 address = COALESCE($4, address), \
                 status = COALESCE($5, status), \
                 balance = COALESCE($6, balance), \
                 updated_at = NOW() \
             WHERE id = $1 AND NOT is_deleted \
             RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.phone)
        .bind(address)
        .bind(patch.status.map(|s| s.as_str()))
        .bind(patch.balance)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            let msg = e.to_string();
            if msg.contains("accounts_phone_live") {
                DomainError::conflict("Phone number already exists")
            } else {
                DomainError::storage(format!("Failed to update account: {e}"))
            }
        })?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn soft_delete(&self, id: Uuid) -> Result<Option<Account>, DomainError> {
        let row = sqlx::query(&format!(
            "UPDATE accounts SET is_deleted = TRUE, updated_at = NOW() \
             WHERE id = $1 AND NOT is_deleted \
             RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to delete account: {e}")))?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn adjust_balance(
        &self,
        id: Uuid,
        delta: i64,
    ) -> Result<Option<Account>, DomainError> {
        let row = sqlx::query(&format!(
            "UPDATE accounts SET balance = balance + $2, updated_at = NOW() \
             WHERE id = $1 AND NOT is_deleted \
             RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(id)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to adjust balance: {e}")))?;

        row.as_ref().map(row_to_account).transpose()
    }
}

fn row_to_account(row: &sqlx::postgres::PgRow) -> Result<Account, DomainError> {
    let status: String = row.get("status");
    let address: Option<serde_json::Value> = row.get("address");

    let address: Option<Address> = address
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| DomainError::storage(format!("Invalid address in database: {e}")))?;

    Ok(Account {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        phone: row.get("phone"),
        address,
        balance: row.get("balance"),
        status: AccountStatus::parse(&status)
            .ok_or_else(|| DomainError::storage(format!("Invalid status in database: {status}")))?,
        created_by: row.get("created_by"),
        is_deleted: row.get("is_deleted"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_column_mapping() {
        assert_eq!(sort_column(AccountSort::CreatedAt), "created_at");
        assert_eq!(sort_column(AccountSort::Name), "name");
        assert_eq!(sort_column(AccountSort::Email), "email");
        assert_eq!(sort_column(AccountSort::Balance), "balance");
    }
}
