//! PostgreSQL activity repository implementation

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::activity::{Activity, ActivityKind, ActivityRepository};
use crate::domain::DomainError;

const ACTIVITY_COLUMNS: &str = "id, account_id, kind, message, metadata, created_by, created_at";

/// PostgreSQL implementation of ActivityRepository
#[derive(Debug, Clone)]
pub struct PostgresActivityRepository {
    pool: PgPool,
}

impl PostgresActivityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Ensures the activities table exists
    pub async fn ensure_table(&self) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS activities (
                id UUID PRIMARY KEY,
                account_id UUID NOT NULL,
                kind TEXT NOT NULL,
                message TEXT NOT NULL,
                metadata JSONB,
                created_by UUID NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create activities table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS activities_account_created_at \
             ON activities (account_id, created_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create activities index: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl ActivityRepository for PostgresActivityRepository {
    async fn insert(&self, activity: &Activity) -> Result<Activity, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO activities (id, account_id, kind, message, metadata, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(activity.id)
        .bind(activity.account_id)
        .bind(activity.kind.as_str())
        .bind(&activity.message)
        .bind(&activity.metadata)
        .bind(activity.created_by)
        .bind(activity.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to insert activity: {e}")))?;

        Ok(activity.clone())
    }

    async fn find_by_account(
        &self,
        account_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Activity>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities \
             WHERE account_id = $1 \
             ORDER BY created_at DESC \
             OFFSET $2 LIMIT $3"
        ))
        .bind(account_id)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to list activities: {e}")))?;

        rows.iter().map(row_to_activity).collect()
    }

    async fn count_by_account(&self, account_id: Uuid) -> Result<u64, DomainError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM activities WHERE account_id = $1")
                .bind(account_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| DomainError::storage(format!("Failed to count activities: {e}")))?;

        Ok(count as u64)
    }

    async fn find_by_accounts(
        &self,
        account_ids: &[Uuid],
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Activity>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities \
             WHERE account_id = ANY($1) \
             ORDER BY created_at DESC \
             OFFSET $2 LIMIT $3"
        ))
        .bind(account_ids)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to list bulk activities: {e}")))?;

        rows.iter().map(row_to_activity).collect()
    }

    async fn count_by_accounts(&self, account_ids: &[Uuid]) -> Result<u64, DomainError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM activities WHERE account_id = ANY($1)")
                .bind(account_ids)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    DomainError::storage(format!("Failed to count bulk activities: {e}"))
                })?;

        Ok(count as u64)
    }
}

fn row_to_activity(row: &sqlx::postgres::PgRow) -> Result<Activity, DomainError> {
    let kind: String = row.get("kind");

    Ok(Activity {
        id: row.get("id"),
        account_id: row.get("account_id"),
        kind: ActivityKind::parse(&kind)
            .ok_or_else(|| DomainError::storage(format!("Invalid kind in database: {kind}")))?,
        message: row.get("message"),
        metadata: row.get("metadata"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
    })
}
