//! Activity repository contract (source of truth)

use async_trait::async_trait;
use uuid::Uuid;

use super::entity::Activity;
use crate::domain::DomainError;

/// Authoritative store for activities; reads newest-first by `created_at`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActivityRepository: Send + Sync {
    async fn insert(&self, activity: &Activity) -> Result<Activity, DomainError>;

    async fn find_by_account(
        &self,
        account_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Activity>, DomainError>;

    async fn count_by_account(&self, account_id: Uuid) -> Result<u64, DomainError>;

    async fn find_by_accounts(
        &self,
        account_ids: &[Uuid],
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Activity>, DomainError>;

    async fn count_by_accounts(&self, account_ids: &[Uuid]) -> Result<u64, DomainError>;
}
