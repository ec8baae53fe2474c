//! Payment repository contract (source of truth)

use async_trait::async_trait;
use uuid::Uuid;

use super::entity::{Payment, PaymentStatus};
use crate::domain::DomainError;

/// Authoritative store for payments; history reads newest-first by `paid_at`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn insert(&self, payment: &Payment) -> Result<Payment, DomainError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>, DomainError>;

    async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Payment>, DomainError>;

    async fn find_by_account(
        &self,
        account_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Payment>, DomainError>;

    async fn count_by_account(&self, account_id: Uuid) -> Result<u64, DomainError>;

    async fn find_by_accounts(
        &self,
        account_ids: &[Uuid],
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Payment>, DomainError>;

    async fn count_by_accounts(&self, account_ids: &[Uuid]) -> Result<u64, DomainError>;

    /// Transitions a payment's status; `None` when absent
    async fn update_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<Option<Payment>, DomainError>;
}
