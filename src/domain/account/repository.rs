//! Account repository contract (source of truth)

use async_trait::async_trait;
use uuid::Uuid;

use super::entity::{Account, AccountPatch, AccountStatus};
use crate::domain::DomainError;

/// Filter applied to account listings; soft-deleted rows are always excluded
#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    pub status: Option<AccountStatus>,
}

/// Sort order for account listings, already validated against the whitelist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountSort {
    CreatedAt,
    Name,
    Email,
    Balance,
}

impl AccountSort {
    pub const ALLOWED: [&'static str; 4] = ["createdAt", "name", "email", "balance"];

    pub fn parse(s: &str) -> Self {
        match s {
            "name" => Self::Name,
            "email" => Self::Email,
            "balance" => Self::Balance,
            _ => Self::CreatedAt,
        }
    }
}

/// Authoritative store for accounts
///
/// The cache layer never substitutes for these operations; anything
/// transactionally significant reads through here.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn insert(&self, account: &Account) -> Result<Account, DomainError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, DomainError>;

    /// Non-deleted account with the given email, if any
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, DomainError>;

    /// Non-deleted account with the given phone, optionally excluding one id
    async fn find_by_phone(
        &self,
        phone: &str,
        exclude: Option<Uuid>,
    ) -> Result<Option<Account>, DomainError>;

    async fn find(
        &self,
        filter: &AccountFilter,
        sort: AccountSort,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Account>, DomainError>;

    async fn count(&self, filter: &AccountFilter) -> Result<u64, DomainError>;

    /// Applies the patch to a non-deleted account; `None` when absent
    async fn update(
        &self,
        id: Uuid,
        patch: &AccountPatch,
    ) -> Result<Option<Account>, DomainError>;

    /// Marks a non-deleted account deleted; `None` when absent
    async fn soft_delete(&self, id: Uuid) -> Result<Option<Account>, DomainError>;

    /// Atomically adds `delta` (negative to debit) to a non-deleted
    /// account's balance; `None` when absent
    async fn adjust_balance(&self, id: Uuid, delta: i64)
        -> Result<Option<Account>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_parse_falls_back_to_created_at() {
        assert_eq!(AccountSort::parse("name"), AccountSort::Name);
        assert_eq!(AccountSort::parse("balance"), AccountSort::Balance);
        assert_eq!(AccountSort::parse("bogus"), AccountSort::CreatedAt);
    }
}
