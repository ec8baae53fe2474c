//! Account service - CRUD with cache-aside reads and write invalidation
//!
//! Reads follow cache-aside: check the cache, fall back to the repository,
//! repopulate. Mutations write to the repository first, then refresh or drop
//! the canonical record key and pattern-delete the owner's entire list-view
//! space: the cache cannot know which page/sort/filter combinations contain
//! the changed account, so the whole scope is invalidated and views are
//! recomputed lazily on the next read.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::domain::account::{
    Account, AccountFilter, AccountPatch, AccountRepository, AccountSort, AccountStatus, Address,
};
use crate::domain::cache::scope_pattern;
use crate::domain::{DomainError, ListQuery, Page};
use crate::infrastructure::cache::{CacheService, Cached, RECORD_TTL, VIEW_TTL};

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{8,15}$").unwrap());

const RECORD_NS: &str = "account";
const LIST_NS: &str = "user_accounts";

/// Request to create a new account
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(regex(path = *PHONE_RE, message = "Invalid phone number format"))]
    pub phone: String,
    pub address: Option<Address>,
    #[serde(default)]
    pub balance: i64,
}

/// Account service over an injected repository and cache
#[derive(Clone)]
pub struct AccountService {
    repository: Arc<dyn AccountRepository>,
    cache: CacheService,
}

impl AccountService {
    pub fn new(repository: Arc<dyn AccountRepository>, cache: CacheService) -> Self {
        Self { repository, cache }
    }

    fn record_key(&self, id: Uuid, owner: Uuid) -> String {
        self.cache.build_key(RECORD_NS, &[id.into(), owner.into()])
    }

    fn list_key(&self, owner: Uuid, query: &ListQuery, sort: &str) -> String {
        self.cache.build_key(
            LIST_NS,
            &[
                owner.into(),
                query.page.into(),
                query.limit.into(),
                query.status_token().into(),
                sort.into(),
            ],
        )
    }

    fn list_pattern(&self, owner: Uuid) -> String {
        scope_pattern(LIST_NS, owner)
    }

    /// Creates an account, then invalidates the owner's list views and
    /// populates the canonical record key
    pub async fn create(
        &self,
        owner: Uuid,
        request: CreateAccountRequest,
    ) -> Result<Account, DomainError> {
        request
            .validate()
            .map_err(|e| DomainError::validation(e.to_string()))?;

        if self.repository.find_by_email(&request.email).await?.is_some() {
            return Err(DomainError::conflict("Email already exists"));
        }
        if self
            .repository
            .find_by_phone(&request.phone, None)
            .await?
            .is_some()
        {
            return Err(DomainError::conflict("Phone number already exists"));
        }

        let account = Account::new(
            request.name,
            request.email,
            request.phone,
            request.address,
            request.balance,
            owner,
        );
        let account = self.repository.insert(&account).await?;

        // Invalidation only after the source-of-truth write has committed
        self.cache.delete_matching(&self.list_pattern(owner)).await;
        self.cache
            .set(&self.record_key(account.id, owner), &account, Some(RECORD_TTL))
            .await;

        Ok(account)
    }

    /// Paginated listing, cache-aside with the shorter view TTL
    pub async fn list(
        &self,
        owner: Uuid,
        query: &ListQuery,
    ) -> Result<Cached<Page<Account>>, DomainError> {
        query.validate()?;

        let filter = AccountFilter {
            status: query
                .status
                .as_deref()
                .map(|s| {
                    AccountStatus::parse(s)
                        .ok_or_else(|| DomainError::validation(format!("Invalid status '{s}'")))
                })
                .transpose()?,
        };
        let sort = query.sort_field(&AccountSort::ALLOWED);

        let key = self.list_key(owner, query, sort);
        if let Some(page) = self.cache.get::<Page<Account>>(&key).await {
            return Ok(Cached::hit(page));
        }

        let items = self
            .repository
            .find(
                &filter,
                AccountSort::parse(sort),
                query.offset(),
                i64::from(query.limit),
            )
            .await?;
        let total = self.repository.count(&filter).await?;

        let page = Page::new(items, total, query);
        self.cache.set(&key, &page, Some(VIEW_TTL)).await;

        Ok(Cached::miss(page))
    }

    /// Single-record lookup, cache-aside with the longer record TTL
    pub async fn get(&self, owner: Uuid, id: Uuid) -> Result<Cached<Account>, DomainError> {
        let key = self.record_key(id, owner);
        if let Some(account) = self.cache.get::<Account>(&key).await {
            return Ok(Cached::hit(account));
        }

        let account = self
            .repository
            .find_by_id(id)
            .await?
            .filter(|a| !a.is_deleted)
            .ok_or_else(|| DomainError::not_found("Account not found"))?;

        self.cache.set(&key, &account, Some(RECORD_TTL)).await;

        Ok(Cached::miss(account))
    }

    /// Applies a patch, refreshes the record key and drops the list views
    pub async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: AccountPatch,
    ) -> Result<Account, DomainError> {
        if let Some(phone) = &patch.phone {
            if !PHONE_RE.is_match(phone) {
                return Err(DomainError::validation("Invalid phone number format"));
            }
            if self
                .repository
                .find_by_phone(phone, Some(id))
                .await?
                .is_some()
            {
                return Err(DomainError::conflict("Phone number already exists"));
            }
        }

        let account = self
            .repository
            .update(id, &patch)
            .await?
            .ok_or_else(|| DomainError::not_found("Account not found"))?;

        self.cache
            .set(&self.record_key(id, owner), &account, Some(RECORD_TTL))
            .await;
        self.cache.delete_matching(&self.list_pattern(owner)).await;

        Ok(account)
    }

    /// Soft-deletes, then drops the record key and the list views
    pub async fn delete(&self, owner: Uuid, id: Uuid) -> Result<(), DomainError> {
        self.repository
            .soft_delete(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Account not found"))?;

        self.cache.delete(&self.record_key(id, owner)).await;
        self.cache.delete_matching(&self.list_pattern(owner)).await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::MockAccountRepository;
    use crate::domain::cache::MockStore;

    fn owner() -> Uuid {
        Uuid::new_v4()
    }

    fn sample_account(owner: Uuid) -> Account {
        Account::new("Acme", "info@acme.test", "12345678", None, 1000, owner)
    }

    fn create_request() -> CreateAccountRequest {
        CreateAccountRequest {
            name: "Acme".to_string(),
            email: "info@acme.test".to_string(),
            phone: "12345678".to_string(),
            address: None,
            balance: 1000,
        }
    }

    fn service_with(
        repository: MockAccountRepository,
        store: Arc<MockStore>,
    ) -> AccountService {
        AccountService::new(Arc::new(repository), CacheService::new(store))
    }

    #[tokio::test]
    async fn test_list_miss_then_hit_queries_repository_once() {
        let owner = owner();
        let account = sample_account(owner);

        let mut repository = MockAccountRepository::new();
        let found = account.clone();
        repository
            .expect_find()
            .times(1)
            .returning(move |_, _, _, _| Ok(vec![found.clone()]));
        repository.expect_count().times(1).returning(|_| Ok(1));

        let store = Arc::new(MockStore::new());
        let service = service_with(repository, store);

        let query = ListQuery::default();
        let first = service.list(owner, &query).await.unwrap();
        assert!(!first.from_cache);
        assert_eq!(first.value.total, 1);

        // Second call must be served from the cache: the mock would panic on
        // a second repository query
        let second = service.list(owner, &query).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.value, first.value);
    }

    #[tokio::test]
    async fn test_get_miss_then_hit() {
        let owner = owner();
        let account = sample_account(owner);
        let id = account.id;

        let mut repository = MockAccountRepository::new();
        let found = account.clone();
        repository
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(found.clone())));

        let store = Arc::new(MockStore::new());
        let service = service_with(repository, store);

        let first = service.get(owner, id).await.unwrap();
        assert!(!first.from_cache);

        let second = service.get(owner, id).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.value, account);
    }

    #[tokio::test]
    async fn test_get_soft_deleted_is_not_found() {
        let owner = owner();
        let mut deleted = sample_account(owner);
        deleted.is_deleted = true;

        let mut repository = MockAccountRepository::new();
        let found = deleted.clone();
        repository
            .expect_find_by_id()
            .returning(move |_| Ok(Some(found.clone())));

        let service = service_with(repository, Arc::new(MockStore::new()));

        let result = service.get(owner, deleted.id).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_create_invalidates_every_cached_list_view() {
        let owner = owner();

        let mut repository = MockAccountRepository::new();
        repository.expect_find_by_email().returning(|_| Ok(None));
        repository.expect_find_by_phone().returning(|_, _| Ok(None));
        repository
            .expect_insert()
            .returning(|account| Ok(account.clone()));

        let store = Arc::new(MockStore::new());
        let cache = CacheService::new(store.clone());

        // Pre-cache several distinct view shapes under the owner's scope
        for key in [
            format!("user_accounts:{owner}:1:10:all:createdAt"),
            format!("user_accounts:{owner}:2:10:ACTIVE:name"),
            format!("user_accounts:{owner}:1:50:all:balance"),
        ] {
            cache.set(&key, &serde_json::json!({"total": 0}), None).await;
        }

        let service = AccountService::new(Arc::new(repository), cache);
        let account = service.create(owner, create_request()).await.unwrap();

        assert!(!store.contains(&format!("user_accounts:{owner}:1:10:all:createdAt")));
        assert!(!store.contains(&format!("user_accounts:{owner}:2:10:ACTIVE:name")));
        assert!(!store.contains(&format!("user_accounts:{owner}:1:50:all:balance")));

        // The canonical record key was populated
        assert!(store.contains(&format!("account:{}:{owner}", account.id)));
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_email() {
        let owner = owner();
        let existing = sample_account(owner);

        let mut repository = MockAccountRepository::new();
        repository
            .expect_find_by_email()
            .returning(move |_| Ok(Some(existing.clone())));

        let service = service_with(repository, Arc::new(MockStore::new()));

        let result = service.create(owner, create_request()).await;
        assert!(matches!(result, Err(DomainError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_email_and_phone() {
        let owner = owner();
        let service = service_with(MockAccountRepository::new(), Arc::new(MockStore::new()));

        let mut request = create_request();
        request.email = "not-an-email".to_string();
        assert!(matches!(
            service.create(owner, request).await,
            Err(DomainError::Validation { .. })
        ));

        let mut request = create_request();
        request.phone = "123".to_string();
        assert!(matches!(
            service.create(owner, request).await,
            Err(DomainError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_refreshes_record_and_drops_views() {
        let owner = owner();
        let account = sample_account(owner);
        let id = account.id;

        let mut repository = MockAccountRepository::new();
        let mut updated = account.clone();
        updated.name = "Acme Renamed".to_string();
        repository
            .expect_update()
            .returning(move |_, _| Ok(Some(updated.clone())));

        let store = Arc::new(MockStore::new());
        let cache = CacheService::new(store.clone());
        cache
            .set(
                &format!("user_accounts:{owner}:1:10:all:createdAt"),
                &serde_json::json!({"total": 1}),
                None,
            )
            .await;

        let service = AccountService::new(Arc::new(repository), cache.clone());
        let result = service.update(owner, id, AccountPatch::default()).await.unwrap();
        assert_eq!(result.name, "Acme Renamed");

        assert!(!store.contains(&format!("user_accounts:{owner}:1:10:all:createdAt")));

        let cached: Option<Account> = cache.get(&format!("account:{id}:{owner}")).await;
        assert_eq!(cached.map(|a| a.name), Some("Acme Renamed".to_string()));
    }

    #[tokio::test]
    async fn test_delete_drops_record_and_views() {
        let owner = owner();
        let account = sample_account(owner);
        let id = account.id;

        let mut repository = MockAccountRepository::new();
        let deleted = account.clone();
        repository
            .expect_soft_delete()
            .returning(move |_| Ok(Some(deleted.clone())));

        let store = Arc::new(MockStore::new());
        let cache = CacheService::new(store.clone());
        cache.set(&format!("account:{id}:{owner}"), &account, None).await;
        cache
            .set(
                &format!("user_accounts:{owner}:1:10:all:createdAt"),
                &serde_json::json!({"total": 1}),
                None,
            )
            .await;

        let service = AccountService::new(Arc::new(repository), cache);
        service.delete(owner, id).await.unwrap();

        assert!(!store.contains(&format!("account:{id}:{owner}")));
        assert!(!store.contains(&format!("user_accounts:{owner}:1:10:all:createdAt")));
    }

    #[tokio::test]
    async fn test_reads_and_writes_survive_a_dead_cache() {
        let owner = owner();
        let account = sample_account(owner);

        let mut repository = MockAccountRepository::new();
        let found = account.clone();
        repository
            .expect_find()
            .times(2)
            .returning(move |_, _, _, _| Ok(vec![found.clone()]));
        repository.expect_count().times(2).returning(|_| Ok(1));
        repository.expect_find_by_email().returning(|_| Ok(None));
        repository.expect_find_by_phone().returning(|_, _| Ok(None));
        repository
            .expect_insert()
            .returning(|account| Ok(account.clone()));

        let store = Arc::new(MockStore::new().with_error("connection refused"));
        let service = service_with(repository, store);

        // Every read falls through to the repository, never from cache
        let query = ListQuery::default();
        let first = service.list(owner, &query).await.unwrap();
        assert!(!first.from_cache);
        let second = service.list(owner, &query).await.unwrap();
        assert!(!second.from_cache);

        // Writes still complete
        service.create(owner, create_request()).await.unwrap();
    }
}
