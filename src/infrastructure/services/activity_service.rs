//! Activity service - audit trail with cache-aside history

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::activity::{Activity, ActivityKind, ActivityRepository};
use crate::domain::cache::scope_pattern;
use crate::domain::{DomainError, ListQuery, Page};
use crate::infrastructure::cache::{CacheService, Cached, VIEW_TTL};

const HISTORY_NS: &str = "account_activities";

/// Request to log an activity against an account
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogActivityRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub metadata: Option<Value>,
}

/// Activity service over an injected repository and cache
#[derive(Clone)]
pub struct ActivityService {
    repository: Arc<dyn ActivityRepository>,
    cache: CacheService,
}

impl ActivityService {
    pub fn new(repository: Arc<dyn ActivityRepository>, cache: CacheService) -> Self {
        Self { repository, cache }
    }

    fn history_key(&self, account_id: Uuid, query: &ListQuery) -> String {
        self.cache.build_key(
            HISTORY_NS,
            &[account_id.into(), query.page.into(), query.limit.into()],
        )
    }

    /// Logs an activity and drops the account's cached history views
    pub async fn log(
        &self,
        requester: Uuid,
        account_id: Uuid,
        request: LogActivityRequest,
    ) -> Result<Activity, DomainError> {
        let kind = ActivityKind::parse(&request.kind).ok_or_else(|| {
            DomainError::validation(format!(
                "Invalid type. Allowed: {}",
                ActivityKind::ALLOWED.join(", ")
            ))
        })?;

        if request.message.trim().is_empty() {
            return Err(DomainError::validation("Type and message are required"));
        }

        let activity = Activity::new(account_id, kind, request.message, request.metadata, requester);
        let activity = self.repository.insert(&activity).await?;

        self.cache
            .delete_matching(&scope_pattern(HISTORY_NS, account_id))
            .await;

        Ok(activity)
    }

    /// Paginated activity history, cache-aside, newest first
    pub async fn history(
        &self,
        account_id: Uuid,
        query: &ListQuery,
    ) -> Result<Cached<Page<Activity>>, DomainError> {
        query.validate()?;

        let key = self.history_key(account_id, query);
        if let Some(page) = self.cache.get::<Page<Activity>>(&key).await {
            return Ok(Cached::hit(page));
        }

        let items = self
            .repository
            .find_by_account(account_id, query.offset(), i64::from(query.limit))
            .await?;
        let total = self.repository.count_by_account(account_id).await?;

        let page = Page::new(items, total, query);
        self.cache.set(&key, &page, Some(VIEW_TTL)).await;

        Ok(Cached::miss(page))
    }

    /// Activity history across several accounts; uncached
    pub async fn bulk_history(
        &self,
        account_ids: &[Uuid],
        query: &ListQuery,
    ) -> Result<Page<Activity>, DomainError> {
        if account_ids.is_empty() {
            return Err(DomainError::validation(
                "Provide accountIds as a non-empty array",
            ));
        }
        query.validate()?;

        let items = self
            .repository
            .find_by_accounts(account_ids, query.offset(), i64::from(query.limit))
            .await?;
        let total = self.repository.count_by_accounts(account_ids).await?;

        Ok(Page::new(items, total, query))
    }
}
