//! Payment service - ledger operations with write invalidation
//!
//! Recording a payment mutates two things: the payment history and the
//! account balance. Both cached projections are invalidated after the
//! source-of-truth writes commit; the balance check itself always re-reads
//! the repository because a cached account copy is never authoritative.

use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use crate::domain::account::AccountRepository;
use crate::domain::cache::scope_pattern;
use crate::domain::payment::{Payment, PaymentMethod, PaymentRepository, PaymentStatus};
use crate::domain::{DomainError, ListQuery, Page};
use crate::infrastructure::cache::{CacheService, Cached, RECORD_TTL, VIEW_TTL};

const HISTORY_NS: &str = "account_payments";
const ACCOUNT_NS: &str = "account";
const ACCOUNT_LIST_NS: &str = "user_accounts";

/// Request to record a payment against an account
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentRequest {
    pub amount: i64,
    pub method: Option<PaymentMethod>,
    pub transaction_id: Option<String>,
}

/// Payment service over the payment and account repositories
#[derive(Clone)]
pub struct PaymentService {
    payments: Arc<dyn PaymentRepository>,
    accounts: Arc<dyn AccountRepository>,
    cache: CacheService,
}

impl PaymentService {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        accounts: Arc<dyn AccountRepository>,
        cache: CacheService,
    ) -> Self {
        Self {
            payments,
            accounts,
            cache,
        }
    }

    fn history_key(&self, account_id: Uuid, query: &ListQuery) -> String {
        self.cache.build_key(
            HISTORY_NS,
            &[account_id.into(), query.page.into(), query.limit.into()],
        )
    }

    fn history_pattern(&self, account_id: Uuid) -> String {
        scope_pattern(HISTORY_NS, account_id)
    }

    /// Records a completed payment and debits the account balance
    pub async fn record(
        &self,
        requester: Uuid,
        account_id: Uuid,
        request: RecordPaymentRequest,
    ) -> Result<Payment, DomainError> {
        if request.amount <= 0 {
            return Err(DomainError::validation(
                "Amount must be greater than 0",
            ));
        }

        // Balance check against the source of truth, never the cache
        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .filter(|a| !a.is_deleted)
            .ok_or_else(|| DomainError::not_found("Account not found"))?;

        if account.balance < request.amount {
            return Err(DomainError::validation("Insufficient account balance"));
        }

        if let Some(transaction_id) = &request.transaction_id {
            if self
                .payments
                .find_by_transaction_id(transaction_id)
                .await?
                .is_some()
            {
                return Err(DomainError::conflict("Duplicate transaction ID"));
            }
        }

        let payment = Payment::new(
            account_id,
            request.amount,
            request.method.unwrap_or(PaymentMethod::Cash),
            request.transaction_id,
            requester,
        );
        let payment = self.payments.insert(&payment).await?;

        let account = self
            .accounts
            .adjust_balance(account_id, -request.amount)
            .await?
            .ok_or_else(|| DomainError::not_found("Account not found"))?;

        // The balance changed: refresh the requester's record copy and drop
        // the stale projections
        self.cache
            .delete_matching(&self.history_pattern(account_id))
            .await;
        let record_key = self
            .cache
            .build_key(ACCOUNT_NS, &[account_id.into(), requester.into()]);
        self.cache.set(&record_key, &account, Some(RECORD_TTL)).await;
        self.cache
            .delete_matching(&scope_pattern(ACCOUNT_LIST_NS, requester))
            .await;

        Ok(payment)
    }

    /// Paginated payment history, cache-aside, newest first
    pub async fn history(
        &self,
        account_id: Uuid,
        query: &ListQuery,
    ) -> Result<Cached<Page<Payment>>, DomainError> {
        query.validate()?;

        let key = self.history_key(account_id, query);
        if let Some(page) = self.cache.get::<Page<Payment>>(&key).await {
            return Ok(Cached::hit(page));
        }

        let items = self
            .payments
            .find_by_account(account_id, query.offset(), i64::from(query.limit))
            .await?;
        let total = self.payments.count_by_account(account_id).await?;

        let page = Page::new(items, total, query);
        self.cache.set(&key, &page, Some(VIEW_TTL)).await;

        Ok(Cached::miss(page))
    }

    /// Payment history across several accounts; uncached
    pub async fn bulk_history(
        &self,
        account_ids: &[Uuid],
        query: &ListQuery,
    ) -> Result<Page<Payment>, DomainError> {
        if account_ids.is_empty() {
            return Err(DomainError::validation(
                "Provide accountIds as a non-empty array",
            ));
        }
        query.validate()?;

        let items = self
            .payments
            .find_by_accounts(account_ids, query.offset(), i64::from(query.limit))
            .await?;
        let total = self.payments.count_by_accounts(account_ids).await?;

        Ok(Page::new(items, total, query))
    }

    /// Transitions a payment's status and drops the account's history views
    pub async fn update_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<Payment, DomainError> {
        let payment = self
            .payments
            .update_status(id, status)
            .await?
            .ok_or_else(|| DomainError::not_found("Payment not found"))?;

        self.cache
            .delete_matching(&self.history_pattern(payment.account_id))
            .await;

        Ok(payment)
    }
}
