//! Application state for shared services

use sqlx::PgPool;

use crate::infrastructure::cache::CacheService;
use crate::infrastructure::services::{AccountService, ActivityService, PaymentService};

/// Shared state injected into every handler
///
/// Built once by the composition root; everything inside is cheap to clone
/// (Arc-backed services, a pooled database handle, the cache facade).
#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountService,
    pub payments: PaymentService,
    pub activities: ActivityService,
    pub cache: CacheService,
    pub db: PgPool,
}

impl AppState {
    pub fn new(
        accounts: AccountService,
        payments: PaymentService,
        activities: ActivityService,
        cache: CacheService,
        db: PgPool,
    ) -> Self {
        Self {
            accounts,
            payments,
            activities,
            cache,
            db,
        }
    }
}
