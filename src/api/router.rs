use std::time::Duration;

use axum::extract::Request;
use axum::middleware::{from_fn, Next};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::health;
use super::middleware::{cache_response, ResponseCacheConfig};
use super::state::AppState;
use super::v1::{accounts, activities, payments};

/// TTL for responses captured by the interception layer on account reads
const ACCOUNT_RESPONSE_TTL: Duration = Duration::from_secs(3600);

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    // Interception layer over the account read endpoints; mutating methods
    // pass through untouched inside the middleware itself
    let account_response_cache = from_fn({
        let cache = state.cache.clone();
        let config = ResponseCacheConfig::new(ACCOUNT_RESPONSE_TTL);
        move |req: Request, next: Next| cache_response(cache.clone(), config.clone(), req, next)
    });

    let account_routes = Router::new()
        .route(
            "/",
            get(accounts::list_accounts).post(accounts::create_account),
        )
        .route(
            "/{id}",
            get(accounts::get_account)
                .put(accounts::update_account)
                .delete(accounts::delete_account),
        )
        .route_layer(account_response_cache);

    let api_routes = Router::new()
        .nest("/accounts", account_routes)
        .route(
            "/accounts/{id}/payments",
            post(payments::record_payment).get(payments::list_payments),
        )
        .route(
            "/accounts/{id}/activities",
            post(activities::log_activity).get(activities::list_activities),
        )
        .route("/payments/bulk", post(payments::bulk_payments))
        .route("/payments/{id}", put(payments::update_payment_status))
        .route("/activities/bulk", post(activities::bulk_activities));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .nest("/api", api_routes)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
