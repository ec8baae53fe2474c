//! Response-caching interception layer
//!
//! Applies only to idempotent GET requests. A hit short-circuits the
//! downstream handler entirely and replays the cached payload with a
//! `fromCache` marker; a miss lets the handler run, then captures the
//! outgoing body and - when it is a success envelope with a non-empty
//! `data` field - populates the cache in a spawned task that never blocks
//! or alters the response. Any cache trouble degrades to pass-through.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    extract::{OriginalUri, Request},
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::warn;

use crate::api::middleware::auth::requester_id;
use crate::domain::cache::{build_key, canonical_json};
use crate::infrastructure::cache::CacheService;

const NAMESPACE: &str = "api_cache";
const ANONYMOUS: &str = "anonymous";

/// Per-route configuration for the interception layer
#[derive(Clone)]
pub struct ResponseCacheConfig {
    /// Lifetime of captured responses
    pub ttl: Duration,
    /// Optional custom key derivation, replacing the default
    /// path + canonical query + requester scheme
    pub key_fn: Option<Arc<dyn Fn(&Request) -> String + Send + Sync>>,
}

impl ResponseCacheConfig {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, key_fn: None }
    }

    pub fn with_key_fn(
        mut self,
        key_fn: impl Fn(&Request) -> String + Send + Sync + 'static,
    ) -> Self {
        self.key_fn = Some(Arc::new(key_fn));
        self
    }
}

impl fmt::Debug for ResponseCacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCacheConfig")
            .field("ttl", &self.ttl)
            .field("key_fn", &self.key_fn.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Middleware entry point; wire up with `axum::middleware::from_fn`
pub async fn cache_response(
    cache: CacheService,
    config: ResponseCacheConfig,
    req: Request,
    next: Next,
) -> Response {
    // Non-idempotent requests bypass this layer entirely
    if req.method() != Method::GET {
        return next.run(req).await;
    }

    let key = match &config.key_fn {
        Some(key_fn) => key_fn(&req),
        None => default_key(&req),
    };

    if let Some(data) = cache.get::<Value>(&key).await {
        let body = json!({
            "success": true,
            "data": data,
            "fromCache": true,
        });
        return (StatusCode::OK, Json(body)).into_response();
    }

    let response = next.run(req).await;
    let (parts, body) = response.into_parts();

    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "failed to buffer response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if parts.status == StatusCode::OK {
        if let Some(data) = cacheable_payload(&bytes) {
            let cache = cache.clone();
            let key = key.clone();
            let ttl = config.ttl;
            // Population happens off the request path; a failed write is
            // logged by the cache service and never retried here
            tokio::spawn(async move {
                cache.set(&key, &data, Some(ttl)).await;
            });
        }
    }

    Response::from_parts(parts, Body::from(bytes))
}

/// Default key: namespace + path + canonical query + requester identity
fn default_key(req: &Request) -> String {
    let uri = req
        .extensions()
        .get::<OriginalUri>()
        .map(|original| original.0.clone())
        .unwrap_or_else(|| req.uri().clone());

    let query: BTreeMap<&str, &str> = uri
        .query()
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .collect();

    let requester = requester_id(req.headers())
        .map(|id| id.to_string())
        .unwrap_or_else(|| ANONYMOUS.to_string());

    build_key(
        NAMESPACE,
        &[
            uri.path().into(),
            canonical_json(&query).into(),
            requester.into(),
        ],
    )
}

/// Extracts the `data` payload when the body is a success envelope worth
/// caching; `None` for non-success envelopes and empty payloads
fn cacheable_payload(bytes: &[u8]) -> Option<Value> {
    let envelope: Value = serde_json::from_slice(bytes).ok()?;

    if !envelope.get("success").and_then(Value::as_bool).unwrap_or(false) {
        return None;
    }

    let data = envelope.get("data")?.clone();
    let empty = match &data {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    };

    (!empty).then_some(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::middleware::auth::USER_ID_HEADER;
    use crate::domain::cache::MockStore;
    use axum::http::HeaderMap;
    use axum::middleware::from_fn;
    use axum::routing::get;
    use axum::Router;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::util::ServiceExt;
    use uuid::Uuid;

    fn request(path: &str, user: Option<Uuid>) -> Request {
        let mut builder = axum::http::Request::builder().method(Method::GET).uri(path);
        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user.to_string());
        }
        builder.body(Body::empty()).unwrap()
    }

    fn router(
        cache: CacheService,
        config: ResponseCacheConfig,
        calls: Arc<AtomicUsize>,
        payload: Value,
    ) -> Router {
        let handler = move || {
            let calls = calls.clone();
            let payload = payload.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Json(payload)
            }
        };

        Router::new().route("/records", get(handler)).route_layer(from_fn(
            move |req: Request, next: Next| {
                cache_response(cache.clone(), config.clone(), req, next)
            },
        ))
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_miss_runs_handler_and_populates_cache() {
        let store = Arc::new(MockStore::new());
        let cache = CacheService::new(store.clone());
        let calls = Arc::new(AtomicUsize::new(0));

        let app = router(
            cache,
            ResponseCacheConfig::new(Duration::from_secs(60)),
            calls.clone(),
            json!({"success": true, "data": {"total": 1}}),
        );

        let response = app.oneshot(request("/records", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["data"]["total"], json!(1));
        // Fresh response is forwarded unaltered, without the marker
        assert!(body.get("fromCache").is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Population is spawned; give it a beat
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.contains("api_cache:/records:{}:anonymous"));
    }

    #[tokio::test]
    async fn test_hit_replays_without_invoking_handler() {
        let store = Arc::new(MockStore::new());
        let cache = CacheService::new(store.clone());
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .set(
                "api_cache:/records:{}:anonymous",
                &json!({"total": 7}),
                None,
            )
            .await;

        let app = router(
            cache,
            ResponseCacheConfig::new(Duration::from_secs(60)),
            calls.clone(),
            json!({"success": true, "data": {"total": 1}}),
        );

        let response = app.oneshot(request("/records", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["fromCache"], json!(true));
        assert_eq!(body["data"]["total"], json!(7));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_success_envelope_is_never_cached() {
        let store = Arc::new(MockStore::new());
        let cache = CacheService::new(store.clone());
        let calls = Arc::new(AtomicUsize::new(0));

        let app = router(
            cache,
            ResponseCacheConfig::new(Duration::from_secs(60)),
            calls,
            json!({"success": false, "message": "nope"}),
        );

        app.oneshot(request("/records", None)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_empty_payload_is_never_cached() {
        let store = Arc::new(MockStore::new());
        let cache = CacheService::new(store.clone());
        let calls = Arc::new(AtomicUsize::new(0));

        let app = router(
            cache,
            ResponseCacheConfig::new(Duration::from_secs(60)),
            calls,
            json!({"success": true, "data": null}),
        );

        app.oneshot(request("/records", None)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_post_bypasses_the_layer() {
        let store = Arc::new(MockStore::new());
        let cache = CacheService::new(store.clone());

        let app = Router::new()
            .route(
                "/records",
                axum::routing::post(|| async {
                    Json(json!({"success": true, "data": {"id": 1}}))
                }),
            )
            .route_layer(from_fn({
                let config = ResponseCacheConfig::new(Duration::from_secs(60));
                move |req: Request, next: Next| {
                    cache_response(cache.clone(), config.clone(), req, next)
                }
            }));

        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/records")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_broken_store_degrades_to_pass_through() {
        let cache = CacheService::new(Arc::new(MockStore::new().with_error("down")));
        let calls = Arc::new(AtomicUsize::new(0));

        let app = router(
            cache,
            ResponseCacheConfig::new(Duration::from_secs(60)),
            calls.clone(),
            json!({"success": true, "data": {"total": 1}}),
        );

        let response = app.oneshot(request("/records", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["data"]["total"], json!(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_custom_key_fn_overrides_default() {
        let store = Arc::new(MockStore::new());
        let cache = CacheService::new(store.clone());
        let calls = Arc::new(AtomicUsize::new(0));

        let config = ResponseCacheConfig::new(Duration::from_secs(60))
            .with_key_fn(|_req| "custom:key".to_string());

        let app = router(
            cache,
            config,
            calls,
            json!({"success": true, "data": [1, 2, 3]}),
        );

        app.oneshot(request("/records", None)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(store.contains("custom:key"));
    }

    #[test]
    fn test_default_key_distinguishes_query_shape_and_identity() {
        let user = Uuid::new_v4();

        let with_query = default_key(&request("/records?page=2&limit=10", Some(user)));
        let reordered = default_key(&request("/records?limit=10&page=2", Some(user)));
        let first_page = default_key(&request("/records?page=1&limit=10", Some(user)));
        let anonymous = default_key(&request("/records?page=2&limit=10", None));

        // Equal logical queries derive equal keys regardless of parameter order
        assert_eq!(with_query, reordered);
        // Distinct shapes and identities never collide
        assert_ne!(with_query, first_page);
        assert_ne!(with_query, anonymous);
        assert!(anonymous.ends_with(":anonymous"));
    }

    #[test]
    fn test_cacheable_payload_rules() {
        let success = json!({"success": true, "data": {"a": 1}}).to_string();
        assert!(cacheable_payload(success.as_bytes()).is_some());

        let failure = json!({"success": false, "data": {"a": 1}}).to_string();
        assert!(cacheable_payload(failure.as_bytes()).is_none());

        let empty = json!({"success": true, "data": {}}).to_string();
        assert!(cacheable_payload(empty.as_bytes()).is_none());

        assert!(cacheable_payload(b"not json").is_none());
    }

    #[test]
    fn test_requester_header_requires_valid_uuid() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, "woof".parse().unwrap());
        assert_eq!(requester_id(&headers), None);
    }
}
