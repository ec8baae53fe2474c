//! Fail-soft cache facade
//!
//! Every public operation contains its own failures: a broken backend, a
//! dead connection or an undecodable entry is logged and converted to the
//! safe default (`None` / `false` / `0`). No cache failure ever reaches a
//! request handler; the source of truth remains the only authority.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::cache::{build_key, CacheStore, KeyArg, KeyTtl};

/// Default entry lifetime: one hour
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Lifetime for multi-record derived views (volatile)
pub const VIEW_TTL: Duration = Duration::from_secs(900);

/// Lifetime for single-record lookups
pub const RECORD_TTL: Duration = Duration::from_secs(1800);

/// Value returned by a cache-aside read, annotated with its origin
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub value: T,
    pub from_cache: bool,
}

impl<T> Cached<T> {
    pub fn hit(value: T) -> Self {
        Self {
            value,
            from_cache: true,
        }
    }

    pub fn miss(value: T) -> Self {
        Self {
            value,
            from_cache: false,
        }
    }
}

/// Domain-facing cache service
///
/// Owns serialization (JSON text), key construction and the default expiry
/// policy over an injected backing store. Cheap to clone; the store handle
/// is shared for the process lifetime.
#[derive(Debug, Clone)]
pub struct CacheService {
    store: Arc<dyn CacheStore>,
    default_ttl: Duration,
}

impl CacheService {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            default_ttl: DEFAULT_TTL,
        }
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn is_ready(&self) -> bool {
        self.store.is_ready()
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Deterministic key construction: `namespace:arg1:arg2:…`
    pub fn build_key(&self, namespace: &str, args: &[KeyArg]) -> String {
        build_key(namespace, args)
    }

    /// Fetches and decodes a value; any failure reads as a miss
    pub async fn get<V: DeserializeOwned>(&self, key: &str) -> Option<V> {
        if !self.store.is_ready() {
            debug!(key, "cache skipped, store not ready");
            return None;
        }

        match self.store.get_raw(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    debug!(key, "cache hit");
                    Some(value)
                }
                Err(e) => {
                    // An undecodable entry is a miss, not a failure
                    warn!(key, error = %e, "cache entry failed to decode");
                    None
                }
            },
            Ok(None) => {
                debug!(key, "cache miss");
                None
            }
            Err(e) => {
                warn!(key, error = %e, "cache get failed");
                None
            }
        }
    }

    /// Encodes and writes a value; returns whether the write succeeded
    pub async fn set<V: Serialize>(&self, key: &str, value: &V, ttl: Option<Duration>) -> bool {
        if !self.store.is_ready() {
            debug!(key, "cache skipped, store not ready");
            return false;
        }

        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "cache value failed to encode");
                return false;
            }
        };

        let ttl = ttl.unwrap_or(self.default_ttl);
        match self.store.set_raw(key, &raw, ttl).await {
            Ok(()) => {
                debug!(key, ttl_secs = ttl.as_secs(), "cache set");
                true
            }
            Err(e) => {
                warn!(key, error = %e, "cache set failed");
                false
            }
        }
    }

    pub async fn delete(&self, key: &str) -> bool {
        match self.store.delete(key).await {
            Ok(removed) => {
                debug!(key, removed, "cache delete");
                removed > 0
            }
            Err(e) => {
                warn!(key, error = %e, "cache delete failed");
                false
            }
        }
    }

    /// Removes every key matching the wildcard pattern
    ///
    /// Nothing to do is not a failure: zero matches returns true.
    pub async fn delete_matching(&self, pattern: &str) -> bool {
        match self.store.delete_matching(pattern).await {
            Ok(removed) => {
                debug!(pattern, removed, "cache delete pattern");
                true
            }
            Err(e) => {
                warn!(pattern, error = %e, "cache delete pattern failed");
                false
            }
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        match self.store.exists(key).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(key, error = %e, "cache exists failed");
                false
            }
        }
    }

    pub async fn ttl(&self, key: &str) -> KeyTtl {
        match self.store.ttl(key).await {
            Ok(ttl) => ttl,
            Err(e) => {
                warn!(key, error = %e, "cache ttl failed");
                KeyTtl::Missing
            }
        }
    }

    /// Adds `delta` to a counter and returns the new value
    ///
    /// The TTL is applied only when the post-increment value equals `delta`,
    /// i.e. this call created the key. Re-incrementing an existing counter
    /// must never reset its expiry.
    pub async fn increment(&self, key: &str, delta: i64, ttl: Option<Duration>) -> i64 {
        if !self.store.is_ready() {
            debug!(key, "cache skipped, store not ready");
            return 0;
        }

        let new_value = match self.store.increment(key, delta).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "cache increment failed");
                return 0;
            }
        };

        if new_value == delta {
            let ttl = ttl.unwrap_or(self.default_ttl);
            if let Err(e) = self.store.expire(key, ttl).await {
                warn!(key, error = %e, "cache expire after increment failed");
            }
        }

        new_value
    }

    /// Batched write; not atomic across keys
    pub async fn multi_set<V: Serialize>(
        &self,
        pairs: &[(String, V)],
        ttl: Option<Duration>,
    ) -> bool {
        if !self.store.is_ready() {
            return false;
        }

        let mut encoded = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            match serde_json::to_string(value) {
                Ok(raw) => encoded.push((key.clone(), raw)),
                Err(e) => {
                    warn!(key, error = %e, "cache value failed to encode");
                    return false;
                }
            }
        }

        let ttl = ttl.unwrap_or(self.default_ttl);
        match self.store.multi_set(&encoded, ttl).await {
            Ok(()) => {
                debug!(count = encoded.len(), "cache multi set");
                true
            }
            Err(e) => {
                warn!(error = %e, "cache multi set failed");
                false
            }
        }
    }

    /// Fetches several keys at once
    ///
    /// Absent keys map to `None`. An entry that fails to decode falls back
    /// to the raw string value rather than being dropped.
    pub async fn multi_get(&self, keys: &[String]) -> HashMap<String, Option<Value>> {
        let absent = || keys.iter().map(|k| (k.clone(), None)).collect();

        if !self.store.is_ready() {
            return absent();
        }

        let values = match self.store.multi_get(keys).await {
            Ok(values) => values,
            Err(e) => {
                warn!(error = %e, "cache multi get failed");
                return absent();
            }
        };

        keys.iter()
            .zip(values)
            .map(|(key, raw)| {
                let value = raw.map(|raw| {
                    serde_json::from_str(&raw).unwrap_or_else(|_| Value::String(raw))
                });
                (key.clone(), value)
            })
            .collect()
    }
}
