//! In-memory backing store implementation using moka

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache as MokaCache;

use crate::domain::cache::{CacheError, CacheStore, KeyTtl};

/// Configuration for the in-memory store
#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// Maximum number of entries before eviction
    pub max_capacity: u64,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
        }
    }
}

impl MemoryStoreConfig {
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }
}

/// Entry held by moka; expiry is tracked manually so `ttl` can report the
/// remaining duration and counters can live without one
#[derive(Debug, Clone)]
struct Entry {
    data: String,
    /// Millis since epoch; `None` means no expiry
    expires_at: Option<u64>,
}

/// Thread-safe in-memory store
///
/// The second concrete backend: used for cache-less deployments and as the
/// fake in service tests. Pattern deletion translates the `*` wildcard to a
/// regex over the full key.
#[derive(Debug)]
pub struct MemoryStore {
    cache: MokaCache<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_config(MemoryStoreConfig::default())
    }

    pub fn with_config(config: MemoryStoreConfig) -> Self {
        Self {
            cache: MokaCache::builder()
                .max_capacity(config.max_capacity)
                .build(),
        }
    }

    fn now_millis() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    fn is_expired(entry: &Entry) -> bool {
        entry
            .expires_at
            .map(|at| Self::now_millis() > at)
            .unwrap_or(false)
    }

    /// Returns the live entry for a key, removing it when expired
    async fn live_entry(&self, key: &str) -> Option<Entry> {
        match self.cache.get(key).await {
            Some(entry) if Self::is_expired(&entry) => {
                self.cache.remove(key).await;
                None
            }
            other => other,
        }
    }

    fn pattern_regex(pattern: &str) -> Result<regex::Regex, CacheError> {
        let escaped = regex::escape(pattern).replace("\\*", ".*");
        regex::Regex::new(&format!("^{escaped}$"))
            .map_err(|e| CacheError::backend(format!("invalid pattern: {e}")))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.live_entry(key).await.map(|e| e.data))
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry {
            data: value.to_string(),
            expires_at: Some(Self::now_millis() + ttl.as_millis() as u64),
        };
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<u64, CacheError> {
        let existed = self.live_entry(key).await.is_some();
        self.cache.remove(key).await;
        Ok(u64::from(existed))
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheError> {
        let regex = Self::pattern_regex(pattern)?;

        self.cache.run_pending_tasks().await;

        let matching: Vec<String> = self
            .cache
            .iter()
            .filter_map(|(k, _)| {
                let key: &str = k.as_ref();
                regex.is_match(key).then(|| key.to_string())
            })
            .collect();

        let mut removed = 0;
        for key in matching {
            if self.live_entry(&key).await.is_some() {
                removed += 1;
            }
            self.cache.remove(&key).await;
        }

        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.live_entry(key).await.is_some())
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, CacheError> {
        Ok(match self.live_entry(key).await {
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => KeyTtl::Remaining(Duration::from_millis(
                at.saturating_sub(Self::now_millis()),
            )),
            Some(Entry {
                expires_at: None, ..
            }) => KeyTtl::Persistent,
            None => KeyTtl::Missing,
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        match self.live_entry(key).await {
            Some(entry) => {
                let updated = Entry {
                    data: entry.data,
                    expires_at: Some(Self::now_millis() + ttl.as_millis() as u64),
                };
                self.cache.insert(key.to_string(), updated).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn increment(&self, key: &str, delta: i64) -> Result<i64, CacheError> {
        let current = self.live_entry(key).await;
        let value: i64 = current
            .as_ref()
            .and_then(|e| e.data.parse().ok())
            .unwrap_or(0);
        let new_value = value + delta;

        // A freshly created counter has no expiry until a caller applies one
        let entry = Entry {
            data: new_value.to_string(),
            expires_at: current.and_then(|e| e.expires_at),
        };
        self.cache.insert(key.to_string(), entry).await;

        Ok(new_value)
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.live_entry(key).await.map(|e| e.data));
        }
        Ok(values)
    }

    async fn multi_set(
        &self,
        pairs: &[(String, String)],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let expires_at = Some(Self::now_millis() + ttl.as_millis() as u64);
        for (key, value) in pairs {
            let entry = Entry {
                data: value.clone(),
                expires_at,
            };
            self.cache.insert(key.clone(), entry).await;
        }
        Ok(())
    }
}
