//! Backing store contract for the caching layer

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors internal to the caching layer
///
/// These never cross the `CacheService` boundary: the service contains them,
/// logs them and returns a safe default to its caller.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unreachable: {0}")]
    Connection(String),

    #[error("cache entry could not be decoded: {0}")]
    Decode(String),

    #[error("cache backend error: {0}")]
    Backend(String),
}

impl CacheError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// Remaining lifetime of a key as reported by the backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// Key exists and expires after the contained duration
    Remaining(Duration),
    /// Key exists with no expiry
    Persistent,
    /// Key does not exist
    Missing,
}

impl KeyTtl {
    /// Wire representation: remaining seconds, -1 for no expiry, -2 for absent
    pub fn as_secs(&self) -> i64 {
        match self {
            Self::Remaining(d) => d.as_secs() as i64,
            Self::Persistent => -1,
            Self::Missing => -2,
        }
    }
}

/// Primitive key/value operations offered by a cache backend
///
/// Values are raw JSON strings so the trait stays dyn-compatible; typed
/// encode/decode lives in the `CacheService` facade. Patterns are key
/// templates with a `*` wildcard suffix and are only ever used for deletion.
#[async_trait]
pub trait CacheStore: Send + Sync + Debug {
    /// Cheap readiness check; callers skip operations on a dead handle
    fn is_ready(&self) -> bool {
        true
    }

    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Returns the number of keys removed (0 or 1)
    async fn delete(&self, key: &str) -> Result<u64, CacheError>;

    /// Removes every key matching the pattern; zero matches is success
    async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    async fn ttl(&self, key: &str) -> Result<KeyTtl, CacheError>;

    /// Updates the expiry of an existing key; false when the key is absent
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError>;

    /// Adds `delta` to a numeric value, creating the key at `delta` if absent
    async fn increment(&self, key: &str, delta: i64) -> Result<i64, CacheError>;

    /// Fetches values aligned to the input order; absent keys yield `None`
    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError>;

    /// Batched write; NOT atomic across keys, a partial failure may leave a
    /// subset of the pairs written
    async fn multi_set(&self, pairs: &[(String, String)], ttl: Duration)
        -> Result<(), CacheError>;

    /// Best-effort graceful close; the handle reports not-ready afterwards
    async fn close(&self) {}
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Instant;

    /// In-process fake store for tests
    ///
    /// Supports error injection (`with_error`) and a readiness toggle so the
    /// fail-soft paths of the service layer can be exercised.
    #[derive(Debug, Default)]
    pub struct MockStore {
        entries: Mutex<HashMap<String, (String, Option<Instant>)>>,
        error: Mutex<Option<String>>,
        ready: Mutex<bool>,
    }

    impl MockStore {
        pub fn new() -> Self {
            Self {
                entries: Mutex::new(HashMap::new()),
                error: Mutex::new(None),
                ready: Mutex::new(true),
            }
        }

        pub fn with_error(self, error: impl Into<String>) -> Self {
            *self.error.lock().unwrap() = Some(error.into());
            self
        }

        pub fn not_ready(self) -> Self {
            *self.ready.lock().unwrap() = false;
            self
        }

        pub fn len(&self) -> usize {
            self.prune();
            self.entries.lock().unwrap().len()
        }

        pub fn contains(&self, key: &str) -> bool {
            self.prune();
            self.entries.lock().unwrap().contains_key(key)
        }

        fn prune(&self) {
            let now = Instant::now();
            self.entries
                .lock()
                .unwrap()
                .retain(|_, (_, exp)| exp.map(|e| e > now).unwrap_or(true));
        }

        fn check_error(&self) -> Result<(), CacheError> {
            if let Some(error) = self.error.lock().unwrap().clone() {
                return Err(CacheError::backend(error));
            }
            Ok(())
        }

        fn pattern_regex(pattern: &str) -> Result<regex::Regex, CacheError> {
            let escaped = regex::escape(pattern).replace("\\*", ".*");
            regex::Regex::new(&format!("^{escaped}$"))
                .map_err(|e| CacheError::backend(format!("invalid pattern: {e}")))
        }
    }

    #[async_trait]
    impl CacheStore for MockStore {
        fn is_ready(&self) -> bool {
            *self.ready.lock().unwrap()
        }

        async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
            self.check_error()?;
            self.prune();
            Ok(self
                .entries
                .lock()
                .unwrap()
                .get(key)
                .map(|(v, _)| v.clone()))
        }

        async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
            self.check_error()?;
            self.entries.lock().unwrap().insert(
                key.to_string(),
                (value.to_string(), Some(Instant::now() + ttl)),
            );
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<u64, CacheError> {
            self.check_error()?;
            self.prune();
            Ok(self.entries.lock().unwrap().remove(key).map_or(0, |_| 1))
        }

        async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheError> {
            self.check_error()?;
            self.prune();
            let regex = Self::pattern_regex(pattern)?;
            let mut entries = self.entries.lock().unwrap();
            let before = entries.len();
            entries.retain(|k, _| !regex.is_match(k));
            Ok((before - entries.len()) as u64)
        }

        async fn exists(&self, key: &str) -> Result<bool, CacheError> {
            self.check_error()?;
            self.prune();
            Ok(self.entries.lock().unwrap().contains_key(key))
        }

        async fn ttl(&self, key: &str) -> Result<KeyTtl, CacheError> {
            self.check_error()?;
            self.prune();
            let entries = self.entries.lock().unwrap();
            Ok(match entries.get(key) {
                Some((_, Some(exp))) => {
                    KeyTtl::Remaining(exp.saturating_duration_since(Instant::now()))
                }
                Some((_, None)) => KeyTtl::Persistent,
                None => KeyTtl::Missing,
            })
        }

        async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
            self.check_error()?;
            self.prune();
            let mut entries = self.entries.lock().unwrap();
            match entries.get_mut(key) {
                Some((_, exp)) => {
                    *exp = Some(Instant::now() + ttl);
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn increment(&self, key: &str, delta: i64) -> Result<i64, CacheError> {
            self.check_error()?;
            self.prune();
            let mut entries = self.entries.lock().unwrap();
            let current: i64 = entries
                .get(key)
                .and_then(|(v, _)| v.parse().ok())
                .unwrap_or(0);
            let new_value = current + delta;
            let expiry = entries.get(key).and_then(|(_, exp)| *exp);
            entries.insert(key.to_string(), (new_value.to_string(), expiry));
            Ok(new_value)
        }

        async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError> {
            self.check_error()?;
            self.prune();
            let entries = self.entries.lock().unwrap();
            Ok(keys
                .iter()
                .map(|k| entries.get(k).map(|(v, _)| v.clone()))
                .collect())
        }

        async fn multi_set(
            &self,
            pairs: &[(String, String)],
            ttl: Duration,
        ) -> Result<(), CacheError> {
            self.check_error()?;
            let mut entries = self.entries.lock().unwrap();
            let expiry = Some(Instant::now() + ttl);
            for (key, value) in pairs {
                entries.insert(key.clone(), (value.clone(), expiry));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockStore;
    use super::*;

    #[test]
    fn test_key_ttl_wire_values() {
        assert_eq!(KeyTtl::Remaining(Duration::from_secs(30)).as_secs(), 30);
        assert_eq!(KeyTtl::Persistent.as_secs(), -1);
        assert_eq!(KeyTtl::Missing.as_secs(), -2);
    }

    #[tokio::test]
    async fn test_mock_store_set_get() {
        let store = MockStore::new();
        store
            .set_raw("key1", "\"value1\"", Duration::from_secs(60))
            .await
            .unwrap();

        let result = store.get_raw("key1").await.unwrap();
        assert_eq!(result, Some("\"value1\"".to_string()));
    }

    #[tokio::test]
    async fn test_mock_store_delete_counts() {
        let store = MockStore::new();
        store
            .set_raw("key1", "1", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.delete("key1").await.unwrap(), 1);
        assert_eq!(store.delete("key1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mock_store_delete_matching_scopes() {
        let store = MockStore::new();
        for key in [
            "user_accounts:u1:1:10:all:createdAt",
            "user_accounts:u1:2:10:all:name",
            "user_accounts:u2:1:10:all:createdAt",
        ] {
            store.set_raw(key, "{}", Duration::from_secs(60)).await.unwrap();
        }

        let removed = store.delete_matching("user_accounts:u1:*").await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.contains("user_accounts:u2:1:10:all:createdAt"));
    }

    #[tokio::test]
    async fn test_mock_store_ttl_states() {
        let store = MockStore::new();
        store
            .set_raw("key1", "1", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(matches!(
            store.ttl("key1").await.unwrap(),
            KeyTtl::Remaining(_)
        ));
        assert_eq!(store.ttl("absent").await.unwrap(), KeyTtl::Missing);
    }

    #[tokio::test]
    async fn test_mock_store_increment_preserves_expiry_slot() {
        let store = MockStore::new();
        let value = store.increment("counter", 5).await.unwrap();
        assert_eq!(value, 5);

        let value = store.increment("counter", 3).await.unwrap();
        assert_eq!(value, 8);
    }

    #[tokio::test]
    async fn test_mock_store_multi_get_alignment() {
        let store = MockStore::new();
        store
            .set_raw("a", "1", Duration::from_secs(60))
            .await
            .unwrap();
        store
            .set_raw("c", "3", Duration::from_secs(60))
            .await
            .unwrap();

        let values = store
            .multi_get(&["a".into(), "b".into(), "c".into()])
            .await
            .unwrap();
        assert_eq!(values, vec![Some("1".into()), None, Some("3".into())]);
    }

    #[tokio::test]
    async fn test_mock_store_error_injection() {
        let store = MockStore::new().with_error("boom");
        assert!(store.get_raw("key").await.is_err());
        assert!(store.set_raw("key", "1", Duration::from_secs(1)).await.is_err());
    }
}
