//! Redis backing store implementation

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client, RedisError};
use tracing::{info, warn};

use crate::domain::cache::{CacheError, CacheStore, KeyTtl};

/// Configuration for the Redis store
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// Connection timeout per attempt
    pub connect_timeout: Duration,
    /// Base delay of the exponential reconnect backoff
    pub backoff_base: Duration,
    /// Cap applied to any single backoff delay
    pub backoff_cap: Duration,
    /// Initial connection attempts before giving up
    pub max_connect_attempts: u32,
    /// Total retry window for the initial connection
    pub connect_window: Duration,
    /// Reconnect attempts per broken connection at runtime
    pub max_reconnect_attempts: usize,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            connect_timeout: Duration::from_secs(5),
            backoff_base: Duration::from_millis(100),
            backoff_cap: Duration::from_secs(3),
            max_connect_attempts: 10,
            connect_window: Duration::from_secs(60),
            max_reconnect_attempts: 10,
        }
    }
}

impl RedisStoreConfig {
    /// Creates a new configuration with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the per-attempt connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the backoff bounds (base delay and per-attempt cap)
    pub fn with_backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_cap = cap;
        self
    }

    /// Sets the number of initial connection attempts
    pub fn with_max_connect_attempts(mut self, attempts: u32) -> Self {
        self.max_connect_attempts = attempts;
        self
    }

    /// Delay before the given 1-based attempt, exponential with a cap
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.backoff_base.saturating_mul(1u32 << exp);
        delay.min(self.backoff_cap)
    }
}

/// Redis store over a shared multiplexed connection
///
/// One `ConnectionManager` is established at construction and shared for the
/// process lifetime. Runtime reconnects are handled by the manager with the
/// configured backoff bounds; the readiness flag tracks operation outcomes so
/// callers can skip a known-dead handle.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    ready: Arc<AtomicBool>,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("ready", &self.ready.load(Ordering::Relaxed))
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisStore {
    /// Connects to Redis, retrying with bounded exponential backoff
    ///
    /// Fails with `CacheError::Connection` once the attempt count or the
    /// total retry window is exhausted.
    pub async fn connect(config: RedisStoreConfig) -> Result<Self, CacheError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| CacheError::connection(format!("invalid Redis URL: {e}")))?;

        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(config.connect_timeout)
            .set_factor(config.backoff_base.as_millis() as u64)
            .set_exponent_base(2)
            .set_max_delay(config.backoff_cap.as_millis() as u64)
            .set_number_of_retries(config.max_reconnect_attempts);

        let deadline = tokio::time::Instant::now() + config.connect_window;
        let mut attempt = 0u32;

        let mut connection = loop {
            attempt += 1;

            match ConnectionManager::new_with_config(client.clone(), manager_config.clone()).await
            {
                Ok(connection) => break connection,
                Err(e) if attempt < config.max_connect_attempts => {
                    let delay = config.backoff_delay(attempt);
                    if tokio::time::Instant::now() + delay >= deadline {
                        return Err(CacheError::connection(format!(
                            "Redis connection retry window exhausted after {attempt} attempts: {e}"
                        )));
                    }
                    warn!(attempt, error = %e, "Redis connection failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(CacheError::connection(format!(
                        "failed to connect to Redis after {attempt} attempts: {e}"
                    )));
                }
            }
        };

        // Verify the connection actually answers before declaring readiness
        redis::cmd("PING")
            .query_async::<String>(&mut connection)
            .await
            .map_err(|e| CacheError::connection(format!("Redis ping failed: {e}")))?;

        info!(attempts = attempt, "Connected to Redis");

        Ok(Self {
            connection,
            ready: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Connects with default settings for the given URL
    pub async fn with_url(url: impl Into<String>) -> Result<Self, CacheError> {
        Self::connect(RedisStoreConfig::new(url)).await
    }

    /// Tracks the outcome of an operation on the readiness flag
    fn track<T>(&self, result: Result<T, RedisError>) -> Result<T, CacheError> {
        match result {
            Ok(value) => {
                self.ready.store(true, Ordering::Relaxed);
                Ok(value)
            }
            Err(e) => {
                if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
                    self.ready.store(false, Ordering::Relaxed);
                    Err(CacheError::connection(e.to_string()))
                } else {
                    Err(CacheError::backend(e.to_string()))
                }
            }
        }
    }

    /// Collects every key matching the pattern via SCAN (never KEYS)
    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.connection.clone();
        let mut cursor = 0u64;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = self.track(
                redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(pattern)
                    .arg("COUNT")
                    .arg(100)
                    .query_async(&mut conn)
                    .await,
            )?;

            keys.extend(batch);
            cursor = next;

            if cursor == 0 {
                break;
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection.clone();
        self.track(conn.get(key).await)
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let ttl_secs = ttl.as_secs().max(1);
        self.track(conn.set_ex(key, value, ttl_secs).await)
    }

    async fn delete(&self, key: &str) -> Result<u64, CacheError> {
        let mut conn = self.connection.clone();
        let removed: i64 = self.track(conn.del(key).await)?;
        Ok(removed as u64)
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheError> {
        let keys = self.scan_keys(pattern).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.connection.clone();
        let removed: i64 = self.track(conn.del(&keys).await)?;
        Ok(removed as u64)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection.clone();
        self.track(conn.exists(key).await)
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, CacheError> {
        let mut conn = self.connection.clone();
        let ttl_secs: i64 = self.track(conn.ttl(key).await)?;

        Ok(match ttl_secs {
            -2 => KeyTtl::Missing,
            -1 => KeyTtl::Persistent,
            secs => KeyTtl::Remaining(Duration::from_secs(secs.max(0) as u64)),
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        let mut conn = self.connection.clone();
        let ttl_secs = ttl.as_secs().max(1) as i64;
        self.track(conn.expire(key, ttl_secs).await)
    }

    async fn increment(&self, key: &str, delta: i64) -> Result<i64, CacheError> {
        let mut conn = self.connection.clone();
        self.track(conn.incr(key, delta).await)
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.connection.clone();
        self.track(conn.mget(keys).await)
    }

    async fn multi_set(
        &self,
        pairs: &[(String, String)],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        if pairs.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection.clone();
        let ttl_secs = ttl.as_secs().max(1);

        // Pipelined SET EX per key: batched for efficiency, no cross-key
        // atomicity guarantee
        let mut pipe = redis::pipe();
        for (key, value) in pairs {
            pipe.set_ex(key, value, ttl_secs).ignore();
        }

        self.track(pipe.query_async::<()>(&mut conn).await)
    }

    async fn close(&self) {
        self.ready.store(false, Ordering::Relaxed);

        let mut conn = self.connection.clone();
        let quit_cmd = redis::cmd("QUIT");
        let quit = quit_cmd.query_async::<()>(&mut conn);

        match tokio::time::timeout(Duration::from_secs(2), quit).await {
            Ok(Ok(())) => info!("Redis connection closed"),
            Ok(Err(e)) => warn!(error = %e, "Redis close failed"),
            Err(_) => warn!("Redis close timed out"),
        }
    }
}
