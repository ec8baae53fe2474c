//! Cache infrastructure - backing store implementations and facade

mod in_memory;
mod redis;
mod service;

pub use in_memory::{MemoryStore, MemoryStoreConfig};
pub use redis::{RedisStore, RedisStoreConfig};
pub use service::{CacheService, Cached, DEFAULT_TTL, RECORD_TTL, VIEW_TTL};
