//! API middleware components

pub mod auth;
pub mod response_cache;

pub use auth::{requester_id, Requester, USER_ID_HEADER};
pub use response_cache::{cache_response, ResponseCacheConfig};
