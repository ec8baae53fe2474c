//! Cache domain - backing store contract and key scheme

pub mod key;
mod store;

pub use key::{build_key, canonical_json, scope_pattern, KeyArg};
pub use store::{CacheError, CacheStore, KeyTtl};

#[cfg(test)]
pub use store::mock::MockStore;
