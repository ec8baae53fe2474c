//! Cache key construction
//!
//! Keys are colon-delimited: a namespace prefix, a resource or scope
//! identifier, then zero or more discriminating tokens. Structured arguments
//! are flattened through a canonical JSON form so equal logical queries
//! always derive equal keys.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// A single token of a cache key
#[derive(Debug, Clone)]
pub struct KeyArg(String);

impl KeyArg {
    /// Flattens a structured value into its canonical string form
    pub fn canonical<T: Serialize>(value: &T) -> Self {
        Self(canonical_json(value))
    }

    fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for KeyArg {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for KeyArg {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&String> for KeyArg {
    fn from(value: &String) -> Self {
        Self(value.clone())
    }
}

impl From<u32> for KeyArg {
    fn from(value: u32) -> Self {
        Self(value.to_string())
    }
}

impl From<i64> for KeyArg {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl From<Uuid> for KeyArg {
    fn from(value: Uuid) -> Self {
        Self(value.to_string())
    }
}

impl From<&Uuid> for KeyArg {
    fn from(value: &Uuid) -> Self {
        Self(value.to_string())
    }
}

/// Builds `namespace:arg1:arg2:…` from a namespace and its discriminators
pub fn build_key(namespace: &str, args: &[KeyArg]) -> String {
    let mut key = String::from(namespace);
    for arg in args {
        key.push(':');
        key.push_str(arg.as_str());
    }
    key
}

/// Wildcard pattern matching every key under `namespace:scope`
///
/// Patterns are only ever used for deletion, never for point lookups.
pub fn scope_pattern(namespace: &str, scope: impl Into<KeyArg>) -> String {
    format!("{}:{}:*", namespace, scope.into().as_str())
}

/// Serializes a value with all object keys recursively sorted
///
/// Two maps holding the same entries in different insertion orders flatten to
/// the same string, which keeps derived keys deterministic.
pub fn canonical_json<T: Serialize>(value: &T) -> String {
    let value = serde_json::to_value(value).unwrap_or(Value::Null);
    sort_keys(&value).to_string()
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by_key(|(k, _)| k.as_str().to_string());
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sort_keys(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_key_joins_with_colons() {
        let key = build_key(
            "user_accounts",
            &["u1".into(), 1u32.into(), 10u32.into(), "all".into(), "createdAt".into()],
        );
        assert_eq!(key, "user_accounts:u1:1:10:all:createdAt");
    }

    #[test]
    fn test_build_key_without_args() {
        assert_eq!(build_key("api_cache", &[]), "api_cache");
    }

    #[test]
    fn test_scope_pattern() {
        assert_eq!(scope_pattern("user_accounts", "u1"), "user_accounts:u1:*");
    }

    #[test]
    fn test_canonical_json_sorts_object_keys() {
        let a = json!({"page": 1, "limit": 10});
        let b = json!({"limit": 10, "page": 1});
        assert_eq!(canonical_json(&a), canonical_json(&b));
        assert_eq!(canonical_json(&a), r#"{"limit":10,"page":1}"#);
    }

    #[test]
    fn test_canonical_json_sorts_nested_objects() {
        let value = json!({"b": {"z": 1, "a": 2}, "a": [{"y": 1, "x": 2}]});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":[{"x":2,"y":1}],"b":{"a":2,"z":1}}"#
        );
    }

    #[test]
    fn test_structured_args_flatten_deterministically() {
        #[derive(Serialize)]
        struct Filter {
            status: String,
            min: i64,
        }

        let key1 = build_key(
            "search",
            &["u1".into(), KeyArg::canonical(&Filter { status: "ACTIVE".into(), min: 5 })],
        );
        let key2 = build_key(
            "search",
            &["u1".into(), KeyArg::canonical(&Filter { status: "ACTIVE".into(), min: 5 })],
        );
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_uuid_args() {
        let id = Uuid::nil();
        let key = build_key("account", &[id.into(), "u1".into()]);
        assert_eq!(
            key,
            "account:00000000-0000-0000-0000-000000000000:u1"
        );
    }
}
