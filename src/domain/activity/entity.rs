//! Activity log entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    Create,
    Update,
    Delete,
    Login,
    Logout,
    Other,
}

impl ActivityKind {
    pub const ALLOWED: [&'static str; 6] =
        ["CREATE", "UPDATE", "DELETE", "LOGIN", "LOGOUT", "OTHER"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Login => "LOGIN",
            Self::Logout => "LOGOUT",
            Self::Other => "OTHER",
        }
    }

    /// Case-insensitive parse, mirroring the lenient inbound contract
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "CREATE" => Some(Self::Create),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            "LOGIN" => Some(Self::Login),
            "LOGOUT" => Some(Self::Logout),
            "OTHER" => Some(Self::Other),
            _ => None,
        }
    }
}

/// An audit trail entry attached to an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: Uuid,
    pub account_id: Uuid,
    pub kind: ActivityKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Activity {
    pub fn new(
        account_id: Uuid,
        kind: ActivityKind,
        message: impl Into<String>,
        metadata: Option<Value>,
        created_by: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            kind,
            message: message.into(),
            metadata,
            created_by,
            created_at: Utc::now(),
        }
    }
}
