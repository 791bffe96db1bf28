use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Author role of a chat message. Stored as lowercase TEXT in SQLite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatSender {
    User,
    Operator,
}

impl ChatSender {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatSender::User => "user",
            ChatSender::Operator => "operator",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(ChatSender::User),
            "operator" => Some(ChatSender::Operator),
            _ => None,
        }
    }
}

/// Public view of a user account — never carries the credential hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub nick: String,
    pub xp: i64,
}

/// A content catalog entry. `link` is the natural key — admin upserts are
/// keyed on it so re-importing the same listing updates in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: Uuid,
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub premium: bool,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}
