use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CatalogItem, ChatSender, UserProfile};

// -- JWT Claims --

/// JWT claims shared between login issuance and the auth middleware.
/// Canonical definition lives here in arcadia-types to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub nick: String,
    /// "admin" for the configured admin account, "user" otherwise.
    pub role: String,
    pub exp: usize,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub nick: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub ok: bool,
    #[serde(rename = "userId")]
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub nick: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub ok: bool,
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub ok: bool,
    pub user: UserProfile,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddXpRequest {
    pub amount: i64,
}

#[derive(Debug, Serialize)]
pub struct AddXpResponse {
    pub ok: bool,
    pub xp: i64,
}

// -- Tokens / premium --

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct IssueTokenRequest {
    /// Validity window in days; defaults to 30.
    pub days: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct IssueTokenResponse {
    pub ok: bool,
    pub token: String,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "expiresAt")]
    pub expires_at: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedeemRequest {
    pub token: String,
    #[serde(rename = "userId")]
    pub user_id: String,
}

/// Redemption always answers 200; business failures travel in `reason`
/// (`TOKEN_INEXISTENTE` | `TOKEN_EXPIRADO` | `TOKEN_JA_USADO`).
#[derive(Debug, Serialize)]
pub struct RedeemResponse {
    pub ok: bool,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct PremiumStatusResponse {
    pub ok: bool,
    pub premium: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PremiumCountResponse {
    pub ok: bool,
    #[serde(rename = "totalPremium")]
    pub total_premium: i64,
}

// -- Chat --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SendChatResponse {
    pub ok: bool,
    #[serde(rename = "chatId")]
    pub chat_id: Uuid,
    #[serde(rename = "expiresAt")]
    pub expires_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessageView {
    pub sender: ChatSender,
    pub message: String,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

#[derive(Debug, Serialize)]
pub struct ChatMessagesResponse {
    pub ok: bool,
    #[serde(rename = "chatId")]
    pub chat_id: Uuid,
    #[serde(rename = "expiresAt")]
    pub expires_at: i64,
    pub messages: Vec<ChatMessageView>,
}

/// Admin-facing chat summary, ordered most-recently-active first.
/// `nick` is None when the owning account no longer exists (user references
/// are weak — chats are not cascaded on account deletion).
#[derive(Debug, Serialize)]
pub struct ChatSummary {
    pub id: Uuid,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub nick: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "expiresAt")]
    pub expires_at: i64,
    #[serde(rename = "lastActivityAt")]
    pub last_activity_at: i64,
}

#[derive(Debug, Serialize)]
pub struct ChatListResponse {
    pub ok: bool,
    pub chats: Vec<ChatSummary>,
}

#[derive(Debug, Serialize)]
pub struct ChatHistoryResponse {
    pub ok: bool,
    pub messages: Vec<ChatMessageView>,
}

// -- Catalog --

#[derive(Debug, Deserialize)]
pub struct UpsertCatalogRequest {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub premium: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteCatalogRequest {
    pub link: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportCatalogRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ImportCatalogResponse {
    pub ok: bool,
    pub imported: usize,
}

#[derive(Debug, Serialize)]
pub struct CatalogListResponse {
    pub ok: bool,
    pub items: Vec<CatalogItem>,
}

// -- Stats --

#[derive(Debug, Serialize)]
pub struct VisitsResponse {
    pub ok: bool,
    pub count: i64,
}

// -- Generic ack --

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn new() -> Self {
        Self { ok: true }
    }
}

impl Default for OkResponse {
    fn default() -> Self {
        Self::new()
    }
}
