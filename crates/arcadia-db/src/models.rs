/// Database row types — these map directly to SQLite rows.
/// Distinct from arcadia-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub nick: String,
    pub password_hash: String,
    pub xp: i64,
    pub created_at: i64,
}

pub struct TokenRow {
    pub token: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub used_by: Option<String>,
    pub used_at: Option<i64>,
}

pub struct ChatRow {
    pub id: String,
    pub user_id: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub last_activity_at: i64,
}

pub struct ChatMessageRow {
    pub id: String,
    pub chat_id: String,
    pub sender: String,
    pub message: String,
    pub created_at: i64,
}

pub struct CatalogRow {
    pub id: String,
    pub title: String,
    pub link: String,
    pub image: String,
    pub category: String,
    pub premium: bool,
    pub created_at: i64,
}

/// Chat row joined with the owner's nick for the admin listing.
/// `nick` is None when the account has been deleted — user references are
/// weak and chats are not cascaded.
pub struct ChatSummaryRow {
    pub chat: ChatRow,
    pub nick: Option<String>,
}
