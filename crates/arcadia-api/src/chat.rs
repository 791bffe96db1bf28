use anyhow::anyhow;
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::{error, warn};
use uuid::Uuid;

use arcadia_db::chat::{Append, CHAT_HISTORY_CAP};
use arcadia_db::models::ChatMessageRow;
use arcadia_types::api::{
    ChatHistoryResponse, ChatListResponse, ChatMessageView, ChatMessagesResponse, ChatSummary,
    Claims, OkResponse, SendChatRequest, SendChatResponse,
};
use arcadia_types::models::ChatSender;

use crate::AppState;
use crate::error::ApiError;

/// POST /chat/send — sending implicitly opens the user's session; there is
/// no separate "start chat" endpoint.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let now_ms = state.clock.now_ms();
    let user_id = claims.sub.to_string();

    // Run blocking DB work off the async runtime
    let db = state.clone();
    let (chat, outcome) = tokio::task::spawn_blocking(move || {
        let chat = db.db.get_or_create_active_chat(&user_id, now_ms)?;
        let outcome = db.db.append_user_message(&chat.id, &req.message, now_ms)?;
        Ok::<_, anyhow::Error>((chat, outcome))
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Storage(anyhow!("chat send task failed"))
    })??;

    if let Some(err) = outcome_to_error(outcome) {
        return Err(err);
    }

    Ok(Json(SendChatResponse {
        ok: true,
        chat_id: parse_chat_id(&chat.id),
        expires_at: chat.expires_at,
    }))
}

/// GET /chat/messages — reading also opens a session when none is active,
/// so the response always carries a live chat id.
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let now_ms = state.clock.now_ms();
    let user_id = claims.sub.to_string();

    let db = state.clone();
    let (chat, rows) = tokio::task::spawn_blocking(move || {
        let chat = db.db.get_or_create_active_chat(&user_id, now_ms)?;
        let rows = db.db.list_chat_messages(&chat.id, CHAT_HISTORY_CAP)?;
        Ok::<_, anyhow::Error>((chat, rows))
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Storage(anyhow!("chat read task failed"))
    })??;

    Ok(Json(ChatMessagesResponse {
        ok: true,
        chat_id: parse_chat_id(&chat.id),
        expires_at: chat.expires_at,
        messages: message_views(rows),
    }))
}

/// GET /chat/admin/list — all live chats, most-recently-active first.
pub async fn admin_list(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let now_ms = state.clock.now_ms();

    let db = state.clone();
    let rows = tokio::task::spawn_blocking(move || db.db.list_chats(now_ms))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Storage(anyhow!("chat list task failed"))
        })??;

    let chats = rows
        .into_iter()
        .map(|row| ChatSummary {
            id: parse_chat_id(&row.chat.id),
            user_id: row.chat.user_id,
            nick: row.nick,
            created_at: row.chat.created_at,
            expires_at: row.chat.expires_at,
            last_activity_at: row.chat.last_activity_at,
        })
        .collect();

    Ok(Json(ChatListResponse { ok: true, chats }))
}

pub async fn admin_messages(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rows = tokio::task::spawn_blocking(move || {
        if db.db.get_chat(&chat_id)?.is_none() {
            return Ok(None);
        }
        let rows = db.db.list_chat_messages(&chat_id, CHAT_HISTORY_CAP)?;
        Ok::<_, anyhow::Error>(Some(rows))
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Storage(anyhow!("chat history task failed"))
    })??
    .ok_or(ApiError::NotFound("CHAT_NOT_FOUND"))?;

    Ok(Json(ChatHistoryResponse {
        ok: true,
        messages: message_views(rows),
    }))
}

/// POST /chat/admin/{chat_id}/send — operator reply into an existing chat.
/// An expired chat is gone for operators; only the user's next interaction
/// opens a fresh one.
pub async fn admin_send(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Json(req): Json<SendChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let now_ms = state.clock.now_ms();

    let db = state.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        db.db.append_operator_message(&chat_id, &req.message, now_ms)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Storage(anyhow!("operator send task failed"))
    })??;

    if let Some(err) = outcome_to_error(outcome) {
        return Err(err);
    }

    Ok(Json(OkResponse::new()))
}

fn outcome_to_error(outcome: Append) -> Option<ApiError> {
    match outcome {
        Append::Appended => None,
        Append::Empty => Some(ApiError::Validation("EMPTY_MESSAGE")),
        Append::TooLong => Some(ApiError::Validation("MESSAGE_TOO_LONG")),
        Append::RateLimited { wait_ms } => Some(ApiError::RateLimited { wait_ms }),
        Append::ChatNotFound => Some(ApiError::NotFound("CHAT_NOT_FOUND")),
        Append::ChatExpired => Some(ApiError::Expired("CHAT_EXPIRED")),
    }
}

fn parse_chat_id(id: &str) -> Uuid {
    id.parse().unwrap_or_else(|e| {
        warn!("Corrupt chat id '{}': {}", id, e);
        Uuid::default()
    })
}

fn message_views(rows: Vec<ChatMessageRow>) -> Vec<ChatMessageView> {
    rows.into_iter()
        .map(|row| ChatMessageView {
            sender: ChatSender::from_str(&row.sender).unwrap_or_else(|| {
                warn!("Corrupt sender '{}' on message '{}'", row.sender, row.id);
                ChatSender::User
            }),
            message: row.message,
            created_at: row.created_at,
        })
        .collect()
}
