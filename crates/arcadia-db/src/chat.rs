use crate::Database;
use crate::models::{ChatMessageRow, ChatRow, ChatSummaryRow};
use anyhow::{Result, anyhow};
use arcadia_types::models::ChatSender;
use rusqlite::{Connection, OptionalExtension};
use tracing::info;
use uuid::Uuid;

/// A chat lives for a fixed window from creation; activity does not extend it.
pub const CHAT_TTL_MS: i64 = 7 * 24 * 60 * 60 * 1000;
/// Minimum spacing between consecutive user-authored messages in one chat.
pub const CHAT_RATE_LIMIT_MS: i64 = 30_000;
pub const CHAT_MESSAGE_MAX_CHARS: usize = 500;
/// Upper bound on a single history read. Chats are short-lived, so the
/// earliest messages are the relevant ones.
pub const CHAT_HISTORY_CAP: u32 = 200;

/// Outcome of an append attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Append {
    Appended,
    Empty,
    TooLong,
    /// Only user-authored messages are rate limited; operator replies never
    /// trip this.
    RateLimited { wait_ms: i64 },
    /// Operator paths only — a user send always targets its own live chat.
    ChatNotFound,
    ChatExpired,
}

impl Database {
    /// Deletes expired chats and their messages. Idempotent and safe to run
    /// on every chat read/write; there is no background scheduler.
    pub fn sweep_expired_chats(&self, now_ms: i64) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let swept = sweep(&tx, now_ms)?;
            tx.commit()?;
            Ok(swept)
        })
    }

    /// The sole chat creation path — sending or reading implicitly opens a
    /// session. Sweep, lookup, and conditional insert run in one transaction
    /// so at most one non-expired chat per user can exist.
    pub fn get_or_create_active_chat(&self, user_id: &str, now_ms: i64) -> Result<ChatRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            sweep(&tx, now_ms)?;

            if let Some(chat) = active_chat_for(&tx, user_id, now_ms)? {
                tx.commit()?;
                return Ok(chat);
            }

            let id = Uuid::new_v4().to_string();
            // Guarded insert instead of check-then-insert: the NOT EXISTS
            // clause re-checks inside the same statement, so a concurrent
            // create cannot produce a second active chat.
            tx.execute(
                "INSERT INTO chats (id, user_id, created_at, expires_at, last_activity_at)
                 SELECT ?1, ?2, ?3, ?4, ?3
                 WHERE NOT EXISTS (
                     SELECT 1 FROM chats WHERE user_id = ?2 AND expires_at >= ?3
                 )",
                rusqlite::params![id, user_id, now_ms, now_ms + CHAT_TTL_MS],
            )?;

            let chat = active_chat_for(&tx, user_id, now_ms)?
                .ok_or_else(|| anyhow!("chat insert raced and lost for user {}", user_id))?;
            tx.commit()?;
            Ok(chat)
        })
    }

    /// Append a user-authored message to the user's active chat.
    pub fn append_user_message(&self, chat_id: &str, text: &str, now_ms: i64) -> Result<Append> {
        let text = match validate_text(text) {
            Ok(t) => t,
            Err(outcome) => return Ok(outcome),
        };

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let last_user_at: Option<i64> = tx
                .query_row(
                    "SELECT created_at FROM chat_messages
                     WHERE chat_id = ?1 AND sender = 'user'
                     ORDER BY created_at DESC LIMIT 1",
                    [chat_id],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(last_at) = last_user_at {
                let elapsed = now_ms - last_at;
                if elapsed < CHAT_RATE_LIMIT_MS {
                    return Ok(Append::RateLimited {
                        wait_ms: CHAT_RATE_LIMIT_MS - elapsed,
                    });
                }
            }

            insert_message(&tx, chat_id, ChatSender::User, text, now_ms)?;
            touch_activity(&tx, chat_id, now_ms)?;
            tx.commit()?;
            Ok(Append::Appended)
        })
    }

    /// Append an operator reply to an existing chat. Operators cannot revive
    /// an expired chat — the user's next interaction opens a fresh one.
    pub fn append_operator_message(&self, chat_id: &str, text: &str, now_ms: i64) -> Result<Append> {
        let text = match validate_text(text) {
            Ok(t) => t,
            Err(outcome) => return Ok(outcome),
        };

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let Some(chat) = chat_by_id(&tx, chat_id)? else {
                return Ok(Append::ChatNotFound);
            };
            if now_ms > chat.expires_at {
                return Ok(Append::ChatExpired);
            }

            insert_message(&tx, chat_id, ChatSender::Operator, text, now_ms)?;
            touch_activity(&tx, chat_id, now_ms)?;
            tx.commit()?;
            Ok(Append::Appended)
        })
    }

    /// Earliest messages first, ascending by creation time, capped.
    pub fn list_chat_messages(&self, chat_id: &str, limit: u32) -> Result<Vec<ChatMessageRow>> {
        let limit = limit.min(CHAT_HISTORY_CAP);

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, chat_id, sender, message, created_at
                 FROM chat_messages
                 WHERE chat_id = ?1
                 ORDER BY created_at ASC
                 LIMIT ?2",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![chat_id, limit], |row| {
                    Ok(ChatMessageRow {
                        id: row.get(0)?,
                        chat_id: row.get(1)?,
                        sender: row.get(2)?,
                        message: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn get_chat(&self, chat_id: &str) -> Result<Option<ChatRow>> {
        self.with_conn(|conn| chat_by_id(conn, chat_id))
    }

    /// Admin-facing listing: sweeps first, then orders most-recently-active
    /// first with creation time as the tie-breaker.
    pub fn list_chats(&self, now_ms: i64) -> Result<Vec<ChatSummaryRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            sweep(&tx, now_ms)?;

            let rows = {
                let mut stmt = tx.prepare(
                    "SELECT c.id, c.user_id, c.created_at, c.expires_at, c.last_activity_at, u.nick
                     FROM chats c
                     LEFT JOIN users u ON u.id = c.user_id
                     ORDER BY c.last_activity_at DESC, c.created_at DESC",
                )?;

                stmt.query_map([], |row| {
                    Ok(ChatSummaryRow {
                        chat: ChatRow {
                            id: row.get(0)?,
                            user_id: row.get(1)?,
                            created_at: row.get(2)?,
                            expires_at: row.get(3)?,
                            last_activity_at: row.get(4)?,
                        },
                        nick: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?
            };

            tx.commit()?;
            Ok(rows)
        })
    }
}

fn validate_text(raw: &str) -> std::result::Result<&str, Append> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(Append::Empty);
    }
    if text.chars().count() > CHAT_MESSAGE_MAX_CHARS {
        return Err(Append::TooLong);
    }
    Ok(text)
}

fn sweep(conn: &Connection, now_ms: i64) -> Result<usize> {
    conn.execute(
        "DELETE FROM chat_messages
         WHERE chat_id IN (SELECT id FROM chats WHERE expires_at < ?1)",
        [now_ms],
    )?;
    let swept = conn.execute("DELETE FROM chats WHERE expires_at < ?1", [now_ms])?;
    if swept > 0 {
        info!("Sweep: removed {} expired chats", swept);
    }
    Ok(swept)
}

fn active_chat_for(conn: &Connection, user_id: &str, now_ms: i64) -> Result<Option<ChatRow>> {
    let row = conn
        .query_row(
            "SELECT id, user_id, created_at, expires_at, last_activity_at
             FROM chats WHERE user_id = ?1 AND expires_at >= ?2",
            rusqlite::params![user_id, now_ms],
            map_chat_row,
        )
        .optional()?;
    Ok(row)
}

fn chat_by_id(conn: &Connection, chat_id: &str) -> Result<Option<ChatRow>> {
    let row = conn
        .query_row(
            "SELECT id, user_id, created_at, expires_at, last_activity_at
             FROM chats WHERE id = ?1",
            [chat_id],
            map_chat_row,
        )
        .optional()?;
    Ok(row)
}

fn map_chat_row(row: &rusqlite::Row<'_>) -> std::result::Result<ChatRow, rusqlite::Error> {
    Ok(ChatRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        created_at: row.get(2)?,
        expires_at: row.get(3)?,
        last_activity_at: row.get(4)?,
    })
}

fn insert_message(
    conn: &Connection,
    chat_id: &str,
    sender: ChatSender,
    text: &str,
    now_ms: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO chat_messages (id, chat_id, sender, message, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            Uuid::new_v4().to_string(),
            chat_id,
            sender.as_str(),
            text,
            now_ms
        ],
    )?;
    Ok(())
}

fn touch_activity(conn: &Connection, chat_id: &str, now_ms: i64) -> Result<()> {
    conn.execute(
        "UPDATE chats SET last_activity_at = ?1 WHERE id = ?2",
        rusqlite::params![now_ms, chat_id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000_000;

    fn active_chat_count(db: &Database, user_id: &str, now_ms: i64) -> i64 {
        db.with_conn(|conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM chats WHERE user_id = ?1 AND expires_at >= ?2",
                rusqlite::params![user_id, now_ms],
                |row| row.get(0),
            )?;
            Ok(n)
        })
        .unwrap()
    }

    #[test]
    fn get_or_create_returns_existing_chat() {
        let db = Database::open_in_memory().unwrap();

        let first = db.get_or_create_active_chat("alice", T0).unwrap();
        let second = db.get_or_create_active_chat("alice", T0 + 60_000).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.expires_at, T0 + CHAT_TTL_MS);
        assert_eq!(active_chat_count(&db, "alice", T0), 1);
    }

    #[test]
    fn at_most_one_active_chat_per_user() {
        let db = Database::open_in_memory().unwrap();

        for i in 0..5 {
            db.get_or_create_active_chat("alice", T0 + i * 1_000).unwrap();
        }

        assert_eq!(active_chat_count(&db, "alice", T0 + 5_000), 1);
    }

    #[test]
    fn expired_chat_is_swept_and_replaced() {
        let db = Database::open_in_memory().unwrap();

        let old = db.get_or_create_active_chat("alice", T0).unwrap();
        db.append_user_message(&old.id, "hi", T0).unwrap();

        // One past the TTL: the old chat and its messages disappear and a
        // fresh empty chat takes its place.
        let later = T0 + CHAT_TTL_MS + 1;
        let fresh = db.get_or_create_active_chat("alice", later).unwrap();

        assert_ne!(old.id, fresh.id);
        assert_eq!(fresh.created_at, later);
        assert!(db.get_chat(&old.id).unwrap().is_none());
        assert!(db.list_chat_messages(&old.id, 200).unwrap().is_empty());
        assert!(db.list_chat_messages(&fresh.id, 200).unwrap().is_empty());
    }

    #[test]
    fn chat_alive_exactly_at_expiry() {
        let db = Database::open_in_memory().unwrap();

        let chat = db.get_or_create_active_chat("alice", T0).unwrap();
        let same = db.get_or_create_active_chat("alice", chat.expires_at).unwrap();
        assert_eq!(chat.id, same.id);
    }

    #[test]
    fn sweep_is_idempotent() {
        let db = Database::open_in_memory().unwrap();

        db.get_or_create_active_chat("alice", T0).unwrap();
        let later = T0 + CHAT_TTL_MS + 1;

        assert_eq!(db.sweep_expired_chats(later).unwrap(), 1);
        assert_eq!(db.sweep_expired_chats(later).unwrap(), 0);
        assert_eq!(db.sweep_expired_chats(later).unwrap(), 0);
    }

    #[test]
    fn user_messages_are_rate_limited() {
        let db = Database::open_in_memory().unwrap();
        let chat = db.get_or_create_active_chat("alice", T0).unwrap();

        assert_eq!(db.append_user_message(&chat.id, "one", T0).unwrap(), Append::Appended);

        match db.append_user_message(&chat.id, "two", T0 + 10_000).unwrap() {
            Append::RateLimited { wait_ms } => assert_eq!(wait_ms, 20_000),
            other => panic!("expected RateLimited, got {:?}", other),
        }

        // After the window the send goes through.
        assert_eq!(
            db.append_user_message(&chat.id, "two", T0 + CHAT_RATE_LIMIT_MS).unwrap(),
            Append::Appended
        );
    }

    #[test]
    fn operator_replies_are_never_rate_limited() {
        let db = Database::open_in_memory().unwrap();
        let chat = db.get_or_create_active_chat("alice", T0).unwrap();

        db.append_user_message(&chat.id, "help", T0).unwrap();
        assert_eq!(
            db.append_operator_message(&chat.id, "hello", T0 + 1).unwrap(),
            Append::Appended
        );
        assert_eq!(
            db.append_operator_message(&chat.id, "still there?", T0 + 2).unwrap(),
            Append::Appended
        );

        // Operator traffic does not consume the user's window either.
        match db.append_user_message(&chat.id, "yes", T0 + 10_000).unwrap() {
            Append::RateLimited { wait_ms } => assert_eq!(wait_ms, 20_000),
            other => panic!("expected RateLimited, got {:?}", other),
        }
    }

    #[test]
    fn conversation_is_ordered_by_creation_time() {
        let db = Database::open_in_memory().unwrap();
        let chat = db.get_or_create_active_chat("alice", T0).unwrap();

        db.append_user_message(&chat.id, "hi", T0).unwrap();
        db.append_operator_message(&chat.id, "hello", T0 + 1).unwrap();

        let messages = db.list_chat_messages(&chat.id, 200).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender, "user");
        assert_eq!(messages[0].message, "hi");
        assert_eq!(messages[1].sender, "operator");
        assert_eq!(messages[1].message, "hello");
    }

    #[test]
    fn text_validation_boundaries() {
        let db = Database::open_in_memory().unwrap();
        let chat = db.get_or_create_active_chat("alice", T0).unwrap();

        assert_eq!(db.append_user_message(&chat.id, "   ", T0).unwrap(), Append::Empty);

        let exactly_max = "x".repeat(CHAT_MESSAGE_MAX_CHARS);
        assert_eq!(db.append_user_message(&chat.id, &exactly_max, T0).unwrap(), Append::Appended);

        let too_long = "x".repeat(CHAT_MESSAGE_MAX_CHARS + 1);
        assert_eq!(
            db.append_user_message(&chat.id, &too_long, T0 + 60_000).unwrap(),
            Append::TooLong
        );
        assert_eq!(
            db.append_operator_message(&chat.id, &too_long, T0 + 60_000).unwrap(),
            Append::TooLong
        );
    }

    #[test]
    fn messages_are_stored_trimmed() {
        let db = Database::open_in_memory().unwrap();
        let chat = db.get_or_create_active_chat("alice", T0).unwrap();

        db.append_user_message(&chat.id, "  hi there  ", T0).unwrap();
        let messages = db.list_chat_messages(&chat.id, 200).unwrap();
        assert_eq!(messages[0].message, "hi there");
    }

    #[test]
    fn operator_cannot_reach_missing_or_expired_chats() {
        let db = Database::open_in_memory().unwrap();

        assert_eq!(
            db.append_operator_message("no-such-chat", "hello", T0).unwrap(),
            Append::ChatNotFound
        );

        let chat = db.get_or_create_active_chat("alice", T0).unwrap();
        assert_eq!(
            db.append_operator_message(&chat.id, "too late", chat.expires_at + 1).unwrap(),
            Append::ChatExpired
        );
    }

    #[test]
    fn appends_update_last_activity() {
        let db = Database::open_in_memory().unwrap();
        let chat = db.get_or_create_active_chat("alice", T0).unwrap();

        db.append_user_message(&chat.id, "hi", T0 + 5_000).unwrap();
        let after_user = db.get_chat(&chat.id).unwrap().unwrap();
        assert_eq!(after_user.last_activity_at, T0 + 5_000);

        db.append_operator_message(&chat.id, "hello", T0 + 9_000).unwrap();
        let after_operator = db.get_chat(&chat.id).unwrap().unwrap();
        assert_eq!(after_operator.last_activity_at, T0 + 9_000);

        // TTL is fixed at creation; activity does not extend it.
        assert_eq!(after_operator.expires_at, T0 + CHAT_TTL_MS);
    }

    #[test]
    fn admin_list_orders_by_recency() {
        let db = Database::open_in_memory().unwrap();

        let a = db.get_or_create_active_chat("alice", T0).unwrap();
        let b = db.get_or_create_active_chat("bob", T0 + 1_000).unwrap();

        db.append_user_message(&a.id, "ping", T0 + 60_000).unwrap();

        let chats = db.list_chats(T0 + 61_000).unwrap();
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[0].chat.id, a.id);
        assert_eq!(chats[1].chat.id, b.id);
        // No account rows were created, so nicks are absent.
        assert!(chats[0].nick.is_none());
    }

    #[test]
    fn history_cap_is_enforced() {
        let db = Database::open_in_memory().unwrap();
        let chat = db.get_or_create_active_chat("alice", T0).unwrap();

        for i in 0..5 {
            // Operator sends avoid the user rate limit.
            db.append_operator_message(&chat.id, &format!("m{}", i), T0 + i).unwrap();
        }

        let capped = db.list_chat_messages(&chat.id, 3).unwrap();
        assert_eq!(capped.len(), 3);
        assert_eq!(capped[0].message, "m0");
        assert_eq!(capped[2].message, "m2");

        let over_cap = db.list_chat_messages(&chat.id, 10_000).unwrap();
        assert_eq!(over_cap.len(), 5);
    }
}
