use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// All timestamps are unix epoch milliseconds (INTEGER) — expiry and
/// rate-limit arithmetic is millisecond-based throughout.
pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            nick            TEXT NOT NULL UNIQUE,
            password_hash   TEXT NOT NULL,
            xp              INTEGER NOT NULL DEFAULT 0,
            created_at      INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tokens (
            token       TEXT PRIMARY KEY,
            created_at  INTEGER NOT NULL,
            expires_at  INTEGER NOT NULL,
            used_by     TEXT,
            used_at     INTEGER
        );

        CREATE TABLE IF NOT EXISTS premium_users (
            user_id     TEXT PRIMARY KEY,
            since       INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS chats (
            id                  TEXT PRIMARY KEY,
            user_id             TEXT NOT NULL,
            created_at          INTEGER NOT NULL,
            expires_at          INTEGER NOT NULL,
            last_activity_at    INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chats_user
            ON chats(user_id);

        CREATE INDEX IF NOT EXISTS idx_chats_expires
            ON chats(expires_at);

        CREATE TABLE IF NOT EXISTS chat_messages (
            id          TEXT PRIMARY KEY,
            chat_id     TEXT NOT NULL,
            sender      TEXT NOT NULL,
            message     TEXT NOT NULL,
            created_at  INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chat_messages_chat
            ON chat_messages(chat_id, created_at);

        CREATE TABLE IF NOT EXISTS catalog_items (
            id          TEXT PRIMARY KEY,
            title       TEXT NOT NULL,
            link        TEXT NOT NULL UNIQUE,
            image       TEXT NOT NULL DEFAULT '',
            category    TEXT NOT NULL DEFAULT '',
            premium     INTEGER NOT NULL DEFAULT 0,
            created_at  INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS site_stats (
            key     TEXT PRIMARY KEY,
            value   INTEGER NOT NULL
        );

        -- Seed the global visit counter
        INSERT OR IGNORE INTO site_stats (key, value)
            VALUES ('visits', 0);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
