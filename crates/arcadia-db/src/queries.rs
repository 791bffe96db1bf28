use crate::Database;
use crate::models::{CatalogRow, UserRow};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        nick: &str,
        password_hash: &str,
        now_ms: i64,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, nick, password_hash, xp, created_at) VALUES (?1, ?2, ?3, 0, ?4)",
                rusqlite::params![id, nick, password_hash, now_ms],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_nick(&self, nick: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "nick", nick))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    /// Adds to a user's experience counter and returns the new total.
    /// Returns None when the user row no longer exists.
    pub fn add_xp(&self, user_id: &str, amount: i64) -> Result<Option<i64>> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET xp = xp + ?1 WHERE id = ?2",
                rusqlite::params![amount, user_id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            let xp = conn.query_row("SELECT xp FROM users WHERE id = ?1", [user_id], |row| {
                row.get(0)
            })?;
            Ok(Some(xp))
        })
    }

    // -- Catalog --

    /// Insert-or-update keyed on the unique link, so re-importing the same
    /// listing updates in place instead of duplicating it.
    pub fn upsert_catalog_item(
        &self,
        id: &str,
        title: &str,
        link: &str,
        image: &str,
        category: &str,
        premium: bool,
        now_ms: i64,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO catalog_items (id, title, link, image, category, premium, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(link) DO UPDATE SET
                     title = excluded.title,
                     image = excluded.image,
                     category = excluded.category,
                     premium = excluded.premium",
                rusqlite::params![id, title, link, image, category, premium, now_ms],
            )?;
            Ok(())
        })
    }

    pub fn delete_catalog_item(&self, link: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM catalog_items WHERE link = ?1", [link])?;
            Ok(n)
        })
    }

    pub fn clear_catalog(&self) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM catalog_items", [])?;
            Ok(n)
        })
    }

    pub fn list_catalog(&self) -> Result<Vec<CatalogRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, link, image, category, premium, created_at
                 FROM catalog_items
                 ORDER BY created_at DESC",
            )?;

            let rows = stmt
                .query_map([], |row| {
                    Ok(CatalogRow {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        link: row.get(2)?,
                        image: row.get(3)?,
                        category: row.get(4)?,
                        premium: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Site stats --

    /// Bump the global visit counter and return the new total.
    pub fn increment_visits(&self) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let count = conn.query_row(
                "INSERT INTO site_stats (key, value) VALUES ('visits', 1)
                 ON CONFLICT(key) DO UPDATE SET value = site_stats.value + 1
                 RETURNING value",
                [],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    pub fn get_visits(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn
                .query_row(
                    "SELECT value FROM site_stats WHERE key = 'visits'",
                    [],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(count.unwrap_or(0))
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    // `column` is one of two fixed identifiers, never user input
    let sql = format!(
        "SELECT id, nick, password_hash, xp, created_at FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                nick: row.get(1)?,
                password_hash: row.get(2)?,
                xp: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}
