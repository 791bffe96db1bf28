use crate::Database;
use crate::models::TokenRow;
use anyhow::{Result, anyhow};
use rand::Rng;
use rusqlite::OptionalExtension;

pub const DEFAULT_TOKEN_VALIDITY_DAYS: u32 = 30;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;
const CODE_PREFIX: &str = "ARC";
const CODE_BLOCK_LEN: usize = 6;
const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Outcome of a redemption attempt. Wire reason codes live in arcadia-api;
/// this layer only reports the state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redemption {
    /// Token marked as used by the caller and a premium grant ensured.
    /// Re-redeeming with the same user id lands here again.
    Redeemed,
    NotFound,
    Expired,
    UsedByOther,
}

/// Human-transcribable code: `ARC-XXXXXX-XXXXXX`, uppercase alphanumeric.
pub fn generate_token_code() -> String {
    let mut rng = rand::rng();
    format!(
        "{}-{}-{}",
        CODE_PREFIX,
        code_block(&mut rng),
        code_block(&mut rng)
    )
}

fn code_block(rng: &mut impl Rng) -> String {
    (0..CODE_BLOCK_LEN)
        .map(|_| CODE_CHARSET[rng.random_range(0..CODE_CHARSET.len())] as char)
        .collect()
}

/// Codes compare case-insensitively and ignore surrounding whitespace.
pub fn normalize_token_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

impl Database {
    pub fn issue_token(&self, validity_days: u32, now_ms: i64) -> Result<TokenRow> {
        let expires_at = now_ms + validity_days as i64 * DAY_MS;

        self.with_conn_mut(|conn| {
            // INSERT OR IGNORE + retry covers a generated-code collision
            for _ in 0..3 {
                let code = generate_token_code();
                let inserted = conn.execute(
                    "INSERT OR IGNORE INTO tokens (token, created_at, expires_at, used_by, used_at)
                     VALUES (?1, ?2, ?3, NULL, NULL)",
                    rusqlite::params![code, now_ms, expires_at],
                )?;
                if inserted == 1 {
                    return Ok(TokenRow {
                        token: code,
                        created_at: now_ms,
                        expires_at,
                        used_by: None,
                        used_at: None,
                    });
                }
            }
            Err(anyhow!("could not generate a unique token code"))
        })
    }

    /// Token redemption state machine. Marking the token used and ensuring
    /// the premium grant happen inside one transaction — a failure between
    /// the two writes never leaves a used token without its grant.
    pub fn redeem_token(&self, code: &str, user_id: &str, now_ms: i64) -> Result<Redemption> {
        let code = normalize_token_code(code);

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let token = tx
                .query_row(
                    "SELECT token, created_at, expires_at, used_by, used_at
                     FROM tokens WHERE token = ?1",
                    [&code],
                    |row| {
                        Ok(TokenRow {
                            token: row.get(0)?,
                            created_at: row.get(1)?,
                            expires_at: row.get(2)?,
                            used_by: row.get(3)?,
                            used_at: row.get(4)?,
                        })
                    },
                )
                .optional()?;

            let Some(token) = token else {
                return Ok(Redemption::NotFound);
            };

            if now_ms > token.expires_at {
                return Ok(Redemption::Expired);
            }

            if let Some(used_by) = &token.used_by {
                if used_by != user_id {
                    return Ok(Redemption::UsedByOther);
                }
            }

            // Idempotent rewrite: a repeat redemption by the same user
            // refreshes used_at.
            tx.execute(
                "UPDATE tokens SET used_by = ?1, used_at = ?2 WHERE token = ?3",
                rusqlite::params![user_id, now_ms, code],
            )?;

            // First grant wins — an earlier `since` is never overwritten.
            tx.execute(
                "INSERT INTO premium_users (user_id, since) VALUES (?1, ?2)
                 ON CONFLICT(user_id) DO NOTHING",
                rusqlite::params![user_id, now_ms],
            )?;

            tx.commit()?;
            Ok(Redemption::Redeemed)
        })
    }

    pub fn get_token(&self, code: &str) -> Result<Option<TokenRow>> {
        let code = normalize_token_code(code);

        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT token, created_at, expires_at, used_by, used_at
                     FROM tokens WHERE token = ?1",
                    [&code],
                    |row| {
                        Ok(TokenRow {
                            token: row.get(0)?,
                            created_at: row.get(1)?,
                            expires_at: row.get(2)?,
                            used_by: row.get(3)?,
                            used_at: row.get(4)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    // -- Premium registry --

    /// Some(since) when the user holds a premium grant.
    pub fn premium_since(&self, user_id: &str) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            let since = conn
                .query_row(
                    "SELECT since FROM premium_users WHERE user_id = ?1",
                    [user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(since)
        })
    }

    /// Grants never expire, so this count is unbounded by time.
    pub fn total_premium(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row("SELECT COUNT(*) FROM premium_users", [], |row| row.get(0))?;
            Ok(count)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000_000;

    #[test]
    fn code_format() {
        let code = generate_token_code();
        let parts: Vec<&str> = code.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ARC");
        for block in &parts[1..] {
            assert_eq!(block.len(), CODE_BLOCK_LEN);
            assert!(block.bytes().all(|b| CODE_CHARSET.contains(&b)));
        }
    }

    #[test]
    fn redeem_is_idempotent_for_same_user() {
        let db = Database::open_in_memory().unwrap();
        let token = db.issue_token(30, T0).unwrap();

        assert_eq!(
            db.redeem_token(&token.token, "alice", T0 + 1_000).unwrap(),
            Redemption::Redeemed
        );
        assert_eq!(
            db.redeem_token(&token.token, "alice", T0 + 5_000).unwrap(),
            Redemption::Redeemed
        );

        // Exactly one grant, stamped at the first redemption.
        assert_eq!(db.total_premium().unwrap(), 1);
        assert_eq!(db.premium_since("alice").unwrap(), Some(T0 + 1_000));

        // The redemption timestamp itself may refresh.
        let row = db.get_token(&token.token).unwrap().unwrap();
        assert_eq!(row.used_by.as_deref(), Some("alice"));
        assert_eq!(row.used_at, Some(T0 + 5_000));
    }

    #[test]
    fn redeem_by_other_user_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let token = db.issue_token(30, T0).unwrap();

        assert_eq!(
            db.redeem_token(&token.token, "alice", T0 + 1_000).unwrap(),
            Redemption::Redeemed
        );
        assert_eq!(
            db.redeem_token(&token.token, "bob", T0 + 2_000).unwrap(),
            Redemption::UsedByOther
        );

        assert_eq!(db.premium_since("bob").unwrap(), None);
        assert_eq!(db.total_premium().unwrap(), 1);
    }

    #[test]
    fn expired_token_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let token = db.issue_token(1, T0).unwrap();

        let two_days_later = T0 + 2 * 24 * 60 * 60 * 1000;
        assert_eq!(
            db.redeem_token(&token.token, "alice", two_days_later).unwrap(),
            Redemption::Expired
        );
        assert_eq!(db.premium_since("alice").unwrap(), None);
    }

    #[test]
    fn expiry_applies_regardless_of_redemption_history() {
        let db = Database::open_in_memory().unwrap();
        let token = db.issue_token(1, T0).unwrap();

        assert_eq!(
            db.redeem_token(&token.token, "alice", T0 + 1_000).unwrap(),
            Redemption::Redeemed
        );

        let two_days_later = T0 + 2 * 24 * 60 * 60 * 1000;
        assert_eq!(
            db.redeem_token(&token.token, "alice", two_days_later).unwrap(),
            Redemption::Expired
        );
    }

    #[test]
    fn unknown_code_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(
            db.redeem_token("ARC-AAAAAA-AAAAAA", "alice", T0).unwrap(),
            Redemption::NotFound
        );
    }

    #[test]
    fn codes_compare_case_insensitively_and_trimmed() {
        let db = Database::open_in_memory().unwrap();
        let token = db.issue_token(30, T0).unwrap();

        let sloppy = format!("  {}  ", token.token.to_lowercase());
        assert_eq!(
            db.redeem_token(&sloppy, "alice", T0 + 1_000).unwrap(),
            Redemption::Redeemed
        );
    }

    #[test]
    fn validity_window_boundary() {
        let db = Database::open_in_memory().unwrap();
        let token = db.issue_token(1, T0).unwrap();
        assert_eq!(token.expires_at, T0 + 24 * 60 * 60 * 1000);

        // Exactly at expiry is still valid; one past is not.
        assert_eq!(
            db.redeem_token(&token.token, "alice", token.expires_at).unwrap(),
            Redemption::Redeemed
        );
        let db2 = Database::open_in_memory().unwrap();
        let token2 = db2.issue_token(1, T0).unwrap();
        assert_eq!(
            db2.redeem_token(&token2.token, "alice", token2.expires_at + 1).unwrap(),
            Redemption::Expired
        );
    }
}
