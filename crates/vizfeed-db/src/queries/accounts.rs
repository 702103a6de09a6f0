use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};

use super::OptionalExt;
use crate::Database;
use crate::models::{AccountRow, NewAccount, parse_timestamp};

const ACCOUNT_SELECT: &str = "SELECT u.id, u.email, u.password, u.email_confirmed,
        p.username, p.avatar_url, p.is_admin, u.created_at
     FROM users u
     JOIN profiles p ON p.id = u.id";

/// Purpose tag stored alongside single-use tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    ConfirmEmail,
    PasswordReset,
}

impl TokenPurpose {
    fn as_str(self) -> &'static str {
        match self {
            Self::ConfirmEmail => "confirm_email",
            Self::PasswordReset => "password_reset",
        }
    }
}

impl Database {
    // -- Accounts --

    /// Creates the identity and its profile together; either both rows exist
    /// afterwards or neither does.
    pub fn create_account(&self, account: &NewAccount<'_>) -> Result<()> {
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO users (id, email, password, email_confirmed) VALUES (?1, ?2, ?3, ?4)",
                params![
                    account.id,
                    account.email,
                    account.password_hash,
                    account.email_confirmed
                ],
            )?;
            tx.execute(
                "INSERT INTO profiles (id, username, is_admin) VALUES (?1, ?2, ?3)",
                params![account.id, account.username, account.is_admin],
            )?;
            Ok(())
        })
    }

    pub fn get_account_by_email(&self, email: &str) -> Result<Option<AccountRow>> {
        self.with_conn(|conn| query_account(conn, "u.email = ?1", email))
    }

    pub fn get_account(&self, id: &str) -> Result<Option<AccountRow>> {
        self.with_conn(|conn| query_account(conn, "u.id = ?1", id))
    }

    pub fn username_taken(&self, username: &str, except_id: Option<&str>) -> Result<bool> {
        self.with_conn(|conn| {
            let taken = conn
                .query_row(
                    "SELECT 1 FROM profiles WHERE username = ?1 AND (?2 IS NULL OR id != ?2)",
                    params![username, except_id],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            Ok(taken)
        })
    }

    /// Updates whichever profile fields are `Some`. Returns false if no such profile.
    pub fn update_profile(
        &self,
        id: &str,
        username: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE profiles
                 SET username = COALESCE(?2, username),
                     avatar_url = COALESCE(?3, avatar_url)
                 WHERE id = ?1",
                params![id, username, avatar_url],
            )?;
            Ok(changed == 1)
        })
    }

    pub fn set_password(&self, user_id: &str, password_hash: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET password = ?2 WHERE id = ?1",
                params![user_id, password_hash],
            )?;
            Ok(())
        })
    }

    pub fn confirm_email(&self, user_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET email_confirmed = 1 WHERE id = ?1",
                [user_id],
            )?;
            Ok(())
        })
    }

    // -- Single-use tokens --

    pub fn insert_auth_token(
        &self,
        token_hash: &str,
        user_id: &str,
        purpose: TokenPurpose,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO auth_tokens (token_hash, user_id, purpose, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![token_hash, user_id, purpose.as_str(), expires_at.to_rfc3339()],
            )?;
            Ok(())
        })
    }

    /// Marks a live token as used and returns its user id. Unknown, expired,
    /// already-used or wrong-purpose tokens yield `None`.
    pub fn consume_auth_token(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
        now: DateTime<Utc>,
    ) -> Result<Option<String>> {
        self.with_tx(|tx| {
            let found: Option<(String, String)> = tx
                .query_row(
                    "SELECT user_id, expires_at FROM auth_tokens
                     WHERE token_hash = ?1 AND purpose = ?2 AND used_at IS NULL",
                    params![token_hash, purpose.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((user_id, expires_at)) = found else {
                return Ok(None);
            };
            if parse_timestamp(&expires_at) <= now {
                return Ok(None);
            }

            tx.execute(
                "UPDATE auth_tokens SET used_at = ?2 WHERE token_hash = ?1",
                params![token_hash, now.to_rfc3339()],
            )?;
            Ok(Some(user_id))
        })
    }
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<AccountRow> {
    Ok(AccountRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        email_confirmed: row.get(3)?,
        username: row.get(4)?,
        avatar_url: row.get(5)?,
        is_admin: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn query_account(conn: &Connection, predicate: &str, value: &str) -> Result<Option<AccountRow>> {
    let sql = format!("{ACCOUNT_SELECT} WHERE {predicate}");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([value], account_from_row).optional()?;
    Ok(row)
}
