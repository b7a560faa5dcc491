use chrono::{Duration, Utc};
use rand::Rng;
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};

use crate::db::{self, OptionalExt};

/// Bearer credential handed to a client. Only its digest is ever stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// 32 random bytes, hex encoded.
    pub fn generate() -> Self {
        let bytes: [u8; 32] = rand::thread_rng().gen();
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn digest(&self) -> String {
        digest(&self.0)
    }
}

pub fn digest(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Store a new key for the user and return the plaintext once.
pub fn issue(conn: &Connection, user_id: &str, ttl_hours: u64) -> Result<ApiKey, rusqlite::Error> {
    let now = Utc::now();
    let expires_at = now + Duration::hours(ttl_hours as i64);

    conn.execute(
        "DELETE FROM api_keys WHERE user_id = ?1 AND expires_at <= ?2",
        params![user_id, db::timestamp(now)],
    )?;

    let key = ApiKey::generate();
    conn.execute(
        "INSERT INTO api_keys (key_hash, user_id, expires_at, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            key.digest(),
            user_id,
            db::timestamp(expires_at),
            db::timestamp(now)
        ],
    )?;

    Ok(key)
}

/// User id owning an unexpired key with this digest.
pub fn lookup(conn: &Connection, key_hash: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT user_id FROM api_keys WHERE key_hash = ?1 AND expires_at > ?2",
        params![key_hash, db::now()],
        |row| row.get(0),
    )
    .optional()
}

pub fn revoke(conn: &Connection, key_hash: &str) -> Result<bool, rusqlite::Error> {
    let rows = conn.execute("DELETE FROM api_keys WHERE key_hash = ?1", params![key_hash])?;
    Ok(rows > 0)
}

pub fn revoke_all(conn: &Connection, user_id: &str) -> Result<usize, rusqlite::Error> {
    conn.execute("DELETE FROM api_keys WHERE user_id = ?1", params![user_id])
}
