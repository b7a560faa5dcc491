pub mod models;

use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, ErrorCode};
use std::path::Path;
use thiserror::Error;

use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_initial",
        include_str!("../../migrations/001_initial.sql"),
    ),
    ("002_lists", include_str!("../../migrations/002_lists.sql")),
    (
        "003_item_starred",
        include_str!("../../migrations/003_item_starred.sql"),
    ),
];

/// Store-level failures shared by every repository.
///
/// Business-rule outcomes (`NotFound`, `Forbidden`, `Conflict`, `Validation`)
/// are decided inside the same transaction as the write they guard, which is
/// why they live here rather than in the domain modules.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Not found: {0}")]
    NotFound(&'static str),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid: {0}")]
    Validation(String),
}

pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // foreign_keys and busy_timeout are per-connection, so every pooled
    // connection gets them, not just the first one.
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            ",
        )
    });
    let pool = Pool::builder().max_size(8).build(manager)?;

    let conn = pool.get()?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        ",
    )?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    // Create migrations tracking table
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    tracing::info!("Database migrations complete");
    Ok(())
}

/// Run `f` inside a `BEGIN IMMEDIATE` transaction: the write lock is taken
/// up front, so every read `f` performs is still true when it writes.
pub fn immediate<T, F>(pool: &DbPool, f: F) -> Result<T, RepositoryError>
where
    F: FnOnce(&Connection) -> Result<T, RepositoryError>,
{
    let conn = pool.get()?;
    conn.execute_batch("BEGIN IMMEDIATE")?;

    match f(&*conn) {
        Ok(value) => match conn.execute_batch("COMMIT") {
            Ok(()) => Ok(value),
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                Err(e.into())
            }
        },
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

/// Fixed-width RFC 3339 timestamp; sorts lexically in time order.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now() -> String {
    timestamp(Utc::now())
}

pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

/// Extension trait for optional query results
pub trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Room the user currently belongs to, if any.
pub fn room_of(conn: &Connection, user_id: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT room_id FROM room_members WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )
    .optional()
}

pub fn member_count(conn: &Connection, room_id: &str) -> Result<i64, rusqlite::Error> {
    conn.query_row(
        "SELECT COUNT(*) FROM room_members WHERE room_id = ?1",
        params![room_id],
        |row| row.get(0),
    )
}

pub fn member_ids(conn: &Connection, room_id: &str) -> Result<Vec<String>, rusqlite::Error> {
    let mut stmt =
        conn.prepare("SELECT user_id FROM room_members WHERE room_id = ?1 ORDER BY joined_at")?;
    let ids = stmt
        .query_map(params![room_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

/// Resolve the caller's room and check it is the one named in the request.
///
/// A room id that is not the caller's own is rejected the same way whether or
/// not it exists, so nothing leaks across households.
pub fn require_room(
    conn: &Connection,
    user_id: &str,
    room_id: &str,
) -> Result<(), RepositoryError> {
    match room_of(conn, user_id)? {
        Some(own) if own == room_id => Ok(()),
        _ => Err(RepositoryError::Forbidden(
            "not a member of this room".into(),
        )),
    }
}
