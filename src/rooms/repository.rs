// Room storage - membership changes are BEGIN IMMEDIATE transactions whose
// guards are re-checked in the write itself
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::db::models::{Member, Room};
use crate::db::{self, OptionalExt, RepositoryError};
use crate::rooms::domain::{RoomSettings, ShareToken, DEFAULT_DISPLAY_NAME, MAX_MEMBERS};
use crate::state::DbPool;
use crate::voting::{Ballot, DeletionState};

const TOKEN_ATTEMPTS: usize = 8;

/// A room as its members see it. Never carries the raw share token.
#[derive(Debug, Clone, Serialize)]
pub struct RoomView {
    pub room_id: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub members: Vec<Member>,
    pub member_count: usize,
    pub has_share_token: bool,
    pub share_token_expires_at: Option<String>,
    pub deletion_votes: usize,
    pub my_deletion_vote: bool,
    pub deletion_state: DeletionState,
    pub created_at: String,
    pub updated_at: String,
}

impl RoomView {
    fn new(room: Room, members: Vec<Member>, viewer: &str) -> Self {
        let ballot = Ballot::new(
            room.member_ids.iter().cloned(),
            room.deletion_votes.keys().cloned(),
        );
        let has_share_token = room.share_token.is_some()
            && !room.share_token_consumed
            && room
                .share_token_expires_at
                .as_deref()
                .map_or(true, |exp| exp > db::now().as_str());
        Self {
            room_id: room.id,
            display_name: room.display_name,
            description: room.description,
            member_count: members.len(),
            members,
            has_share_token,
            share_token_expires_at: if has_share_token {
                room.share_token_expires_at
            } else {
                None
            },
            deletion_votes: ballot.vote_count(),
            my_deletion_vote: ballot.has_voted(viewer),
            deletion_state: ballot.state(),
            created_at: room.created_at,
            updated_at: room.updated_at,
        }
    }
}

/// Share token handed to the member who rotated it, shown once.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: String,
}

/// Result of a member leaving.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Departure {
    pub room_id: String,
    pub room_deleted: bool,
}

#[async_trait]
pub trait RoomRepository: Send + Sync {
    async fn create(&self, user_id: &str) -> Result<RoomView, RepositoryError>;

    /// Replace the room's share token. Not idempotent: each call yields a new
    /// token and invalidates the last.
    async fn rotate_share_token(
        &self,
        user_id: &str,
        ttl_minutes: u64,
    ) -> Result<IssuedToken, RepositoryError>;

    async fn join(&self, user_id: &str, token: &ShareToken) -> Result<RoomView, RepositoryError>;

    /// The caller's room id, or `NotFound`.
    async fn room_id_of(&self, user_id: &str) -> Result<String, RepositoryError>;

    async fn view_for(&self, user_id: &str) -> Result<RoomView, RepositoryError>;

    async fn update_settings(
        &self,
        user_id: &str,
        settings: &RoomSettings,
    ) -> Result<RoomView, RepositoryError>;

    async fn leave(&self, user_id: &str) -> Result<Departure, RepositoryError>;
}

pub struct SqliteRoomRepository {
    pool: DbPool,
}

impl SqliteRoomRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomRepository for SqliteRoomRepository {
    async fn create(&self, user_id: &str) -> Result<RoomView, RepositoryError> {
        db::immediate(&self.pool, |conn| {
            if db::room_of(conn, user_id)?.is_some() {
                return Err(RepositoryError::Conflict("already a member of a room".into()));
            }

            let room_id = uuid::Uuid::now_v7().to_string();
            let now = db::now();
            conn.execute(
                "INSERT INTO rooms (id, display_name, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)",
                params![room_id, DEFAULT_DISPLAY_NAME, now],
            )?;
            insert_member(conn, &room_id, user_id, &now)?;

            tracing::info!("Room {} created", room_id);
            load_view(conn, &room_id, user_id)
        })
    }

    async fn rotate_share_token(
        &self,
        user_id: &str,
        ttl_minutes: u64,
    ) -> Result<IssuedToken, RepositoryError> {
        db::immediate(&self.pool, |conn| {
            let room_id = db::room_of(conn, user_id)?.ok_or(RepositoryError::NotFound("room"))?;
            if db::member_count(conn, &room_id)? >= MAX_MEMBERS {
                return Err(RepositoryError::Forbidden("room is full".into()));
            }

            let now = Utc::now();
            let expires_at = db::timestamp(ShareToken::expiry(now, ttl_minutes));

            for _ in 0..TOKEN_ATTEMPTS {
                let token = ShareToken::generate();
                let result = conn.execute(
                    "UPDATE rooms SET share_token = ?2, share_token_expires_at = ?3,
                         share_token_consumed = 0, updated_at = ?4
                     WHERE id = ?1",
                    params![room_id, token.as_str(), expires_at, db::timestamp(now)],
                );
                match result {
                    Ok(_) => {
                        tracing::info!("Share token rotated for room {}", room_id);
                        return Ok(IssuedToken {
                            token: token.as_str().to_string(),
                            expires_at,
                        });
                    }
                    Err(e) if db::is_unique_violation(&e) => continue,
                    Err(e) => return Err(e.into()),
                }
            }

            tracing::warn!("Share token space exhausted for room {}", room_id);
            Err(RepositoryError::Conflict(
                "could not allocate a share token, try again".into(),
            ))
        })
    }

    async fn join(&self, user_id: &str, token: &ShareToken) -> Result<RoomView, RepositoryError> {
        db::immediate(&self.pool, |conn| {
            if db::room_of(conn, user_id)?.is_some() {
                return Err(RepositoryError::Conflict("already a member of a room".into()));
            }

            let found: Option<(String, Option<String>, bool)> = conn
                .query_row(
                    "SELECT id, share_token_expires_at, share_token_consumed
                     FROM rooms WHERE share_token = ?1",
                    params![token.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;
            let (room_id, expires_at, consumed) = found.ok_or_else(|| {
                tracing::warn!("Join rejected: unknown share token");
                RepositoryError::Forbidden("invalid or expired share token".into())
            })?;

            if db::member_count(conn, &room_id)? >= MAX_MEMBERS {
                tracing::warn!("Join rejected: room {} is full", room_id);
                return Err(RepositoryError::Conflict("room is full".into()));
            }

            let now = db::now();
            let expired = expires_at.as_deref().is_some_and(|exp| exp <= now.as_str());
            if consumed || expired {
                tracing::warn!("Join rejected: stale share token for room {}", room_id);
                return Err(RepositoryError::Forbidden(
                    "invalid or expired share token".into(),
                ));
            }

            // Claim the token only while the room still has its single seat.
            let claimed = conn.execute(
                "UPDATE rooms SET share_token_consumed = 1, updated_at = ?3
                 WHERE id = ?1 AND share_token = ?2 AND share_token_consumed = 0
                   AND (SELECT COUNT(*) FROM room_members WHERE room_id = rooms.id) < ?4",
                params![room_id, token.as_str(), now, MAX_MEMBERS],
            )?;
            if claimed == 0 {
                return Err(RepositoryError::Conflict("room is full".into()));
            }

            insert_member(conn, &room_id, user_id, &now)?;

            tracing::info!("User {} joined room {}", user_id, room_id);
            load_view(conn, &room_id, user_id)
        })
    }

    async fn room_id_of(&self, user_id: &str) -> Result<String, RepositoryError> {
        let conn = self.pool.get()?;
        db::room_of(&conn, user_id)?.ok_or(RepositoryError::NotFound("room"))
    }

    async fn view_for(&self, user_id: &str) -> Result<RoomView, RepositoryError> {
        let conn = self.pool.get()?;
        let room_id = db::room_of(&conn, user_id)?.ok_or(RepositoryError::NotFound("room"))?;
        load_view(&conn, &room_id, user_id)
    }

    async fn update_settings(
        &self,
        user_id: &str,
        settings: &RoomSettings,
    ) -> Result<RoomView, RepositoryError> {
        db::immediate(&self.pool, |conn| {
            let room_id = db::room_of(conn, user_id)?.ok_or(RepositoryError::NotFound("room"))?;

            conn.execute(
                "UPDATE rooms SET
                     display_name = CASE WHEN ?2 THEN ?3 ELSE display_name END,
                     description = CASE WHEN ?4 THEN ?5 ELSE description END,
                     updated_at = ?6
                 WHERE id = ?1",
                params![
                    room_id,
                    settings.display_name.touched(),
                    settings.display_name.value(),
                    settings.description.touched(),
                    settings.description.value(),
                    db::now()
                ],
            )?;

            load_view(conn, &room_id, user_id)
        })
    }

    async fn leave(&self, user_id: &str) -> Result<Departure, RepositoryError> {
        db::immediate(&self.pool, |conn| {
            depart(conn, user_id)?.ok_or(RepositoryError::NotFound("room"))
        })
    }
}

/// Remove the user from their room, if any. The store purges their votes on
/// the room and its lists; an emptied room is deleted with everything in it.
/// Never finalizes a pending deletion.
pub fn depart(conn: &Connection, user_id: &str) -> Result<Option<Departure>, rusqlite::Error> {
    let Some(room_id) = db::room_of(conn, user_id)? else {
        return Ok(None);
    };

    conn.execute(
        "DELETE FROM room_members WHERE user_id = ?1",
        params![user_id],
    )?;

    let room_deleted = db::member_count(conn, &room_id)? == 0;
    if room_deleted {
        conn.execute("DELETE FROM rooms WHERE id = ?1", params![room_id])?;
        tracing::info!("Room {} deleted after last member left", room_id);
    } else {
        conn.execute(
            "UPDATE rooms SET updated_at = ?2 WHERE id = ?1",
            params![room_id, db::now()],
        )?;
        tracing::info!("User {} left room {}", user_id, room_id);
    }

    Ok(Some(Departure {
        room_id,
        room_deleted,
    }))
}

fn insert_member(
    conn: &Connection,
    room_id: &str,
    user_id: &str,
    joined_at: &str,
) -> Result<(), RepositoryError> {
    conn.execute(
        "INSERT INTO room_members (room_id, user_id, joined_at) VALUES (?1, ?2, ?3)",
        params![room_id, user_id, joined_at],
    )
    .map_err(|e| {
        if db::is_unique_violation(&e) {
            RepositoryError::Conflict("already a member of a room".into())
        } else {
            e.into()
        }
    })?;
    Ok(())
}

pub(crate) fn load_room(conn: &Connection, room_id: &str) -> Result<Room, RepositoryError> {
    let mut room = conn
        .query_row(
            "SELECT id, display_name, description, share_token, share_token_expires_at,
                    share_token_consumed, created_at, updated_at
             FROM rooms WHERE id = ?1",
            params![room_id],
            |row| {
                Ok(Room {
                    id: row.get(0)?,
                    display_name: row.get(1)?,
                    description: row.get(2)?,
                    share_token: row.get(3)?,
                    share_token_expires_at: row.get(4)?,
                    share_token_consumed: row.get(5)?,
                    member_ids: Vec::new(),
                    deletion_votes: BTreeMap::new(),
                    created_at: row.get(6)?,
                    updated_at: row.get(7)?,
                })
            },
        )
        .optional()?
        .ok_or(RepositoryError::NotFound("room"))?;

    room.member_ids = db::member_ids(conn, room_id)?;

    let mut stmt =
        conn.prepare("SELECT user_id, voted_at FROM room_deletion_votes WHERE room_id = ?1")?;
    room.deletion_votes = stmt
        .query_map(params![room_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<BTreeMap<String, String>, _>>()?;

    Ok(room)
}

fn load_members(conn: &Connection, room_id: &str) -> Result<Vec<Member>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT m.user_id, u.name, u.avatar_key, m.joined_at
         FROM room_members m JOIN users u ON u.id = m.user_id
         WHERE m.room_id = ?1 ORDER BY m.joined_at",
    )?;
    let members = stmt
        .query_map(params![room_id], |row| {
            Ok(Member {
                user_id: row.get(0)?,
                name: row.get(1)?,
                avatar_key: row.get(2)?,
                joined_at: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(members)
}

fn load_view(conn: &Connection, room_id: &str, viewer: &str) -> Result<RoomView, RepositoryError> {
    let room = load_room(conn, room_id)?;
    let members = load_members(conn, room_id)?;
    Ok(RoomView::new(room, members, viewer))
}
