// Vote storage - each cast or cancel is one BEGIN IMMEDIATE transaction
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::db::{self, RepositoryError};
use crate::state::DbPool;
use crate::voting::domain::{Ballot, DeletionState, VoteTarget};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoteOutcome {
    pub deleted: bool,
    pub state: DeletionState,
    pub votes: usize,
    pub members: usize,
}

impl VoteOutcome {
    fn from_ballot(ballot: &Ballot, members: usize, deleted: bool) -> Self {
        Self {
            deleted,
            state: if deleted {
                DeletionState::Deleted
            } else {
                ballot.state()
            },
            votes: ballot.vote_count(),
            members,
        }
    }
}

#[async_trait]
pub trait VoteRepository: Send + Sync {
    /// Record the caller's vote and delete the target if every current member
    /// has now voted.
    async fn cast(&self, target: &VoteTarget, user_id: &str)
        -> Result<VoteOutcome, RepositoryError>;

    /// Withdraw the caller's vote, if any.
    async fn cancel(
        &self,
        target: &VoteTarget,
        user_id: &str,
    ) -> Result<VoteOutcome, RepositoryError>;
}

pub struct SqliteVoteRepository {
    pool: DbPool,
}

impl SqliteVoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VoteRepository for SqliteVoteRepository {
    async fn cast(
        &self,
        target: &VoteTarget,
        user_id: &str,
    ) -> Result<VoteOutcome, RepositoryError> {
        db::immediate(&self.pool, |conn| {
            let ballot = load_ballot(conn, target, user_id)?;
            let members = db::member_count(conn, target.room_id())? as usize;
            let ballot = ballot
                .cast(user_id)
                .map_err(|e| RepositoryError::Forbidden(e.to_string()))?;

            insert_vote(conn, target, user_id)?;

            let deleted = ballot.is_unanimous() && finalize(conn, target)?;
            if deleted {
                tracing::info!(
                    "{} {} deleted by unanimous vote",
                    target.kind(),
                    target_id(target)
                );
            }
            Ok(VoteOutcome::from_ballot(&ballot, members, deleted))
        })
    }

    async fn cancel(
        &self,
        target: &VoteTarget,
        user_id: &str,
    ) -> Result<VoteOutcome, RepositoryError> {
        db::immediate(&self.pool, |conn| {
            let ballot = load_ballot(conn, target, user_id)?;
            let members = db::member_count(conn, target.room_id())? as usize;
            let ballot = ballot
                .retract(user_id)
                .map_err(|e| RepositoryError::Forbidden(e.to_string()))?;

            match target {
                VoteTarget::Room { room_id } => conn.execute(
                    "DELETE FROM room_deletion_votes WHERE room_id = ?1 AND user_id = ?2",
                    params![room_id, user_id],
                )?,
                VoteTarget::List { list_id, .. } => conn.execute(
                    "DELETE FROM list_deletion_votes WHERE list_id = ?1 AND user_id = ?2",
                    params![list_id, user_id],
                )?,
            };

            Ok(VoteOutcome::from_ballot(&ballot, members, false))
        })
    }
}

fn target_id(target: &VoteTarget) -> &str {
    match target {
        VoteTarget::Room { room_id } => room_id,
        VoteTarget::List { list_id, .. } => list_id,
    }
}

/// Check access and read the current members and votes for the target.
fn load_ballot(
    conn: &Connection,
    target: &VoteTarget,
    user_id: &str,
) -> Result<Ballot, RepositoryError> {
    db::require_room(conn, user_id, target.room_id())?;
    let members = db::member_ids(conn, target.room_id())?;

    let votes = match target {
        VoteTarget::Room { room_id } => {
            let mut stmt =
                conn.prepare("SELECT user_id FROM room_deletion_votes WHERE room_id = ?1")?;
            let votes = stmt
                .query_map(params![room_id], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            votes
        }
        VoteTarget::List { room_id, list_id } => {
            let live: bool = conn.query_row(
                "SELECT COUNT(*) > 0 FROM lists WHERE id = ?1 AND room_id = ?2 AND is_deleted = 0",
                params![list_id, room_id],
                |row| row.get(0),
            )?;
            if !live {
                return Err(RepositoryError::NotFound("list"));
            }
            let mut stmt =
                conn.prepare("SELECT user_id FROM list_deletion_votes WHERE list_id = ?1")?;
            let votes = stmt
                .query_map(params![list_id], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            votes
        }
    };

    Ok(Ballot::new(members, votes))
}

fn insert_vote(
    conn: &Connection,
    target: &VoteTarget,
    user_id: &str,
) -> Result<(), rusqlite::Error> {
    let now = db::now();
    match target {
        VoteTarget::Room { room_id } => conn.execute(
            "INSERT OR IGNORE INTO room_deletion_votes (room_id, user_id, voted_at)
             VALUES (?1, ?2, ?3)",
            params![room_id, user_id, now],
        )?,
        VoteTarget::List { room_id, list_id } => conn.execute(
            "INSERT OR IGNORE INTO list_deletion_votes (list_id, room_id, user_id, voted_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![list_id, room_id, user_id, now],
        )?,
    };
    Ok(())
}

/// Delete the target only if the stored votes still cover every member.
/// Returns whether anything was deleted.
fn finalize(conn: &Connection, target: &VoteTarget) -> Result<bool, rusqlite::Error> {
    match target {
        VoteTarget::Room { room_id } => {
            let rows = conn.execute(
                "DELETE FROM rooms WHERE id = ?1 AND NOT EXISTS (
                     SELECT 1 FROM room_members m
                     WHERE m.room_id = rooms.id AND NOT EXISTS (
                         SELECT 1 FROM room_deletion_votes v
                         WHERE v.room_id = m.room_id AND v.user_id = m.user_id))",
                params![room_id],
            )?;
            Ok(rows == 1)
        }
        VoteTarget::List { room_id, list_id } => {
            let rows = conn.execute(
                "UPDATE lists SET is_deleted = 1, updated_at = ?3
                 WHERE id = ?1 AND room_id = ?2 AND is_deleted = 0 AND NOT EXISTS (
                     SELECT 1 FROM room_members m
                     WHERE m.room_id = lists.room_id AND NOT EXISTS (
                         SELECT 1 FROM list_deletion_votes v
                         WHERE v.list_id = lists.id AND v.user_id = m.user_id))",
                params![list_id, room_id, db::now()],
            )?;
            if rows == 0 {
                return Ok(false);
            }
            conn.execute(
                "DELETE FROM list_items WHERE list_id = ?1",
                params![list_id],
            )?;
            conn.execute(
                "DELETE FROM list_deletion_votes WHERE list_id = ?1",
                params![list_id],
            )?;
            Ok(true)
        }
    }
}
