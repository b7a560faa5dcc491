use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::accounts::domain::{generate_avatar_key, ProfileUpdate, Username};
use crate::auth::{api_keys, ApiKey};
use crate::db::models::User;
use crate::db::{self, OptionalExt, RepositoryError};
use crate::rooms::repository::depart;
use crate::state::DbPool;

/// A user together with the room they currently belong to.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    #[serde(flatten)]
    pub user: User,
    pub room_id: Option<String>,
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Create the user and their first api key together.
    async fn create(
        &self,
        username: &Username,
        password_hash: &str,
        name: &str,
        key_ttl_hours: u64,
    ) -> Result<(User, ApiKey), RepositoryError>;

    async fn find_by_username(&self, username: &Username)
        -> Result<Option<User>, RepositoryError>;

    async fn profile(&self, user_id: &str) -> Result<Profile, RepositoryError>;

    async fn issue_key(&self, user_id: &str, ttl_hours: u64) -> Result<ApiKey, RepositoryError>;

    async fn revoke_key(&self, key_hash: &str) -> Result<bool, RepositoryError>;

    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<Profile, RepositoryError>;

    /// Store a new password hash, drop every existing key and issue a fresh one.
    async fn replace_password(
        &self,
        user_id: &str,
        password_hash: &str,
        key_ttl_hours: u64,
    ) -> Result<ApiKey, RepositoryError>;

    /// Leave the room (deleting it if emptied) and remove the user.
    async fn delete(&self, user_id: &str) -> Result<(), RepositoryError>;
}

pub struct SqliteAccountRepository {
    pool: DbPool,
}

impl SqliteAccountRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for SqliteAccountRepository {
    async fn create(
        &self,
        username: &Username,
        password_hash: &str,
        name: &str,
        key_ttl_hours: u64,
    ) -> Result<(User, ApiKey), RepositoryError> {
        db::immediate(&self.pool, |conn| {
            let id = uuid::Uuid::now_v7().to_string();
            let now = db::now();
            conn.execute(
                "INSERT INTO users (id, username, password_hash, name, avatar_key, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    id,
                    username.as_str(),
                    password_hash,
                    name,
                    generate_avatar_key(),
                    now
                ],
            )
            .map_err(username_taken)?;

            let key = api_keys::issue(conn, &id, key_ttl_hours)?;
            let user = load_user(conn, &id)?;
            tracing::info!("User {} registered", id);
            Ok((user, key))
        })
    }

    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                &format!("{} WHERE username = ?1", SELECT_USER),
                params![username.as_str()],
                map_user,
            )
            .optional()?;
        Ok(user)
    }

    async fn profile(&self, user_id: &str) -> Result<Profile, RepositoryError> {
        let conn = self.pool.get()?;
        load_profile(&conn, user_id)
    }

    async fn issue_key(&self, user_id: &str, ttl_hours: u64) -> Result<ApiKey, RepositoryError> {
        let conn = self.pool.get()?;
        Ok(api_keys::issue(&conn, user_id, ttl_hours)?)
    }

    async fn revoke_key(&self, key_hash: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        Ok(api_keys::revoke(&conn, key_hash)?)
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<Profile, RepositoryError> {
        db::immediate(&self.pool, |conn| {
            conn.execute(
                "UPDATE users SET
                     name = COALESCE(?2, name),
                     username = COALESCE(?3, username),
                     updated_at = ?4
                 WHERE id = ?1",
                params![
                    user_id,
                    update.name,
                    update.username.as_ref().map(Username::as_str),
                    db::now()
                ],
            )
            .map_err(username_taken)?;
            load_profile(conn, user_id)
        })
    }

    async fn replace_password(
        &self,
        user_id: &str,
        password_hash: &str,
        key_ttl_hours: u64,
    ) -> Result<ApiKey, RepositoryError> {
        db::immediate(&self.pool, |conn| {
            let rows = conn.execute(
                "UPDATE users SET password_hash = ?2, updated_at = ?3 WHERE id = ?1",
                params![user_id, password_hash, db::now()],
            )?;
            if rows == 0 {
                return Err(RepositoryError::NotFound("user"));
            }
            let revoked = api_keys::revoke_all(conn, user_id)?;
            tracing::info!("Password changed for {}; {} keys revoked", user_id, revoked);
            Ok(api_keys::issue(conn, user_id, key_ttl_hours)?)
        })
    }

    async fn delete(&self, user_id: &str) -> Result<(), RepositoryError> {
        db::immediate(&self.pool, |conn| {
            depart(conn, user_id)?;
            let rows = conn.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
            if rows == 0 {
                return Err(RepositoryError::NotFound("user"));
            }
            tracing::info!("User {} deleted their account", user_id);
            Ok(())
        })
    }
}

const SELECT_USER: &str =
    "SELECT id, username, password_hash, name, avatar_key, created_at, updated_at FROM users";

fn map_user(row: &rusqlite::Row<'_>) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        name: row.get(3)?,
        avatar_key: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn load_user(conn: &Connection, user_id: &str) -> Result<User, RepositoryError> {
    conn.query_row(
        &format!("{} WHERE id = ?1", SELECT_USER),
        params![user_id],
        map_user,
    )
    .optional()?
    .ok_or(RepositoryError::NotFound("user"))
}

fn load_profile(conn: &Connection, user_id: &str) -> Result<Profile, RepositoryError> {
    let user = load_user(conn, user_id)?;
    let room_id = db::room_of(conn, user_id)?;
    Ok(Profile { user, room_id })
}

fn username_taken(e: rusqlite::Error) -> RepositoryError {
    if db::is_unique_violation(&e) {
        RepositoryError::Conflict("username already taken".into())
    } else {
        e.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rooms::{RoomRepository, SqliteRoomRepository};
    use tempfile::TempDir;

    fn create_test_repo() -> (SqliteAccountRepository, DbPool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = db::create_pool(&temp_dir.path().join("test.db")).unwrap();
        db::run_migrations(&pool).unwrap();
        (SqliteAccountRepository::new(pool.clone()), pool, temp_dir)
    }

    fn username(raw: &str) -> Username {
        Username::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn create_then_find() {
        let (repo, pool, _temp) = create_test_repo();
        let (user, key) = repo
            .create(&username("Alice"), "hash", "Alice", 1)
            .await
            .unwrap();
        assert_eq!(user.username, "alice");
        assert!(!user.avatar_key.is_empty());

        let found = repo.find_by_username(&username("alice")).await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id.clone()));

        let conn = pool.get().unwrap();
        assert_eq!(
            api_keys::lookup(&conn, &key.digest()).unwrap(),
            Some(user.id)
        );
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let (repo, _pool, _temp) = create_test_repo();
        repo.create(&username("alice"), "h", "A", 1).await.unwrap();
        let err = repo
            .create(&username("ALICE"), "h", "B", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn profile_update_keeps_unspecified_fields() {
        let (repo, _pool, _temp) = create_test_repo();
        let (user, _) = repo.create(&username("alice"), "h", "Alice", 1).await.unwrap();

        let update = ProfileUpdate::parse(Some("Ally"), None).unwrap();
        let profile = repo.update_profile(&user.id, &update).await.unwrap();
        assert_eq!(profile.user.name, "Ally");
        assert_eq!(profile.user.username, "alice");
        assert!(profile.room_id.is_none());
    }

    #[tokio::test]
    async fn replace_password_rotates_keys() {
        let (repo, pool, _temp) = create_test_repo();
        let (user, first) = repo.create(&username("alice"), "h", "Alice", 1).await.unwrap();
        let second = repo.issue_key(&user.id, 1).await.unwrap();

        let fresh = repo.replace_password(&user.id, "h2", 1).await.unwrap();

        let conn = pool.get().unwrap();
        assert!(api_keys::lookup(&conn, &first.digest()).unwrap().is_none());
        assert!(api_keys::lookup(&conn, &second.digest()).unwrap().is_none());
        assert!(api_keys::lookup(&conn, &fresh.digest()).unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_removes_user_and_empty_room() {
        let (repo, pool, _temp) = create_test_repo();
        let (user, key) = repo.create(&username("alice"), "h", "Alice", 1).await.unwrap();
        let rooms = SqliteRoomRepository::new(pool.clone());
        rooms.create(&user.id).await.unwrap();

        repo.delete(&user.id).await.unwrap();

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM rooms", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
        assert!(api_keys::lookup(&conn, &key.digest()).unwrap().is_none());
        assert!(repo.find_by_username(&username("alice")).await.unwrap().is_none());
    }
}
