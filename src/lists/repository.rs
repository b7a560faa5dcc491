// List and item storage, always scoped by room and list
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::db::models::{List, ListItem};
use crate::db::{self, OptionalExt, RepositoryError};
use crate::lists::domain::{ItemUpdate, ListUpdate, NewItem, NewList};
use crate::lists::ordering::{self, KeyChoice, Placement};
use crate::state::DbPool;
use crate::voting::{Ballot, DeletionState};

/// A list as one member sees it.
#[derive(Debug, Clone, Serialize)]
pub struct ListView {
    #[serde(flatten)]
    pub list: List,
    pub my_deletion_vote: bool,
    pub pending_deletion: bool,
    pub deletion_state: DeletionState,
}

impl ListView {
    fn new(list: List, members: &[String], viewer: &str) -> Self {
        let ballot = Ballot::new(
            members.iter().cloned(),
            list.deletion_votes.keys().cloned(),
        );
        Self {
            my_deletion_vote: ballot.has_voted(viewer),
            pending_deletion: ballot.state() == DeletionState::PendingDeletion,
            deletion_state: ballot.state(),
            list,
        }
    }
}

/// Neighbours named by a reorder request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Neighbours {
    pub prev_id: Option<String>,
    pub next_id: Option<String>,
}

#[async_trait]
pub trait ListRepository: Send + Sync {
    async fn lists(&self, user_id: &str, room_id: &str) -> Result<Vec<ListView>, RepositoryError>;

    async fn list(
        &self,
        user_id: &str,
        room_id: &str,
        list_id: &str,
    ) -> Result<ListView, RepositoryError>;

    async fn create_list(
        &self,
        user_id: &str,
        room_id: &str,
        list: &NewList,
    ) -> Result<ListView, RepositoryError>;

    async fn update_list(
        &self,
        user_id: &str,
        room_id: &str,
        list_id: &str,
        update: &ListUpdate,
    ) -> Result<ListView, RepositoryError>;

    /// Incomplete items by position, then (when asked) completed items, most
    /// recently changed first.
    async fn items(
        &self,
        user_id: &str,
        room_id: &str,
        list_id: &str,
        include_completed: bool,
    ) -> Result<Vec<ListItem>, RepositoryError>;

    async fn create_item(
        &self,
        user_id: &str,
        room_id: &str,
        list_id: &str,
        item: &NewItem,
    ) -> Result<ListItem, RepositoryError>;

    async fn update_item(
        &self,
        user_id: &str,
        room_id: &str,
        list_id: &str,
        item_id: &str,
        update: &ItemUpdate,
    ) -> Result<ListItem, RepositoryError>;

    async fn delete_item(
        &self,
        user_id: &str,
        room_id: &str,
        list_id: &str,
        item_id: &str,
    ) -> Result<(), RepositoryError>;

    async fn reorder_item(
        &self,
        user_id: &str,
        room_id: &str,
        list_id: &str,
        item_id: &str,
        neighbours: &Neighbours,
    ) -> Result<ListItem, RepositoryError>;

    /// Remove every completed item; returns how many went.
    async fn clear_completed(
        &self,
        user_id: &str,
        room_id: &str,
        list_id: &str,
    ) -> Result<usize, RepositoryError>;
}

pub struct SqliteListRepository {
    pool: DbPool,
}

impl SqliteListRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ListRepository for SqliteListRepository {
    async fn lists(&self, user_id: &str, room_id: &str) -> Result<Vec<ListView>, RepositoryError> {
        let conn = self.pool.get()?;
        db::require_room(&conn, user_id, room_id)?;

        let members = db::member_ids(&conn, room_id)?;
        let mut votes = room_list_votes(&conn, room_id)?;

        let mut stmt = conn.prepare(&format!(
            "{} WHERE room_id = ?1 AND is_deleted = 0 ORDER BY created_at, id",
            SELECT_LIST
        ))?;
        let lists = stmt
            .query_map(params![room_id], map_list)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(lists
            .into_iter()
            .map(|mut list| {
                list.deletion_votes = votes.remove(&list.id).unwrap_or_default();
                ListView::new(list, &members, user_id)
            })
            .collect())
    }

    async fn list(
        &self,
        user_id: &str,
        room_id: &str,
        list_id: &str,
    ) -> Result<ListView, RepositoryError> {
        let conn = self.pool.get()?;
        db::require_room(&conn, user_id, room_id)?;
        load_view(&conn, room_id, list_id, user_id)
    }

    async fn create_list(
        &self,
        user_id: &str,
        room_id: &str,
        list: &NewList,
    ) -> Result<ListView, RepositoryError> {
        db::immediate(&self.pool, |conn| {
            db::require_room(conn, user_id, room_id)?;

            let id = uuid::Uuid::now_v7().to_string();
            conn.execute(
                "INSERT INTO lists (id, room_id, name, description, icon, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    id,
                    room_id,
                    list.name,
                    list.description,
                    list.icon.map(|i| i.as_str()),
                    db::now()
                ],
            )?;

            tracing::info!("List {} created in room {}", id, room_id);
            load_view(conn, room_id, &id, user_id)
        })
    }

    async fn update_list(
        &self,
        user_id: &str,
        room_id: &str,
        list_id: &str,
        update: &ListUpdate,
    ) -> Result<ListView, RepositoryError> {
        db::immediate(&self.pool, |conn| {
            db::require_room(conn, user_id, room_id)?;

            let rows = conn.execute(
                "UPDATE lists SET
                     name = COALESCE(?3, name),
                     description = CASE WHEN ?4 THEN ?5 ELSE description END,
                     notes = CASE WHEN ?6 THEN ?7 ELSE notes END,
                     icon = CASE WHEN ?8 THEN ?9 ELSE icon END,
                     updated_at = ?10
                 WHERE id = ?1 AND room_id = ?2 AND is_deleted = 0",
                params![
                    list_id,
                    room_id,
                    update.name,
                    update.description.touched(),
                    update.description.value(),
                    update.notes.touched(),
                    update.notes.value(),
                    update.icon.touched(),
                    update.icon_value(),
                    db::now()
                ],
            )?;
            if rows == 0 {
                return Err(RepositoryError::NotFound("list"));
            }

            load_view(conn, room_id, list_id, user_id)
        })
    }

    async fn items(
        &self,
        user_id: &str,
        room_id: &str,
        list_id: &str,
        include_completed: bool,
    ) -> Result<Vec<ListItem>, RepositoryError> {
        let conn = self.pool.get()?;
        db::require_room(&conn, user_id, room_id)?;
        require_list(&conn, room_id, list_id)?;

        let mut items = query_items(
            &conn,
            "WHERE list_id = ?1 AND completed = 0 ORDER BY sort_order, created_at, id",
            list_id,
        )?;
        if include_completed {
            items.extend(query_items(
                &conn,
                "WHERE list_id = ?1 AND completed = 1 ORDER BY updated_at DESC, id DESC",
                list_id,
            )?);
        }
        Ok(items)
    }

    async fn create_item(
        &self,
        user_id: &str,
        room_id: &str,
        list_id: &str,
        item: &NewItem,
    ) -> Result<ListItem, RepositoryError> {
        db::immediate(&self.pool, |conn| {
            db::require_room(conn, user_id, room_id)?;
            require_list(conn, room_id, list_id)?;

            let id = uuid::Uuid::now_v7().to_string();
            let order = ordering::append_key(max_order(conn, list_id, None)?);
            conn.execute(
                "INSERT INTO list_items
                     (id, list_id, room_id, description, quantity, unit, category,
                      completed, sort_order, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?9, ?9)",
                params![
                    id,
                    list_id,
                    room_id,
                    item.description,
                    item.quantity,
                    item.unit,
                    item.category,
                    order,
                    db::now()
                ],
            )?;

            load_item(conn, list_id, &id)
        })
    }

    async fn update_item(
        &self,
        user_id: &str,
        room_id: &str,
        list_id: &str,
        item_id: &str,
        update: &ItemUpdate,
    ) -> Result<ListItem, RepositoryError> {
        db::immediate(&self.pool, |conn| {
            db::require_room(conn, user_id, room_id)?;
            require_list(conn, room_id, list_id)?;

            // Position is left alone: completion only moves an item between
            // partitions. A reopened item whose old key was taken while it
            // was completed goes to the end instead.
            if update.completed == Some(false) && key_taken_on_reopen(conn, list_id, item_id)? {
                let key = ordering::append_key(max_order(conn, list_id, Some(item_id))?);
                conn.execute(
                    "UPDATE list_items SET sort_order = ?2 WHERE id = ?1",
                    params![item_id, key],
                )?;
            }

            let rows = conn.execute(
                "UPDATE list_items SET
                     description = COALESCE(?3, description),
                     completed = COALESCE(?4, completed),
                     starred = COALESCE(?12, starred),
                     quantity = CASE WHEN ?5 THEN ?6 ELSE quantity END,
                     unit = CASE WHEN ?7 THEN ?8 ELSE unit END,
                     category = CASE WHEN ?9 THEN ?10 ELSE category END,
                     updated_at = ?11
                 WHERE id = ?1 AND list_id = ?2",
                params![
                    item_id,
                    list_id,
                    update.description,
                    update.completed,
                    update.quantity.touched(),
                    update.quantity.value(),
                    update.unit.touched(),
                    update.unit.value(),
                    update.category.touched(),
                    update.category.value(),
                    db::now(),
                    update.starred
                ],
            )?;
            if rows == 0 {
                return Err(RepositoryError::NotFound("item"));
            }

            load_item(conn, list_id, item_id)
        })
    }

    async fn delete_item(
        &self,
        user_id: &str,
        room_id: &str,
        list_id: &str,
        item_id: &str,
    ) -> Result<(), RepositoryError> {
        db::immediate(&self.pool, |conn| {
            db::require_room(conn, user_id, room_id)?;
            require_list(conn, room_id, list_id)?;

            let rows = conn.execute(
                "DELETE FROM list_items WHERE id = ?1 AND list_id = ?2",
                params![item_id, list_id],
            )?;
            if rows == 0 {
                return Err(RepositoryError::NotFound("item"));
            }
            Ok(())
        })
    }

    async fn reorder_item(
        &self,
        user_id: &str,
        room_id: &str,
        list_id: &str,
        item_id: &str,
        neighbours: &Neighbours,
    ) -> Result<ListItem, RepositoryError> {
        db::immediate(&self.pool, |conn| {
            db::require_room(conn, user_id, room_id)?;
            require_list(conn, room_id, list_id)?;

            let item = load_item(conn, list_id, item_id)?;
            if item.completed {
                return Err(RepositoryError::Validation(
                    "completed items cannot be reordered".into(),
                ));
            }

            let key = match choose_key(conn, list_id, item_id, neighbours)? {
                KeyChoice::Key(key) => key,
                KeyChoice::Renumber => {
                    renumber(conn, list_id, item_id)?;
                    match choose_key(conn, list_id, item_id, neighbours)? {
                        KeyChoice::Key(key) => key,
                        _ => {
                            return Err(RepositoryError::Conflict(
                                "list changed, refresh and retry".into(),
                            ))
                        }
                    }
                }
                KeyChoice::Inverted => {
                    return Err(RepositoryError::Conflict(
                        "list changed, refresh and retry".into(),
                    ))
                }
            };

            conn.execute(
                "UPDATE list_items SET sort_order = ?3, updated_at = ?4
                 WHERE id = ?1 AND list_id = ?2",
                params![item_id, list_id, key, db::now()],
            )?;

            load_item(conn, list_id, item_id)
        })
    }

    async fn clear_completed(
        &self,
        user_id: &str,
        room_id: &str,
        list_id: &str,
    ) -> Result<usize, RepositoryError> {
        db::immediate(&self.pool, |conn| {
            db::require_room(conn, user_id, room_id)?;
            require_list(conn, room_id, list_id)?;

            let cleared = conn.execute(
                "DELETE FROM list_items WHERE list_id = ?1 AND completed = 1",
                params![list_id],
            )?;
            tracing::info!("Cleared {} completed items from list {}", cleared, list_id);
            Ok(cleared)
        })
    }
}

const SELECT_LIST: &str = "SELECT id, room_id, name, description, notes, icon, is_deleted, \
                           created_at, updated_at FROM lists";

const SELECT_ITEM: &str = "SELECT id, list_id, room_id, description, quantity, unit, category, \
                           completed, starred, sort_order, created_at, updated_at FROM list_items";

fn map_list(row: &rusqlite::Row<'_>) -> Result<List, rusqlite::Error> {
    Ok(List {
        id: row.get(0)?,
        room_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        notes: row.get(4)?,
        icon: row.get(5)?,
        deletion_votes: BTreeMap::new(),
        is_deleted: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn map_item(row: &rusqlite::Row<'_>) -> Result<ListItem, rusqlite::Error> {
    Ok(ListItem {
        id: row.get(0)?,
        list_id: row.get(1)?,
        room_id: row.get(2)?,
        description: row.get(3)?,
        quantity: row.get(4)?,
        unit: row.get(5)?,
        category: row.get(6)?,
        completed: row.get(7)?,
        starred: row.get(8)?,
        order: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

/// Tombstoned lists and lists of other rooms are equally invisible.
fn require_list(conn: &Connection, room_id: &str, list_id: &str) -> Result<(), RepositoryError> {
    let live: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM lists WHERE id = ?1 AND room_id = ?2 AND is_deleted = 0",
        params![list_id, room_id],
        |row| row.get(0),
    )?;
    if live {
        Ok(())
    } else {
        Err(RepositoryError::NotFound("list"))
    }
}

fn room_list_votes(
    conn: &Connection,
    room_id: &str,
) -> Result<BTreeMap<String, BTreeMap<String, String>>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT list_id, user_id, voted_at FROM list_deletion_votes WHERE room_id = ?1",
    )?;
    let mut votes: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    let rows = stmt.query_map(params![room_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;
    for row in rows {
        let (list_id, user_id, voted_at) = row?;
        votes.entry(list_id).or_default().insert(user_id, voted_at);
    }
    Ok(votes)
}

fn load_view(
    conn: &Connection,
    room_id: &str,
    list_id: &str,
    viewer: &str,
) -> Result<ListView, RepositoryError> {
    let mut list = conn
        .query_row(
            &format!(
                "{} WHERE id = ?1 AND room_id = ?2 AND is_deleted = 0",
                SELECT_LIST
            ),
            params![list_id, room_id],
            map_list,
        )
        .optional()?
        .ok_or(RepositoryError::NotFound("list"))?;

    let mut stmt =
        conn.prepare("SELECT user_id, voted_at FROM list_deletion_votes WHERE list_id = ?1")?;
    list.deletion_votes = stmt
        .query_map(params![list_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<BTreeMap<String, String>, _>>()?;

    let members = db::member_ids(conn, room_id)?;
    Ok(ListView::new(list, &members, viewer))
}

fn query_items(
    conn: &Connection,
    clause: &str,
    list_id: &str,
) -> Result<Vec<ListItem>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!("{} {}", SELECT_ITEM, clause))?;
    let items = stmt
        .query_map(params![list_id], map_item)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

fn load_item(conn: &Connection, list_id: &str, item_id: &str) -> Result<ListItem, RepositoryError> {
    conn.query_row(
        &format!("{} WHERE id = ?1 AND list_id = ?2", SELECT_ITEM),
        params![item_id, list_id],
        map_item,
    )
    .optional()?
    .ok_or(RepositoryError::NotFound("item"))
}

fn max_order(
    conn: &Connection,
    list_id: &str,
    excluding: Option<&str>,
) -> Result<Option<f64>, rusqlite::Error> {
    conn.query_row(
        "SELECT MAX(sort_order) FROM list_items WHERE list_id = ?1 AND id IS NOT ?2",
        params![list_id, excluding],
        |row| row.get(0),
    )
}

/// Whether `item_id` is completed and another incomplete item now holds its key.
fn key_taken_on_reopen(
    conn: &Connection,
    list_id: &str,
    item_id: &str,
) -> Result<bool, rusqlite::Error> {
    conn.query_row(
        "SELECT EXISTS (
             SELECT 1 FROM list_items AS item
             JOIN list_items AS other
               ON other.list_id = item.list_id AND other.id != item.id
             WHERE item.id = ?1 AND item.list_id = ?2 AND item.completed = 1
               AND other.completed = 0 AND other.sort_order = item.sort_order
         )",
        params![item_id, list_id],
        |row| row.get(0),
    )
}

/// Key of a named neighbour: another incomplete item of the same list.
fn neighbour_key(
    conn: &Connection,
    list_id: &str,
    moving: &str,
    neighbour: &str,
) -> Result<f64, RepositoryError> {
    if neighbour == moving {
        return Err(RepositoryError::Validation(
            "an item cannot be its own neighbour".into(),
        ));
    }
    conn.query_row(
        "SELECT sort_order FROM list_items WHERE id = ?1 AND list_id = ?2 AND completed = 0",
        params![neighbour, list_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| {
        RepositoryError::Validation("neighbour must be an incomplete item of this list".into())
    })
}

/// Incomplete item directly after (or before) `key`, skipping the moving one.
fn adjacent_key(
    conn: &Connection,
    list_id: &str,
    moving: &str,
    key: f64,
    after: bool,
) -> Result<Option<f64>, rusqlite::Error> {
    let sql = if after {
        "SELECT MIN(sort_order) FROM list_items
         WHERE list_id = ?1 AND completed = 0 AND id != ?2 AND sort_order > ?3"
    } else {
        "SELECT MAX(sort_order) FROM list_items
         WHERE list_id = ?1 AND completed = 0 AND id != ?2 AND sort_order < ?3"
    };
    conn.query_row(sql, params![list_id, moving, key], |row| row.get(0))
}

fn choose_key(
    conn: &Connection,
    list_id: &str,
    moving: &str,
    neighbours: &Neighbours,
) -> Result<KeyChoice, RepositoryError> {
    let prev = neighbours
        .prev_id
        .as_deref()
        .map(|id| neighbour_key(conn, list_id, moving, id))
        .transpose()?;
    let next = neighbours
        .next_id
        .as_deref()
        .map(|id| neighbour_key(conn, list_id, moving, id))
        .transpose()?;

    // With one side named, the other side is whatever currently follows it.
    let placement = match (prev, next) {
        (Some(prev), Some(next)) => Placement::Between { prev, next },
        (Some(prev), None) => match adjacent_key(conn, list_id, moving, prev, true)? {
            Some(next) => Placement::Between { prev, next },
            None => Placement::After { prev },
        },
        (None, Some(next)) => match adjacent_key(conn, list_id, moving, next, false)? {
            Some(prev) => Placement::Between { prev, next },
            None => Placement::Before { next },
        },
        (None, None) => Placement::End,
    };

    Ok(ordering::key_for(
        placement,
        max_order(conn, list_id, Some(moving))?,
    ))
}

/// Respace the incomplete items (except `moving`) at even intervals,
/// keeping their current order.
fn renumber(conn: &Connection, list_id: &str, moving: &str) -> Result<(), rusqlite::Error> {
    let ids: Vec<String> = {
        let mut stmt = conn.prepare(
            "SELECT id FROM list_items WHERE list_id = ?1 AND completed = 0 AND id != ?2
             ORDER BY sort_order, created_at, id",
        )?;
        let ids = stmt
            .query_map(params![list_id, moving], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        ids
    };

    let mut stmt = conn.prepare("UPDATE list_items SET sort_order = ?2 WHERE id = ?1")?;
    for (id, key) in ids.iter().zip(ordering::renumbered(ids.len())) {
        stmt.execute(params![id, key])?;
    }

    tracing::info!("Renumbered {} items in list {}", ids.len(), list_id);
    Ok(())
}
