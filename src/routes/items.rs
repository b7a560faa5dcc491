use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::db::models::ListItem;
use crate::error::AppResult;
use crate::extractors::{ApiJson, CurrentUser};
use crate::lists::{ItemUpdate, ListRepository, Neighbours, NewItem, SqliteListRepository};
use crate::patch::Patch;
use crate::state::AppState;

const ITEMS: &str = "/rooms/{room_id}/lists/{list_id}/items";

pub fn router() -> Router<AppState> {
    Router::new()
        .route(ITEMS, get(items).post(create_item))
        .route(&format!("{}/clear", ITEMS), post(clear_completed))
        .route(
            &format!("{}/{{item_id}}", ITEMS),
            patch(update_item).delete(delete_item),
        )
        .route(&format!("{}/{{item_id}}/reorder", ITEMS), post(reorder_item))
}

#[derive(Debug, Deserialize)]
pub struct ItemsQuery {
    #[serde(default)]
    pub include_completed: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub description: String,
    pub quantity: Option<String>,
    pub unit: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub starred: Option<bool>,
    #[serde(default)]
    pub quantity: Patch<String>,
    #[serde(default)]
    pub unit: Patch<String>,
    #[serde(default)]
    pub category: Patch<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub prev_id: Option<String>,
    pub next_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClearedResponse {
    pub cleared: usize,
}

async fn items(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((room_id, list_id)): Path<(String, String)>,
    Query(query): Query<ItemsQuery>,
) -> AppResult<Json<Vec<ListItem>>> {
    let repo = SqliteListRepository::new(state.db.clone());
    Ok(Json(
        repo.items(&user.id, &room_id, &list_id, query.include_completed)
            .await?,
    ))
}

async fn create_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((room_id, list_id)): Path<(String, String)>,
    ApiJson(req): ApiJson<CreateItemRequest>,
) -> AppResult<Response> {
    let new_item = NewItem::parse(
        &req.description,
        req.quantity.as_deref(),
        req.unit.as_deref(),
        req.category.as_deref(),
    )?;
    let repo = SqliteListRepository::new(state.db.clone());
    let item = repo
        .create_item(&user.id, &room_id, &list_id, &new_item)
        .await?;
    Ok((StatusCode::CREATED, Json(item)).into_response())
}

async fn update_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((room_id, list_id, item_id)): Path<(String, String, String)>,
    ApiJson(req): ApiJson<UpdateItemRequest>,
) -> AppResult<Json<ListItem>> {
    let update = ItemUpdate::parse(
        req.description.as_deref(),
        req.completed,
        req.starred,
        req.quantity,
        req.unit,
        req.category,
    )?;
    let repo = SqliteListRepository::new(state.db.clone());
    Ok(Json(
        repo.update_item(&user.id, &room_id, &list_id, &item_id, &update)
            .await?,
    ))
}

async fn delete_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((room_id, list_id, item_id)): Path<(String, String, String)>,
) -> AppResult<StatusCode> {
    let repo = SqliteListRepository::new(state.db.clone());
    repo.delete_item(&user.id, &room_id, &list_id, &item_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reorder_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((room_id, list_id, item_id)): Path<(String, String, String)>,
    ApiJson(req): ApiJson<ReorderRequest>,
) -> AppResult<Json<ListItem>> {
    let neighbours = Neighbours {
        prev_id: req.prev_id,
        next_id: req.next_id,
    };
    let repo = SqliteListRepository::new(state.db.clone());
    Ok(Json(
        repo.reorder_item(&user.id, &room_id, &list_id, &item_id, &neighbours)
            .await?,
    ))
}

async fn clear_completed(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((room_id, list_id)): Path<(String, String)>,
) -> AppResult<Json<ClearedResponse>> {
    let repo = SqliteListRepository::new(state.db.clone());
    let cleared = repo.clear_completed(&user.id, &room_id, &list_id).await?;
    Ok(Json(ClearedResponse { cleared }))
}
