use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::AppResult;
use crate::extractors::{ApiJson, CurrentUser};
use crate::lists::{ListRepository, ListUpdate, ListView, NewList, SqliteListRepository};
use crate::patch::Patch;
use crate::state::AppState;
use crate::voting::{SqliteVoteRepository, VoteOutcome, VoteRepository, VoteTarget};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms/{room_id}/lists", get(lists).post(create_list))
        .route(
            "/rooms/{room_id}/lists/{list_id}",
            get(list).put(update_list),
        )
        .route(
            "/rooms/{room_id}/lists/{list_id}/deletion/vote",
            post(vote_delete_list),
        )
        .route(
            "/rooms/{room_id}/lists/{list_id}/deletion/cancel",
            post(cancel_delete_list),
        )
}

#[derive(Debug, Deserialize)]
pub struct CreateListRequest {
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateListRequest {
    pub name: Option<String>,
    #[serde(default)]
    pub description: Patch<String>,
    #[serde(default)]
    pub notes: Patch<String>,
    #[serde(default)]
    pub icon: Patch<String>,
}

async fn lists(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(room_id): Path<String>,
) -> AppResult<Json<Vec<ListView>>> {
    let repo = SqliteListRepository::new(state.db.clone());
    Ok(Json(repo.lists(&user.id, &room_id).await?))
}

async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((room_id, list_id)): Path<(String, String)>,
) -> AppResult<Json<ListView>> {
    let repo = SqliteListRepository::new(state.db.clone());
    Ok(Json(repo.list(&user.id, &room_id, &list_id).await?))
}

async fn create_list(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(room_id): Path<String>,
    ApiJson(req): ApiJson<CreateListRequest>,
) -> AppResult<Response> {
    let new_list = NewList::parse(&req.name, req.description.as_deref(), req.icon.as_deref())?;
    let repo = SqliteListRepository::new(state.db.clone());
    let view = repo.create_list(&user.id, &room_id, &new_list).await?;
    Ok((StatusCode::CREATED, Json(view)).into_response())
}

async fn update_list(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((room_id, list_id)): Path<(String, String)>,
    ApiJson(req): ApiJson<UpdateListRequest>,
) -> AppResult<Json<ListView>> {
    let update = ListUpdate::parse(req.name.as_deref(), req.description, req.notes, req.icon)?;
    let repo = SqliteListRepository::new(state.db.clone());
    Ok(Json(
        repo.update_list(&user.id, &room_id, &list_id, &update)
            .await?,
    ))
}

async fn vote_delete_list(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((room_id, list_id)): Path<(String, String)>,
) -> AppResult<Json<VoteOutcome>> {
    let votes = SqliteVoteRepository::new(state.db.clone());
    let target = VoteTarget::List { room_id, list_id };
    Ok(Json(votes.cast(&target, &user.id).await?))
}

async fn cancel_delete_list(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((room_id, list_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    let votes = SqliteVoteRepository::new(state.db.clone());
    let target = VoteTarget::List { room_id, list_id };
    votes.cancel(&target, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
