use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::AppResult;
use crate::extractors::{ApiJson, CurrentUser};
use crate::patch::Patch;
use crate::rooms::{
    Departure, IssuedToken, RoomRepository, RoomSettings, RoomView, ShareToken,
    SqliteRoomRepository,
};
use crate::state::AppState;
use crate::voting::{SqliteVoteRepository, VoteOutcome, VoteRepository, VoteTarget};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/me", get(my_room))
        .route("/rooms/share", post(rotate_share_token))
        .route("/rooms/join", post(join_room))
        .route("/rooms/settings", put(update_settings))
        .route("/rooms/leave", post(leave_room))
        .route("/rooms/deletion/vote", post(vote_delete_room))
        .route("/rooms/deletion/cancel", post(cancel_delete_room))
}

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct SettingsRequest {
    #[serde(default)]
    pub display_name: Patch<String>,
    #[serde(default)]
    pub description: Patch<String>,
}

async fn create_room(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    let repo = SqliteRoomRepository::new(state.db.clone());
    let view = repo.create(&user.id).await?;
    Ok((StatusCode::CREATED, Json(view)).into_response())
}

async fn my_room(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<RoomView>> {
    let repo = SqliteRoomRepository::new(state.db.clone());
    Ok(Json(repo.view_for(&user.id).await?))
}

/// POST /api/rooms/share - not idempotent; every call replaces the token.
async fn rotate_share_token(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<IssuedToken>> {
    let repo = SqliteRoomRepository::new(state.db.clone());
    let issued = repo
        .rotate_share_token(&user.id, state.config.rooms.share_token_ttl_minutes)
        .await?;
    Ok(Json(issued))
}

async fn join_room(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<JoinRequest>,
) -> AppResult<Json<RoomView>> {
    let token = ShareToken::parse(&req.token)?;
    let repo = SqliteRoomRepository::new(state.db.clone());
    Ok(Json(repo.join(&user.id, &token).await?))
}

async fn update_settings(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<SettingsRequest>,
) -> AppResult<Json<RoomView>> {
    let settings = RoomSettings::parse(req.display_name, req.description)?;
    let repo = SqliteRoomRepository::new(state.db.clone());
    Ok(Json(repo.update_settings(&user.id, &settings).await?))
}

async fn leave_room(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Departure>> {
    let repo = SqliteRoomRepository::new(state.db.clone());
    Ok(Json(repo.leave(&user.id).await?))
}

async fn room_target(state: &AppState, user: &CurrentUser) -> AppResult<VoteTarget> {
    let repo = SqliteRoomRepository::new(state.db.clone());
    Ok(VoteTarget::Room {
        room_id: repo.room_id_of(&user.id).await?,
    })
}

async fn vote_delete_room(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<VoteOutcome>> {
    let target = room_target(&state, &user).await?;
    let votes = SqliteVoteRepository::new(state.db.clone());
    Ok(Json(votes.cast(&target, &user.id).await?))
}

async fn cancel_delete_room(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<StatusCode> {
    let target = room_target(&state, &user).await?;
    let votes = SqliteVoteRepository::new(state.db.clone());
    votes.cancel(&target, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
