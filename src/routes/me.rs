use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::accounts::domain::{check_delete_confirmation, validate_password};
use crate::accounts::{AccountRepository, Profile, ProfileUpdate, SqliteAccountRepository};
use crate::auth::password;
use crate::error::{AppError, AppResult};
use crate::extractors::{ApiJson, CurrentUser};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me).put(update_me).delete(delete_me))
        .route("/me/password", put(change_password))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct ChangePasswordResponse {
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAccountRequest {
    pub confirm: Option<String>,
}

async fn me(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Profile>> {
    let repo = SqliteAccountRepository::new(state.db.clone());
    Ok(Json(repo.profile(&user.id).await?))
}

async fn update_me(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> AppResult<Json<Profile>> {
    let update = ProfileUpdate::parse(req.name.as_deref(), req.username.as_deref())?;
    let repo = SqliteAccountRepository::new(state.db.clone());
    Ok(Json(repo.update_profile(&user.id, &update).await?))
}

/// PUT /api/me/password - every existing key stops working; the response
/// carries the replacement.
async fn change_password(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> AppResult<Json<ChangePasswordResponse>> {
    validate_password(&req.new_password)?;

    let repo = SqliteAccountRepository::new(state.db.clone());
    let current = repo.profile(&user.id).await?.user;
    if !password::verify_blocking(req.current_password, current.password_hash).await? {
        return Err(AppError::Forbidden("current password is incorrect".into()));
    }

    let hash = password::hash_blocking(req.new_password, state.config.auth.bcrypt_cost).await?;
    let key = repo
        .replace_password(&user.id, &hash, state.config.auth.api_key_ttl_hours)
        .await?;

    Ok(Json(ChangePasswordResponse {
        api_key: key.into_string(),
    }))
}

async fn delete_me(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<DeleteAccountRequest>,
) -> AppResult<StatusCode> {
    check_delete_confirmation(req.confirm.as_deref())?;
    let repo = SqliteAccountRepository::new(state.db.clone());
    repo.delete(&user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
