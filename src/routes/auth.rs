use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::accounts::domain::{validate_name, validate_password};
use crate::accounts::{AccountRepository, SqliteAccountRepository, Username};
use crate::auth::password;
use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::extractors::{ApiJson, CurrentUser};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: User,
    pub api_key: String,
}

/// POST /api/auth/register
async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> AppResult<Response> {
    let username = Username::parse(&req.username)?;
    validate_password(&req.password)?;
    let name = validate_name(&req.name)?;

    let hash = password::hash_blocking(req.password, state.config.auth.bcrypt_cost).await?;

    let repo = SqliteAccountRepository::new(state.db.clone());
    let (user, key) = repo
        .create(&username, &hash, &name, state.config.auth.api_key_ttl_hours)
        .await?;

    let body = SessionResponse {
        user,
        api_key: key.into_string(),
    };
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> AppResult<Json<SessionResponse>> {
    // Malformed usernames cannot exist, so they fail like unknown ones.
    let username = Username::parse(&req.username).map_err(|_| AppError::Unauthorized)?;

    let repo = SqliteAccountRepository::new(state.db.clone());
    let user = repo
        .find_by_username(&username)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !password::verify_blocking(req.password, user.password_hash.clone()).await? {
        tracing::warn!("Failed login for {}", user.id);
        return Err(AppError::Unauthorized);
    }

    let key = repo
        .issue_key(&user.id, state.config.auth.api_key_ttl_hours)
        .await?;
    tracing::info!("User {} logged in", user.id);

    Ok(Json(SessionResponse {
        user,
        api_key: key.into_string(),
    }))
}

/// POST /api/auth/logout - revokes only the presented key.
async fn logout(State(state): State<AppState>, user: CurrentUser) -> AppResult<StatusCode> {
    let repo = SqliteAccountRepository::new(state.db.clone());
    repo.revoke_key(&user.key_hash).await?;
    Ok(StatusCode::NO_CONTENT)
}
