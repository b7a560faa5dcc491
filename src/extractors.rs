use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header;
use axum::http::request::Parts;
use axum::Json;
use rusqlite::params;

use crate::auth::api_keys;
use crate::db::OptionalExt;
use crate::error::AppError;
use crate::state::AppState;

/// Represents the currently authenticated user.
///
/// Handlers receive identity only through this value; nothing in the core
/// reads an ambient session.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    /// Digest of the key that authenticated this request.
    pub key_hash: String,
}

/// Extractor that requires a valid `Authorization: Bearer <api_key>` header.
/// Unknown, expired and malformed keys all reject with 401.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let key = extract_bearer(parts).ok_or(AppError::Unauthorized)?;
        let key_hash = api_keys::digest(key);

        let conn = state.db.get()?;
        let user_id = api_keys::lookup(&conn, &key_hash)?.ok_or(AppError::Unauthorized)?;

        let username: String = conn
            .query_row(
                "SELECT username FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(AppError::Unauthorized)?;

        Ok(CurrentUser {
            id: user_id,
            username,
            key_hash,
        })
    }
}

/// `Json` whose rejections use the API error shape.
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}

fn extract_bearer(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, key) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let key = key.trim();
    (!key.is_empty()).then_some(key)
}
