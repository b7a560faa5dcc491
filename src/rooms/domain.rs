// Room rules - pure, no storage
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AppError;
use crate::patch::Patch;

pub const MAX_MEMBERS: i64 = 2;
pub const DEFAULT_DISPLAY_NAME: &str = "My Room";
pub const MAX_DISPLAY_NAME_LEN: usize = 64;
pub const MAX_DESCRIPTION_LEN: usize = 512;

/// Share alphabet: no I, O, L, 0 or 1.
pub const SHARE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
pub const SHARE_TOKEN_LEN: usize = 5;

/// Short, human-transcribable code granting a single join.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShareToken(String);

impl ShareToken {
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let token: String = (0..SHARE_TOKEN_LEN)
            .map(|_| SHARE_ALPHABET[rng.gen_range(0..SHARE_ALPHABET.len())] as char)
            .collect();
        Self(token)
    }

    /// Accept user input in either case; reject anything the generator could
    /// not have produced.
    pub fn parse(raw: &str) -> Result<Self, RoomError> {
        let token = raw.trim().to_ascii_uppercase();
        let valid = token.len() == SHARE_TOKEN_LEN
            && token.bytes().all(|b| SHARE_ALPHABET.contains(&b));
        if !valid {
            return Err(RoomError::MalformedToken);
        }
        Ok(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn expiry(now: DateTime<Utc>, ttl_minutes: u64) -> DateTime<Utc> {
        now + Duration::minutes(ttl_minutes as i64)
    }
}

impl fmt::Display for ShareToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validated room settings change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomSettings {
    pub display_name: Patch<String>,
    pub description: Patch<String>,
}

impl RoomSettings {
    pub fn parse(
        display_name: Patch<String>,
        description: Patch<String>,
    ) -> Result<Self, RoomError> {
        let display_name = display_name.normalized();
        let description = description.normalized();

        if display_name.is_absent() && description.is_absent() {
            return Err(RoomError::EmptyUpdate);
        }
        if let Patch::Set(name) = &display_name {
            validate_display_name(name)?;
        }
        if let Patch::Set(text) = &description {
            if text.chars().count() > MAX_DESCRIPTION_LEN {
                return Err(RoomError::DescriptionTooLong);
            }
        }

        Ok(Self {
            display_name,
            description,
        })
    }
}

/// Letters, digits and spaces, 1-64 chars.
pub fn validate_display_name(name: &str) -> Result<(), RoomError> {
    let len = name.chars().count();
    let charset_ok = name.chars().all(|c| c.is_alphanumeric() || c == ' ');
    if len == 0 || len > MAX_DISPLAY_NAME_LEN || !charset_ok {
        return Err(RoomError::InvalidDisplayName);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoomError {
    MalformedToken,
    InvalidDisplayName,
    DescriptionTooLong,
    EmptyUpdate,
}

impl fmt::Display for RoomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedToken => write!(
                f,
                "share token must be {} characters",
                SHARE_TOKEN_LEN
            ),
            Self::InvalidDisplayName => write!(
                f,
                "display name must be 1-{} letters, digits or spaces",
                MAX_DISPLAY_NAME_LEN
            ),
            Self::DescriptionTooLong => write!(
                f,
                "description must be at most {} characters",
                MAX_DESCRIPTION_LEN
            ),
            Self::EmptyUpdate => write!(f, "nothing to update"),
        }
    }
}

impl std::error::Error for RoomError {}

impl From<RoomError> for AppError {
    fn from(err: RoomError) -> Self {
        AppError::Validation(err.to_string())
    }
}
