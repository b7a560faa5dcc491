// Account rules - pure validation, no storage
use rand::Rng;
use std::fmt;

use crate::error::AppError;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_NAME_LEN: usize = 64;
pub const DELETE_CONFIRMATION: &str = "DELETE";

/// Lowercased login handle, 3-64 chars of `[a-z0-9._@+-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    pub fn parse(raw: &str) -> Result<Self, AccountError> {
        let normalized = raw.trim().to_lowercase();
        let len = normalized.chars().count();
        let charset_ok = normalized
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '@' | '+' | '-'));
        if !(3..=64).contains(&len) || !charset_ok {
            return Err(AccountError::InvalidUsername);
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn validate_password(password: &str) -> Result<(), AccountError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AccountError::PasswordTooShort);
    }
    Ok(())
}

/// Trimmed display name, 1-64 chars.
pub fn validate_name(raw: &str) -> Result<String, AccountError> {
    let name = raw.trim();
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(AccountError::InvalidName);
    }
    Ok(name.to_string())
}

pub fn check_delete_confirmation(confirm: Option<&str>) -> Result<(), AccountError> {
    match confirm {
        Some(DELETE_CONFIRMATION) => Ok(()),
        _ => Err(AccountError::ConfirmationRequired),
    }
}

/// Short random key clients use to pick a deterministic avatar.
pub fn generate_avatar_key() -> String {
    let bytes: [u8; 6] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// Validated profile change; at least one field is present.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub username: Option<Username>,
}

impl ProfileUpdate {
    pub fn parse(name: Option<&str>, username: Option<&str>) -> Result<Self, AccountError> {
        if name.is_none() && username.is_none() {
            return Err(AccountError::EmptyUpdate);
        }
        Ok(Self {
            name: name.map(validate_name).transpose()?,
            username: username.map(Username::parse).transpose()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccountError {
    InvalidUsername,
    PasswordTooShort,
    InvalidName,
    EmptyUpdate,
    ConfirmationRequired,
}

impl fmt::Display for AccountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUsername => write!(
                f,
                "username must be 3-64 characters of letters, digits or . _ @ + -"
            ),
            Self::PasswordTooShort => write!(
                f,
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            ),
            Self::InvalidName => write!(f, "name must be 1-{} characters", MAX_NAME_LEN),
            Self::EmptyUpdate => write!(f, "nothing to update"),
            Self::ConfirmationRequired => write!(
                f,
                "account deletion requires confirm: \"{}\"",
                DELETE_CONFIRMATION
            ),
        }
    }
}

impl std::error::Error for AccountError {}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        AppError::Validation(err.to_string())
    }
}
