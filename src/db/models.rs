use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub avatar_key: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    #[serde(skip_serializing)]
    pub share_token: Option<String>,
    pub share_token_expires_at: Option<String>,
    pub share_token_consumed: bool,
    pub member_ids: Vec<String>,
    /// user_id -> voted_at
    pub deletion_votes: BTreeMap<String, String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub user_id: String,
    pub name: String,
    pub avatar_key: String,
    pub joined_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct List {
    pub id: String,
    pub room_id: String,
    pub name: String,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub icon: Option<String>,
    /// user_id -> voted_at
    pub deletion_votes: BTreeMap<String, String>,
    pub is_deleted: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListItem {
    pub id: String,
    pub list_id: String,
    pub room_id: String,
    pub description: String,
    pub quantity: Option<String>,
    pub unit: Option<String>,
    pub category: Option<String>,
    pub completed: bool,
    pub starred: bool,
    pub order: f64,
    pub created_at: String,
    pub updated_at: String,
}
