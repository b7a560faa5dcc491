// Deletion ballot - pure unanimity rules shared by rooms and lists
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

use crate::error::AppError;

/// Lifecycle of anything deleted by mutual consent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionState {
    Active,
    /// Some but not all current members have voted.
    PendingDeletion,
    Deleted,
}

/// What a vote is cast against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteTarget {
    Room { room_id: String },
    List { room_id: String, list_id: String },
}

impl VoteTarget {
    pub fn room_id(&self) -> &str {
        match self {
            Self::Room { room_id } | Self::List { room_id, .. } => room_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Room { .. } => "room",
            Self::List { .. } => "list",
        }
    }
}

/// Snapshot of the current members and the votes on one target.
///
/// Votes from anyone outside `members` are ignored, so a stale vote can never
/// complete a tally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ballot {
    members: BTreeSet<String>,
    votes: BTreeSet<String>,
}

impl Ballot {
    pub fn new<M, V>(members: M, votes: V) -> Self
    where
        M: IntoIterator<Item = String>,
        V: IntoIterator<Item = String>,
    {
        let members: BTreeSet<String> = members.into_iter().collect();
        let votes = votes
            .into_iter()
            .filter(|v| members.contains(v))
            .collect();
        Self { members, votes }
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.contains(user_id)
    }

    pub fn has_voted(&self, user_id: &str) -> bool {
        self.votes.contains(user_id)
    }

    pub fn vote_count(&self) -> usize {
        self.votes.len()
    }

    /// Add a vote; idempotent.
    pub fn cast(mut self, user_id: &str) -> Result<Self, VoteError> {
        if !self.is_member(user_id) {
            return Err(VoteError::NotAMember);
        }
        self.votes.insert(user_id.to_string());
        Ok(self)
    }

    /// Remove a vote; idempotent.
    pub fn retract(mut self, user_id: &str) -> Result<Self, VoteError> {
        if !self.is_member(user_id) {
            return Err(VoteError::NotAMember);
        }
        self.votes.remove(user_id);
        Ok(self)
    }

    pub fn is_unanimous(&self) -> bool {
        !self.members.is_empty() && self.votes == self.members
    }

    /// State of a target that still exists. Only a finalizing vote reports
    /// `Deleted`; a tally that became unanimous because someone left stays
    /// pending until the next vote.
    pub fn state(&self) -> DeletionState {
        if self.votes.is_empty() {
            DeletionState::Active
        } else {
            DeletionState::PendingDeletion
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VoteError {
    NotAMember,
}

impl fmt::Display for VoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAMember => write!(f, "not a member of this room"),
        }
    }
}

impl std::error::Error for VoteError {}

impl From<VoteError> for AppError {
    fn from(err: VoteError) -> Self {
        AppError::Forbidden(err.to_string())
    }
}
