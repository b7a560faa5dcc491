pub mod domain;
pub mod repository;

pub use domain::{Ballot, DeletionState, VoteError, VoteTarget};
pub use repository::{SqliteVoteRepository, VoteOutcome, VoteRepository};
