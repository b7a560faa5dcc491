pub mod domain;
pub mod repository;

pub use domain::{AccountError, ProfileUpdate, Username};
pub use repository::{AccountRepository, Profile, SqliteAccountRepository};
