pub mod domain;
pub mod ordering;
pub mod repository;

pub use domain::{ItemUpdate, ListError, ListIcon, ListUpdate, NewItem, NewList};
pub use repository::{ListRepository, ListView, Neighbours, SqliteListRepository};
