pub mod domain;
pub mod repository;

pub use domain::{RoomError, RoomSettings, ShareToken};
pub use repository::{
    Departure, IssuedToken, RoomRepository, RoomView, SqliteRoomRepository,
};
