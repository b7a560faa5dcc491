// Library exports for Hearth
// This allows integration tests and external code to use Hearth modules

pub mod accounts;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod lists;
pub mod patch;
pub mod rooms;
pub mod routes;
pub mod state;
pub mod voting;
