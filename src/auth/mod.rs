pub mod api_keys;
pub mod password;

pub use api_keys::ApiKey;
