#![allow(dead_code)]

use hearth::config::Config;
use hearth::db;
use hearth::routes;
use hearth::state::{AppState, DbPool};
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;

/// A live server on an ephemeral port backed by a throwaway database.
pub struct TestServer {
    pub base: String,
    pub client: Client,
    pub pool: DbPool,
    _temp: TempDir,
}

pub fn test_pool() -> (DbPool, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let pool = db::create_pool(&temp_dir.path().join("test.db")).expect("create pool");
    db::run_migrations(&pool).expect("run migrations");
    (pool, temp_dir)
}

impl TestServer {
    pub async fn start() -> Self {
        let (pool, temp) = test_pool();

        let mut config = Config::default();
        config.auth.bcrypt_cost = 4;
        config.database.path = Some(temp.path().join("test.db"));

        let state = AppState {
            db: pool.clone(),
            config,
        };
        let app = routes::app(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{}/api", addr),
            client: Client::new(),
            pool,
            _temp: temp,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub async fn get(&self, key: &str, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .bearer_auth(key)
            .send()
            .await
            .unwrap()
    }

    pub async fn post(&self, key: &str, path: &str, body: Value) -> Response {
        self.client
            .post(self.url(path))
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn put(&self, key: &str, path: &str, body: Value) -> Response {
        self.client
            .put(self.url(path))
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn patch(&self, key: &str, path: &str, body: Value) -> Response {
        self.client
            .patch(self.url(path))
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn delete(&self, key: &str, path: &str, body: Value) -> Response {
        self.client
            .delete(self.url(path))
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    /// Register a user and return (user_id, api_key).
    pub async fn register(&self, username: &str) -> (String, String) {
        let response = self
            .client
            .post(self.url("/auth/register"))
            .json(&json!({
                "username": username,
                "password": "password123",
                "name": username,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.unwrap();
        (
            body["user"]["id"].as_str().unwrap().to_string(),
            body["api_key"].as_str().unwrap().to_string(),
        )
    }

    /// Create a room for `owner`, share it and have `guest` join. Returns the room id.
    pub async fn shared_room(&self, owner: &str, guest: &str) -> String {
        let room: Value = self.post(owner, "/rooms", json!({})).await.json().await.unwrap();
        let share: Value = self
            .post(owner, "/rooms/share", json!({}))
            .await
            .json()
            .await
            .unwrap();
        let joined = self
            .post(guest, "/rooms/join", json!({ "token": share["token"] }))
            .await;
        assert_eq!(joined.status(), StatusCode::OK);
        room["room_id"].as_str().unwrap().to_string()
    }
}

pub async fn json_body(response: Response) -> Value {
    response.json().await.unwrap()
}
