// tests/common/mod.rs
//
// Shared helpers for integration tests. Tests need a running Postgres;
// when DATABASE_URL is not set they skip instead of failing, so the unit
// test suite stays green on machines without a database.

#![allow(dead_code)]

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::sync::{Arc, Mutex};

use venturehub::{
    config::Config, error::AppError, live::LiveHub, routes, state::AppState, storage::MediaStore,
};

/// MediaStore mock that records every deletion instead of touching disk.
#[derive(Default)]
pub struct RecordingMediaStore {
    pub deleted: Mutex<Vec<String>>,
}

#[async_trait]
impl MediaStore for RecordingMediaStore {
    async fn delete(&self, storage_id: &str) -> Result<(), AppError> {
        self.deleted.lock().unwrap().push(storage_id.to_string());
        Ok(())
    }
}

pub struct TestApp {
    pub address: String,
    pub pool: PgPool,
    pub media: Arc<RecordingMediaStore>,
}

/// Spawns the app on a random port. Returns None (skip) without a
/// DATABASE_URL.
pub async fn spawn_app() -> Option<TestApp> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping integration test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        upload_dir: "uploads-test".to_string(),
        notification_ttl_days: 30,
        purge_interval_secs: 3600,
        admin_username: None,
        admin_email: None,
        admin_password: None,
    };

    let media = Arc::new(RecordingMediaStore::default());
    let media_store: Arc<dyn MediaStore> = media.clone();

    let state = AppState {
        pool: pool.clone(),
        config,
        hub: LiveHub::new(),
        media: media_store,
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Some(TestApp {
        address,
        pool,
        media,
    })
}

/// Registers a fresh user with a unique name and logs them in.
/// Returns (bearer token, user id).
pub async fn register_and_login(
    client: &reqwest::Client,
    address: &str,
    role: &str,
) -> (String, i64) {
    let unique = &uuid::Uuid::new_v4().to_string()[..8];
    let username = format!("u_{}", unique);
    let email = format!("{}@example.com", username);
    let password = "password123";

    let resp = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": username,
            "email": email,
            "password": password,
            "role": role,
        }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(resp.status().as_u16(), 201, "registration should succeed");

    let login = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Login failed")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse login json");

    let token = login["token"].as_str().expect("token missing").to_string();
    let user_id = login["user_id"].as_i64().expect("user_id missing");

    (token, user_id)
}

/// A sends a friend request to B; B accepts it.
pub async fn make_friends(
    client: &reqwest::Client,
    address: &str,
    token_a: &str,
    token_b: &str,
    user_b: i64,
) {
    let request: serde_json::Value = client
        .post(format!("{}/api/friends/request", address))
        .header("Authorization", format!("Bearer {}", token_a))
        .json(&serde_json::json!({ "receiver_id": user_b }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let request_id = request["id"].as_i64().expect("request id missing");

    let resp = client
        .patch(format!("{}/api/friends/{}", address, request_id))
        .header("Authorization", format!("Bearer {}", token_b))
        .json(&serde_json::json!({ "action": "accepted" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200, "accept should succeed");
}

/// Creates a post and returns its id.
pub async fn create_post(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    content: &str,
    visibility: &str,
) -> i64 {
    let post: serde_json::Value = client
        .post(format!("{}/api/posts", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "content": content, "visibility": visibility }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    post["id"].as_i64().expect("post id missing")
}

/// Fetches the caller's notifications.
pub async fn get_notifications(
    client: &reqwest::Client,
    address: &str,
    token: &str,
) -> Vec<serde_json::Value> {
    client
        .get(format!("{}/api/notifications", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}
