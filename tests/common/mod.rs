// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use album_sync::config::Config;
use album_sync::db::{CollectionStore, CredentialStore, FirestoreDb, MemoryDb, SharedStore};
use album_sync::models::{Collection, Cursor, Rule, UserRecord};
use album_sync::routes::create_router;
use album_sync::AppState;
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Test config pointing the Twitter client at `twitter_base_url`
/// (usually a wiremock server).
#[allow(dead_code)]
pub fn test_config(twitter_base_url: &str) -> Config {
    Config {
        twitter_api_base_url: twitter_base_url.to_string(),
        ..Config::test_default()
    }
}

/// Build app state over a fresh in-memory store.
#[allow(dead_code)]
pub fn create_test_state(config: Config) -> (Arc<AppState>, Arc<MemoryDb>) {
    let db = Arc::new(MemoryDb::new());
    let store: SharedStore = db.clone();
    let state = Arc::new(AppState::new(config, store).expect("Failed to build app state"));
    (state, db)
}

/// Create a test app with an in-memory store.
/// Returns the router, the shared state and the store.
#[allow(dead_code)]
pub fn create_test_app(config: Config) -> (axum::Router, Arc<AppState>, Arc<MemoryDb>) {
    let (state, db) = create_test_state(config);
    (create_router(state.clone()), state, db)
}

/// A user whose tokens are in sync and valid for an hour.
#[allow(dead_code)]
pub fn test_user(user_id: &str, access_token: &str, cursor: Option<&str>) -> UserRecord {
    let now = Utc::now();
    UserRecord {
        user_id: user_id.to_string(),
        provider_access_token: access_token.to_string(),
        provider_refresh_token: format!("refresh_{}", user_id),
        authorization_access_token: access_token.to_string(),
        expiration_time: now + Duration::hours(1),
        last_item_cursor: cursor.map(Cursor::new),
        name: Some(format!("User {}", user_id)),
        username: Some(format!("handle_{}", user_id)),
        profile_image_url: None,
        created_at: now,
        updated_at: now,
    }
}

#[allow(dead_code)]
pub async fn seed_user(db: &MemoryDb, user: UserRecord) {
    db.put_user(&user).await.expect("Failed to seed user");
}

#[allow(dead_code)]
pub async fn seed_keyword_collection(db: &MemoryDb, user_id: &str, id: u64, keyword: &str) {
    db.put_collection(&Collection::new(
        user_id,
        id,
        keyword,
        vec![Rule::keyword(keyword)],
    ))
    .await
    .expect("Failed to seed collection");
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}
