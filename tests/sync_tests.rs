// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync pass tests against a mocked Twitter API.
//!
//! These tests verify that:
//! 1. Matches are merged and the cursor advances to the newest item
//! 2. Re-running a pass, or replaying one after a crash, changes nothing
//! 3. One user's failure leaves other users unaffected
//! 4. The cursor is untouched when fetching or matching fails

use album_sync::db::{CollectionStore, CredentialStore};
use album_sync::models::{Collection, Cursor, ItemIdSet, Rule, UserPatch};
use chrono::{Duration, Utc};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

fn timeline(items: &[(&str, &str)]) -> serde_json::Value {
    let data: Vec<_> = items
        .iter()
        .map(|(id, text)| json!({"id": id, "text": text, "author_id": "u1"}))
        .collect();
    json!({
        "data": data,
        "meta": {
            "result_count": items.len(),
            "newest_id": items.first().map(|(id, _)| *id),
        }
    })
}

fn empty_timeline() -> serde_json::Value {
    json!({"meta": {"result_count": 0}})
}

async fn mount_timeline(
    server: &MockServer,
    user_id: &str,
    since_id: &str,
    body: serde_json::Value,
) {
    Mock::given(method("GET"))
        .and(path(format!("/2/users/{}/tweets", user_id)))
        .and(query_param("since_id", since_id))
        .and(query_param("exclude", "retweets,replies"))
        .and(query_param("max_results", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn ids(values: &[&str]) -> ItemIdSet {
    values.iter().copied().collect()
}

#[tokio::test]
async fn test_end_to_end_merge_and_cursor_advance() {
    let server = MockServer::start().await;
    let (state, db) = common::create_test_state(common::test_config(&server.uri()));

    common::seed_user(&db, common::test_user("u1", "A", Some("100"))).await;
    common::seed_keyword_collection(&db, "u1", 1, "launch").await;
    common::seed_keyword_collection(&db, "u1", 2, "xyz").await;

    mount_timeline(
        &server,
        "u1",
        "100",
        timeline(&[("106", "hello"), ("105", "launch day")]),
    )
    .await;

    let report = state.sync.run_pass().await.unwrap();

    assert_eq!(report.users_scanned, 1);
    assert_eq!(report.users_synced, 1);
    assert_eq!(report.items_fetched, 2);
    assert_eq!(report.collections_updated, 1);

    let c = db.get_collection("u1", 1).await.unwrap().unwrap();
    let d = db.get_collection("u1", 2).await.unwrap().unwrap();
    assert_eq!(c.matched_item_ids, ids(&["105"]));
    assert!(d.matched_item_ids.is_empty());

    let user = db.get_user("u1").await.unwrap().unwrap();
    assert_eq!(user.last_item_cursor, Some(Cursor::new("106")));
}

#[tokio::test]
async fn test_rerun_after_sync_is_noop() {
    let server = MockServer::start().await;
    let (state, db) = common::create_test_state(common::test_config(&server.uri()));

    common::seed_user(&db, common::test_user("u1", "A", Some("100"))).await;
    common::seed_keyword_collection(&db, "u1", 1, "launch").await;

    mount_timeline(&server, "u1", "100", timeline(&[("105", "launch day")])).await;
    mount_timeline(&server, "u1", "105", empty_timeline()).await;

    state.sync.run_pass().await.unwrap();
    let report = state.sync.run_pass().await.unwrap();

    assert_eq!(report.users_without_new_items, 1);

    let c = db.get_collection("u1", 1).await.unwrap().unwrap();
    assert_eq!(c.matched_item_ids, ids(&["105"]));

    let user = db.get_user("u1").await.unwrap().unwrap();
    assert_eq!(user.last_item_cursor, Some(Cursor::new("105")));
}

#[tokio::test]
async fn test_replay_after_crash_before_cursor_write() {
    let server = MockServer::start().await;
    let (state, db) = common::create_test_state(common::test_config(&server.uri()));

    common::seed_user(&db, common::test_user("u1", "A", Some("100"))).await;
    common::seed_keyword_collection(&db, "u1", 1, "launch").await;

    mount_timeline(
        &server,
        "u1",
        "100",
        timeline(&[("107", "launch again"), ("105", "launch day")]),
    )
    .await;

    state.sync.run_pass().await.unwrap();

    // Simulate a crash between the merge and the cursor write: the merge is
    // durable but the cursor still points at the old position.
    db.update_user("u1", &UserPatch::cursor_advanced(Cursor::new("100")))
        .await
        .unwrap();

    state.sync.run_pass().await.unwrap();

    let c = db.get_collection("u1", 1).await.unwrap().unwrap();
    assert_eq!(c.matched_item_ids, ids(&["105", "107"]));
    assert_eq!(c.matched_item_ids.len(), 2);

    let user = db.get_user("u1").await.unwrap().unwrap();
    assert_eq!(user.last_item_cursor, Some(Cursor::new("107")));
}

#[tokio::test]
async fn test_partial_failure_isolated_per_user() {
    let server = MockServer::start().await;
    let (state, db) = common::create_test_state(common::test_config(&server.uri()));

    common::seed_user(&db, common::test_user("u1", "A1", Some("200"))).await;
    common::seed_user(&db, common::test_user("u2", "A2", Some("300"))).await;
    common::seed_keyword_collection(&db, "u1", 1, "rust").await;
    common::seed_keyword_collection(&db, "u2", 2, "rust").await;

    Mock::given(method("GET"))
        .and(path("/2/users/u1/tweets"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream broke"))
        .mount(&server)
        .await;
    mount_timeline(&server, "u2", "300", timeline(&[("301", "rust 2024")])).await;

    let report = state.sync.run_pass().await.unwrap();

    assert_eq!(report.fetch_failures, 1);
    assert_eq!(report.users_synced, 1);

    let u1 = db.get_user("u1").await.unwrap().unwrap();
    assert_eq!(u1.last_item_cursor, Some(Cursor::new("200")));
    assert!(db
        .get_collection("u1", 1)
        .await
        .unwrap()
        .unwrap()
        .matched_item_ids
        .is_empty());

    let u2 = db.get_user("u2").await.unwrap().unwrap();
    assert_eq!(u2.last_item_cursor, Some(Cursor::new("301")));
    assert_eq!(
        db.get_collection("u2", 2)
            .await
            .unwrap()
            .unwrap()
            .matched_item_ids,
        ids(&["301"])
    );
}

#[tokio::test]
async fn test_zero_items_leaves_cursor() {
    let server = MockServer::start().await;
    let (state, db) = common::create_test_state(common::test_config(&server.uri()));

    common::seed_user(&db, common::test_user("u1", "A", Some("100"))).await;
    common::seed_keyword_collection(&db, "u1", 1, "launch").await;
    mount_timeline(&server, "u1", "100", empty_timeline()).await;

    let report = state.sync.run_pass().await.unwrap();
    assert_eq!(report.users_without_new_items, 1);

    let user = db.get_user("u1").await.unwrap().unwrap();
    assert_eq!(user.last_item_cursor, Some(Cursor::new("100")));
}

#[tokio::test]
async fn test_first_sync_without_cursor() {
    let server = MockServer::start().await;
    let (state, db) = common::create_test_state(common::test_config(&server.uri()));

    common::seed_user(&db, common::test_user("u1", "A", None)).await;
    common::seed_keyword_collection(&db, "u1", 1, "launch").await;

    Mock::given(method("GET"))
        .and(path("/2/users/u1/tweets"))
        .and(header("authorization", "Bearer A"))
        .respond_with(ResponseTemplate::new(200).set_body_json(timeline(&[("42", "launch")])))
        .expect(1)
        .mount(&server)
        .await;

    state.sync.run_pass().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(!requests[0].url.query().unwrap_or("").contains("since_id"));

    let user = db.get_user("u1").await.unwrap().unwrap();
    assert_eq!(user.last_item_cursor, Some(Cursor::new("42")));
}

#[tokio::test]
async fn test_unsupported_rule_blocks_user_merges() {
    let server = MockServer::start().await;
    let (state, db) = common::create_test_state(common::test_config(&server.uri()));

    common::seed_user(&db, common::test_user("u1", "A", Some("100"))).await;
    common::seed_keyword_collection(&db, "u1", 1, "launch").await;
    db.put_collection(&Collection::new(
        "u1",
        2,
        "regex",
        vec![Rule::Pattern {
            pattern: "^launch".to_string(),
        }],
    ))
    .await
    .unwrap();

    mount_timeline(&server, "u1", "100", timeline(&[("105", "launch day")])).await;

    let report = state.sync.run_pass().await.unwrap();
    assert_eq!(report.match_failures, 1);

    let c = db.get_collection("u1", 1).await.unwrap().unwrap();
    assert!(c.matched_item_ids.is_empty());

    let user = db.get_user("u1").await.unwrap().unwrap();
    assert_eq!(user.last_item_cursor, Some(Cursor::new("100")));
}

#[tokio::test]
async fn test_unknown_rule_kind_only_fails_its_user() {
    let server = MockServer::start().await;
    let (state, db) = common::create_test_state(common::test_config(&server.uri()));

    common::seed_user(&db, common::test_user("u1", "A", Some("100"))).await;
    common::seed_user(&db, common::test_user("u2", "A2", Some("200"))).await;

    // Written by a newer client with a rule kind this build does not know.
    let stored: Collection = serde_json::from_value(json!({
        "user_id": "u1",
        "id": 1,
        "title": "regex",
        "rules": [{"kind": "regex", "regex": "^launch"}],
        "created_at": "2026-01-01T00:00:00Z"
    }))
    .unwrap();
    db.put_collection(&stored).await.unwrap();
    common::seed_keyword_collection(&db, "u2", 1, "launch").await;

    mount_timeline(&server, "u1", "100", timeline(&[("105", "launch day")])).await;
    mount_timeline(&server, "u2", "200", timeline(&[("205", "launch again")])).await;

    let report = state.sync.run_pass().await.unwrap();
    assert_eq!(report.users_scanned, 2);
    assert_eq!(report.match_failures, 1);
    assert_eq!(report.users_synced, 1);

    let user = db.get_user("u1").await.unwrap().unwrap();
    assert_eq!(user.last_item_cursor, Some(Cursor::new("100")));

    let c = db.get_collection("u2", 1).await.unwrap().unwrap();
    assert_eq!(c.matched_item_ids, ids(&["205"]));
    let user = db.get_user("u2").await.unwrap().unwrap();
    assert_eq!(user.last_item_cursor, Some(Cursor::new("205")));
}

#[tokio::test]
async fn test_user_without_collections_not_fetched() {
    let server = MockServer::start().await;
    let (state, db) = common::create_test_state(common::test_config(&server.uri()));

    common::seed_user(&db, common::test_user("u1", "A", Some("100"))).await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_timeline()))
        .expect(0)
        .mount(&server)
        .await;

    let report = state.sync.run_pass().await.unwrap();
    assert_eq!(report.users_without_collections, 1);
}

#[tokio::test]
async fn test_expired_token_refreshed_before_fetch() {
    let server = MockServer::start().await;
    let (state, db) = common::create_test_state(common::test_config(&server.uri()));

    let mut user = common::test_user("u1", "A", Some("100"));
    user.expiration_time = Utc::now() - Duration::minutes(5);
    common::seed_user(&db, user).await;
    common::seed_keyword_collection(&db, "u1", 1, "launch").await;

    Mock::given(method("POST"))
        .and(path("/2/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "B",
            "refresh_token": "R2",
            "expires_in": 7200,
            "token_type": "bearer",
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/2/users/u1/tweets"))
        .and(header("authorization", "Bearer B"))
        .respond_with(ResponseTemplate::new(200).set_body_json(timeline(&[("105", "launch")])))
        .expect(1)
        .mount(&server)
        .await;

    let report = state.sync.run_pass().await.unwrap();
    assert_eq!(report.users_synced, 1);

    let user = db.get_user("u1").await.unwrap().unwrap();
    assert_eq!(user.provider_access_token, "B");
    assert_eq!(user.provider_refresh_token, "R2");
    // Not yet disclosed to the client.
    assert_eq!(user.authorization_access_token, "A");
    assert_eq!(user.last_item_cursor, Some(Cursor::new("105")));
}

#[tokio::test]
async fn test_rejected_refresh_skips_user() {
    let server = MockServer::start().await;
    let (state, db) = common::create_test_state(common::test_config(&server.uri()));

    let mut user = common::test_user("u1", "A", Some("100"));
    user.expiration_time = Utc::now() - Duration::minutes(5);
    common::seed_user(&db, user).await;
    common::seed_keyword_collection(&db, "u1", 1, "launch").await;

    Mock::given(method("POST"))
        .and(path("/2/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_request",
            "error_description": "Value passed for the token was invalid.",
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/2/users/u1/tweets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_timeline()))
        .expect(0)
        .mount(&server)
        .await;

    let report = state.sync.run_pass().await.unwrap();
    assert_eq!(report.credential_failures, 1);

    let user = db.get_user("u1").await.unwrap().unwrap();
    assert_eq!(user.provider_access_token, "A");
    assert_eq!(user.last_item_cursor, Some(Cursor::new("100")));
}

#[tokio::test]
async fn test_deleted_collections_skipped_and_purged() {
    let server = MockServer::start().await;
    let (state, db) = common::create_test_state(common::test_config(&server.uri()));

    common::seed_user(&db, common::test_user("u1", "A", Some("100"))).await;
    common::seed_keyword_collection(&db, "u1", 1, "launch").await;
    common::seed_keyword_collection(&db, "u1", 2, "launch").await;
    common::seed_keyword_collection(&db, "u1", 3, "launch").await;
    db.mark_collection_deleted("u1", 2, Utc::now() + Duration::days(30))
        .await
        .unwrap();
    db.mark_collection_deleted("u1", 3, Utc::now() - Duration::seconds(1))
        .await
        .unwrap();

    mount_timeline(&server, "u1", "100", timeline(&[("105", "launch")])).await;

    let report = state.sync.run_pass().await.unwrap();
    assert_eq!(report.collections_updated, 1);
    assert_eq!(report.collections_purged, 1);

    assert_eq!(
        db.get_collection("u1", 1).await.unwrap().unwrap().matched_item_ids,
        ids(&["105"])
    );
    assert!(db
        .get_collection("u1", 2)
        .await
        .unwrap()
        .unwrap()
        .matched_item_ids
        .is_empty());
    assert!(db.get_collection("u1", 3).await.unwrap().is_none());
}
