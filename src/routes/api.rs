// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Collection (album) routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Collection, ItemSnapshot, Rule};
use crate::time_utils::next_collection_id;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// Newest collections returned by the list endpoints.
const LIST_LIMIT: u32 = 50;

/// Routes that require authentication.
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/collections", post(create_collection))
        .route("/collections/{id}", delete(delete_collection))
        .route("/users/{user_id}/collections/{id}", get(show_collection))
}

/// Public read-only routes.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/{user_id}/collections", get(list_collections))
        .route("/handles/{username}/collections", get(list_collections_by_handle))
}

// ─── Create / Delete ─────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCollectionRequest {
    #[serde(default)]
    #[validate(length(max = 200))]
    title: Option<String>,
    /// Shorthand for a single keyword rule.
    #[serde(default)]
    #[validate(length(min = 1, max = 100))]
    keyword: Option<String>,
    #[serde(default)]
    #[validate(length(max = 20))]
    rules: Vec<Rule>,
}

impl CreateCollectionRequest {
    fn into_rules(self) -> Result<(String, Vec<Rule>)> {
        let mut rules = self.rules;
        if let Some(keyword) = &self.keyword {
            rules.insert(0, Rule::keyword(keyword.clone()));
        }

        if rules.is_empty() {
            return Err(AppError::BadRequest(
                "keyword or rules is required".to_string(),
            ));
        }

        for rule in &rules {
            match rule {
                Rule::Keyword { keyword } if keyword.is_empty() => {
                    return Err(AppError::BadRequest("keyword must not be empty".to_string()));
                }
                Rule::Keyword { .. } => {}
                Rule::Pattern { .. } | Rule::Unsupported => {
                    return Err(AppError::BadRequest(format!(
                        "{} rules are not supported",
                        rule.kind()
                    )));
                }
            }
        }

        let title = self
            .title
            .or(self.keyword)
            .unwrap_or_default();

        Ok((title, rules))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateCollectionResponse {
    pub id: u64,
}

/// Create a collection owned by the caller.
///
/// The id is the creation time in milliseconds, bumped past the caller's
/// newest collection so ids stay strictly increasing per user.
async fn create_collection(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateCollectionRequest>,
) -> Result<Json<CreateCollectionResponse>> {
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let (title, rules) = request.into_rules()?;

    let newest = state
        .db
        .query_collections(&user.user_id, 1)
        .await?
        .first()
        .map(|c| c.id);
    let id = next_collection_id(Utc::now(), newest);

    let collection = Collection::new(&user.user_id, id, title, rules);
    state.db.put_collection(&collection).await?;

    tracing::info!(
        user_id = %user.user_id,
        collection_id = id,
        rules = collection.rules.len(),
        "Collection created"
    );

    Ok(Json(CreateCollectionResponse { id }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteCollectionResponse {
    pub id: u64,
    pub deletion_time: DateTime<Utc>,
}

/// Soft-delete a collection; it is purged once the retention period passes.
async fn delete_collection(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<u64>,
) -> Result<Json<DeleteCollectionResponse>> {
    let collection = state
        .db
        .get_collection(&user.user_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Collection {}", id)))?;

    if let Some(deletion_time) = collection.deletion_time {
        return Ok(Json(DeleteCollectionResponse { id, deletion_time }));
    }

    let deletion_time = Utc::now() + state.config.collection_retention;
    state
        .db
        .mark_collection_deleted(&user.user_id, id, deletion_time)
        .await?;

    tracing::info!(
        user_id = %user.user_id,
        collection_id = id,
        deletion_time = %deletion_time,
        "Collection marked for deletion"
    );

    Ok(Json(DeleteCollectionResponse { id, deletion_time }))
}

// ─── Listing ─────────────────────────────────────────────────

/// Collection as returned by the list endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct CollectionResponse {
    pub id: u64,
    pub user_id: String,
    pub title: String,
    pub rules: Vec<Rule>,
    pub tweets: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Collection> for CollectionResponse {
    fn from(c: Collection) -> Self {
        Self {
            id: c.id,
            user_id: c.user_id,
            title: c.title,
            rules: c.rules,
            tweets: c.matched_item_ids.to_vec(),
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CollectionListResponse {
    pub albums: Vec<CollectionResponse>,
}

async fn list_collections(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<CollectionListResponse>> {
    list_for_user(&state, &user_id).await
}

/// Same as the user listing, resolved through the handle index.
async fn list_collections_by_handle(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<CollectionListResponse>> {
    let user = state
        .db
        .find_user_by_handle(&username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User @{}", username)))?;

    list_for_user(&state, &user.user_id).await
}

async fn list_for_user(state: &AppState, user_id: &str) -> Result<Json<CollectionListResponse>> {
    // Deleted collections still occupy slots in the query, so the page can be
    // short until they are purged.
    let albums = state
        .db
        .query_collections(user_id, LIST_LIMIT)
        .await?
        .into_iter()
        .filter(|c| !c.is_deleted())
        .map(CollectionResponse::from)
        .collect();

    Ok(Json(CollectionListResponse { albums }))
}

// ─── Show ────────────────────────────────────────────────────

/// Hydrate a collection's tweets with the caller's access token.
async fn show_collection(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((owner_id, id)): Path<(String, u64)>,
) -> Result<Json<ItemSnapshot>> {
    let collection = state
        .db
        .get_collection(&owner_id, id)
        .await?
        .filter(|c| !c.is_deleted())
        .ok_or_else(|| AppError::NotFound(format!("Collection {}", id)))?;

    if collection.matched_item_ids.is_empty() {
        return Ok(Json(ItemSnapshot::default()));
    }

    let snapshot = state
        .twitter
        .lookup_items(&user.access_token, &collection.matched_item_ids.to_vec())
        .await?;

    tracing::debug!(
        user_id = %user.user_id,
        collection_id = id,
        tweets = snapshot.tweets.len(),
        "Collection hydrated"
    );

    Ok(Json(snapshot))
}
