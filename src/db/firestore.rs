// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (credential records, keyed by Twitter user ID)
//! - Collections (keyed by `{user_id}_{collection_id}`)

use crate::db::{collections, CollectionStore, CredentialStore};
use crate::error::AppError;
use crate::models::{Collection, ItemIdSet, UserPatch, UserRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use firestore::errors::FirestoreError;
use firestore::FirestoreWritePrecondition;
use serde::{Deserialize, Serialize};

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

/// Single-field patch used for soft deletion.
#[derive(Serialize, Deserialize)]
struct DeletionPatch {
    deletion_time: DateTime<Utc>,
}

/// Map a failed patch of an existing document. Patches carry an
/// `Exists(true)` precondition, so a missing target surfaces as not-found
/// instead of creating a partial document.
fn patch_error(err: FirestoreError, what: impl FnOnce() -> String) -> AppError {
    match err {
        FirestoreError::DataNotFoundError(_) => AppError::NotFound(what()),
        other => AppError::Store(other.to_string()),
    }
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Store(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| AppError::Store(format!("Failed to connect to Firestore Emulator: {}", e)))?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client for testing.
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Store("Database not connected (offline mode)".to_string()))
    }

    /// Helper to batch delete documents using transactions.
    async fn batch_delete(&self, doc_ids: &[String], collection: &str) -> Result<(), AppError> {
        let client = self.get_client()?;

        for chunk in doc_ids.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Store(format!("Failed to begin transaction: {}", e)))?;

            for doc_id in chunk {
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Store(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction
                .commit()
                .await
                .map_err(|e| AppError::Store(format!("Failed to commit batch deletion: {}", e)))?;
        }

        Ok(())
    }
}

// ─── User Operations ─────────────────────────────────────────

#[async_trait]
impl CredentialStore for FirestoreDb {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Store(e.to_string()))
    }

    async fn put_user(&self, user: &UserRecord) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.user_id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;
        Ok(())
    }

    async fn update_user(&self, user_id: &str, patch: &UserPatch) -> Result<(), AppError> {
        let fields = patch.field_names();
        if fields.is_empty() {
            return Ok(());
        }

        // The update mask restricts the write to the fields present in the patch.
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(fields)
            .in_col(collections::USERS)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(user_id)
            .object(patch)
            .execute()
            .await
            .map_err(|e| patch_error(e, || format!("User {}", user_id)))?;
        Ok(())
    }

    async fn scan_users(&self) -> Result<Vec<UserRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Store(e.to_string()))
    }

    async fn find_user_by_handle(&self, username: &str) -> Result<Option<UserRecord>, AppError> {
        let users: Vec<UserRecord> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(|q| q.for_all([q.field("username").eq(username)]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;

        Ok(users.into_iter().next())
    }
}

// ─── Collection Operations ───────────────────────────────────

#[async_trait]
impl CollectionStore for FirestoreDb {
    async fn get_collection(
        &self,
        user_id: &str,
        collection_id: u64,
    ) -> Result<Option<Collection>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::COLLECTIONS)
            .obj()
            .one(&Collection::document_id_for(user_id, collection_id))
            .await
            .map_err(|e| AppError::Store(e.to_string()))
    }

    async fn put_collection(&self, collection: &Collection) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::COLLECTIONS)
            .document_id(collection.document_id())
            .object(collection)
            .execute()
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;
        Ok(())
    }

    async fn query_collections(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<Collection>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::COLLECTIONS)
            .filter(|q| q.for_all([q.field("user_id").eq(user_id)]))
            .order_by([("id", firestore::FirestoreQueryDirection::Descending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Store(e.to_string()))
    }

    async fn scan_collections(&self) -> Result<Vec<Collection>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::COLLECTIONS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Store(e.to_string()))
    }

    async fn merge_matches(
        &self,
        user_id: &str,
        collection_id: u64,
        item_ids: &ItemIdSet,
    ) -> Result<(), AppError> {
        if item_ids.is_empty() {
            return Ok(());
        }

        let client = self.get_client()?;
        let doc_id = Collection::document_id_for(user_id, collection_id);
        let values = item_ids.to_vec();

        // arrayUnion is applied server-side, so concurrent or repeated merges
        // converge on the same set.
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Store(format!("Failed to begin transaction: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::COLLECTIONS)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(&doc_id)
            .transforms(|t| {
                t.fields([t
                    .field("matched_item_ids")
                    .append_missing_elements(values.clone())])
            })
            .only_transform()
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Store(format!("Failed to add merge to transaction: {}", e))
            })?;

        transaction.commit().await.map_err(|e| {
            patch_error(e, || format!("Collection {}", collection_id))
        })?;

        tracing::debug!(
            user_id,
            collection_id,
            count = item_ids.len(),
            "Merged matched items"
        );

        Ok(())
    }

    async fn mark_collection_deleted(
        &self,
        user_id: &str,
        collection_id: u64,
        deletion_time: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(["deletion_time"])
            .in_col(collections::COLLECTIONS)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(Collection::document_id_for(user_id, collection_id))
            .object(&DeletionPatch { deletion_time })
            .execute()
            .await
            .map_err(|e| patch_error(e, || format!("Collection {}", collection_id)))?;
        Ok(())
    }

    async fn purge_expired_collections(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let expired: Vec<String> = self
            .scan_collections()
            .await?
            .into_iter()
            .filter(|c| c.is_purgeable(now))
            .map(|c| c.document_id())
            .collect();

        self.batch_delete(&expired, collections::COLLECTIONS).await?;

        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "Purged expired collections");
        }

        Ok(expired.len())
    }
}
