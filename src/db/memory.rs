//! In-memory store.
//!
//! Used by tests and by local runs with `STORE_BACKEND=memory`. Mirrors the
//! Firestore semantics: merge-patch updates and set-union merges.

use crate::db::{CollectionStore, CredentialStore};
use crate::error::AppError;
use crate::models::{Collection, ItemIdSet, UserPatch, UserRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// In-memory implementation of both store adapters.
#[derive(Default)]
pub struct MemoryDb {
    users: RwLock<HashMap<String, UserRecord>>,
    /// Keyed by `(user_id, collection_id)` so per-user scans are ordered.
    collections: RwLock<BTreeMap<(String, u64), Collection>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryDb {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, AppError> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn put_user(&self, user: &UserRecord) -> Result<(), AppError> {
        self.users
            .write()
            .await
            .insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn update_user(&self, user_id: &str, patch: &UserPatch) -> Result<(), AppError> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))?;
        patch.apply_to(user);
        Ok(())
    }

    async fn scan_users(&self) -> Result<Vec<UserRecord>, AppError> {
        let mut users: Vec<UserRecord> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(users)
    }

    async fn find_user_by_handle(&self, username: &str) -> Result<Option<UserRecord>, AppError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.username.as_deref() == Some(username))
            .cloned())
    }
}

#[async_trait]
impl CollectionStore for MemoryDb {
    async fn get_collection(
        &self,
        user_id: &str,
        collection_id: u64,
    ) -> Result<Option<Collection>, AppError> {
        Ok(self
            .collections
            .read()
            .await
            .get(&(user_id.to_string(), collection_id))
            .cloned())
    }

    async fn put_collection(&self, collection: &Collection) -> Result<(), AppError> {
        self.collections.write().await.insert(
            (collection.user_id.clone(), collection.id),
            collection.clone(),
        );
        Ok(())
    }

    async fn query_collections(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<Collection>, AppError> {
        let mut owned: Vec<Collection> = self
            .collections
            .read()
            .await
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by_key(|c| Reverse(c.id));
        owned.truncate(limit as usize);
        Ok(owned)
    }

    async fn scan_collections(&self) -> Result<Vec<Collection>, AppError> {
        Ok(self.collections.read().await.values().cloned().collect())
    }

    async fn merge_matches(
        &self,
        user_id: &str,
        collection_id: u64,
        item_ids: &ItemIdSet,
    ) -> Result<(), AppError> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(&(user_id.to_string(), collection_id))
            .ok_or_else(|| {
                AppError::NotFound(format!("Collection {} for user {}", collection_id, user_id))
            })?;
        collection.matched_item_ids.union_with(item_ids);
        Ok(())
    }

    async fn mark_collection_deleted(
        &self,
        user_id: &str,
        collection_id: u64,
        deletion_time: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(&(user_id.to_string(), collection_id))
            .ok_or_else(|| {
                AppError::NotFound(format!("Collection {} for user {}", collection_id, user_id))
            })?;
        collection.deletion_time = Some(deletion_time);
        Ok(())
    }

    async fn purge_expired_collections(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let mut collections = self.collections.write().await;
        let before = collections.len();
        collections.retain(|_, c| !c.is_purgeable(now));
        Ok(before - collections.len())
    }
}
