//! Database layer.
//!
//! The sync engine talks to the store only through [`CredentialStore`] and
//! [`CollectionStore`]. Every mutation is a single-record merge-patch or a
//! set-union, so a crash between two writes never clobbers unwritten fields.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{Collection, ItemIdSet, UserPatch, UserRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const COLLECTIONS: &str = "collections";
}

/// Typed access to per-user credential records.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, AppError>;

    /// Full write, used when a user signs in.
    async fn put_user(&self, user: &UserRecord) -> Result<(), AppError>;

    /// Merge-patch: fields not set in `patch` are left untouched.
    async fn update_user(&self, user_id: &str, patch: &UserPatch) -> Result<(), AppError>;

    async fn scan_users(&self) -> Result<Vec<UserRecord>, AppError>;

    /// Lookup through the handle (screen name) index.
    async fn find_user_by_handle(&self, username: &str) -> Result<Option<UserRecord>, AppError>;
}

/// Typed access to collections and their matched item sets.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    async fn get_collection(
        &self,
        user_id: &str,
        collection_id: u64,
    ) -> Result<Option<Collection>, AppError>;

    async fn put_collection(&self, collection: &Collection) -> Result<(), AppError>;

    /// Collections owned by `user_id`, newest first.
    async fn query_collections(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<Collection>, AppError>;

    async fn scan_collections(&self) -> Result<Vec<Collection>, AppError>;

    /// Set-union `item_ids` into the collection's matched set.
    ///
    /// Commutative and idempotent: re-applying the same merge after a crash
    /// never duplicates or drops an id.
    async fn merge_matches(
        &self,
        user_id: &str,
        collection_id: u64,
        item_ids: &ItemIdSet,
    ) -> Result<(), AppError>;

    /// Soft-delete: sets `deletion_time` without removing the record.
    async fn mark_collection_deleted(
        &self,
        user_id: &str,
        collection_id: u64,
        deletion_time: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Physically remove collections whose `deletion_time` has passed.
    async fn purge_expired_collections(&self, now: DateTime<Utc>) -> Result<usize, AppError>;
}

/// Both adapters over one backend.
pub trait Store: CredentialStore + CollectionStore {}

impl<T: CredentialStore + CollectionStore> Store for T {}

/// Store handle shared by services and handlers.
pub type SharedStore = Arc<dyn Store>;
