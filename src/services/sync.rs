// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync pass: fetch new tweets for every user, match them against the user's
//! collections, merge the matches and advance the cursor.
//!
//! Per user the steps are strictly ordered and the cursor is written last, so
//! a crash anywhere before it makes the next pass re-fetch the same page. The
//! merges are set-unions, so replaying them is harmless.

use crate::db::SharedStore;
use crate::error::AppError;
use crate::models::{Collection, ItemIdSet, UserPatch, UserRecord};
use crate::services::archive::ArchiveMirror;
use crate::services::matcher::{match_items, MatchSet};
use crate::services::tokens::TokenService;
use crate::services::twitter::TwitterClient;
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashMap;

/// What happened to one user during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserOutcome {
    /// Owns no live collections; nothing fetched.
    NoCollections,
    CredentialFailed,
    FetchFailed,
    NoNewItems,
    /// A rule could not be evaluated; nothing merged, cursor untouched.
    MatchFailed,
    /// A merge or the cursor write failed; cursor untouched.
    StoreFailed,
    Synced {
        items: usize,
        collections_updated: usize,
        cursor_advanced: bool,
    },
}

/// Per-outcome counts for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub users_scanned: usize,
    pub users_synced: usize,
    pub users_without_collections: usize,
    pub users_without_new_items: usize,
    pub credential_failures: usize,
    pub fetch_failures: usize,
    pub match_failures: usize,
    pub store_failures: usize,
    pub items_fetched: usize,
    pub collections_updated: usize,
    pub collections_purged: usize,
}

impl SyncReport {
    fn record(&mut self, outcome: &UserOutcome) {
        match outcome {
            UserOutcome::NoCollections => self.users_without_collections += 1,
            UserOutcome::CredentialFailed => self.credential_failures += 1,
            UserOutcome::FetchFailed => self.fetch_failures += 1,
            UserOutcome::NoNewItems => self.users_without_new_items += 1,
            UserOutcome::MatchFailed => self.match_failures += 1,
            UserOutcome::StoreFailed => self.store_failures += 1,
            UserOutcome::Synced {
                items,
                collections_updated,
                ..
            } => {
                self.users_synced += 1;
                self.items_fetched += items;
                self.collections_updated += collections_updated;
            }
        }
    }

    /// Users whose pass ended in an error.
    pub fn failures(&self) -> usize {
        self.credential_failures + self.fetch_failures + self.match_failures + self.store_failures
    }
}

/// Runs sync passes over all users.
#[derive(Clone)]
pub struct SyncService {
    store: SharedStore,
    tokens: TokenService,
    twitter: TwitterClient,
    archive: Option<ArchiveMirror>,
    concurrency: usize,
}

impl SyncService {
    pub fn new(
        store: SharedStore,
        tokens: TokenService,
        twitter: TwitterClient,
        archive: Option<ArchiveMirror>,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            tokens,
            twitter,
            archive,
            concurrency: concurrency.max(1),
        }
    }

    /// One pass over every user.
    ///
    /// Fails only if the initial scans fail. Individual users that fail are
    /// counted in the report and retried on the next pass.
    pub async fn run_pass(&self) -> Result<SyncReport, AppError> {
        let users = self.store.scan_users().await?;
        let collections = self.store.scan_collections().await?;

        let mut by_user: HashMap<String, Vec<Collection>> = HashMap::new();
        for collection in collections.into_iter().filter(|c| !c.is_deleted()) {
            by_user
                .entry(collection.user_id.clone())
                .or_default()
                .push(collection);
        }

        tracing::info!(
            users = users.len(),
            owners = by_user.len(),
            concurrency = self.concurrency,
            "Starting sync pass"
        );

        let mut report = SyncReport {
            users_scanned: users.len(),
            ..Default::default()
        };

        let outcomes: Vec<UserOutcome> = stream::iter(users)
            .map(|user| {
                let owned = by_user.remove(&user.user_id).unwrap_or_default();
                async move { self.sync_user(&user, &owned).await }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for outcome in &outcomes {
            report.record(outcome);
        }

        match self.store.purge_expired_collections(Utc::now()).await {
            Ok(purged) => report.collections_purged = purged,
            Err(e) => tracing::warn!(error = %e, "Failed to purge expired collections"),
        }

        tracing::info!(
            synced = report.users_synced,
            failures = report.failures(),
            items = report.items_fetched,
            collections_updated = report.collections_updated,
            "Sync pass complete"
        );

        Ok(report)
    }

    /// Sync one user against their live collections.
    pub async fn sync_user(&self, user: &UserRecord, collections: &[Collection]) -> UserOutcome {
        let user_id = user.user_id.as_str();

        if collections.is_empty() {
            return UserOutcome::NoCollections;
        }

        let access_token = match self.tokens.ensure_access_token(user_id).await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Skipping user: no valid credential");
                return UserOutcome::CredentialFailed;
            }
        };

        let page = match self
            .twitter
            .fetch_new_items(&access_token, user_id, user.last_item_cursor.as_ref())
            .await
        {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Skipping user: fetch failed");
                return UserOutcome::FetchFailed;
            }
        };

        if page.items.is_empty() {
            tracing::debug!(user_id, "No new items");
            return UserOutcome::NoNewItems;
        }

        let matches = match match_items(&page.items, collections) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::error!(user_id, error = %e, "Skipping user: rule evaluation failed");
                return UserOutcome::MatchFailed;
            }
        };

        if let Err(e) = self.merge_all(user_id, &matches).await {
            tracing::error!(user_id, error = %e, "Merge failed, cursor left in place");
            return UserOutcome::StoreFailed;
        }

        // Cursor goes last and only ever moves forward.
        let mut cursor_advanced = false;
        if let Some(newest) = page.newest_cursor {
            let is_newer = user
                .last_item_cursor
                .as_ref()
                .map_or(true, |current| newest.is_newer_than(current));

            if is_newer {
                if let Err(e) = self
                    .store
                    .update_user(user_id, &UserPatch::cursor_advanced(newest.clone()))
                    .await
                {
                    tracing::error!(user_id, error = %e, "Failed to advance cursor");
                    return UserOutcome::StoreFailed;
                }
                cursor_advanced = true;
                tracing::debug!(user_id, cursor = %newest, "Cursor advanced");
            }
        }

        if let Some(archive) = &self.archive {
            for collection_id in matches.keys() {
                if let Err(e) = self
                    .archive_collection(archive, &access_token, user_id, *collection_id)
                    .await
                {
                    tracing::warn!(user_id, collection_id, error = %e, "Archive snapshot failed");
                }
            }
        }

        tracing::info!(
            user_id,
            items = page.items.len(),
            collections_updated = matches.len(),
            "User synced"
        );

        UserOutcome::Synced {
            items: page.items.len(),
            collections_updated: matches.len(),
            cursor_advanced,
        }
    }

    async fn merge_all(&self, user_id: &str, matches: &MatchSet) -> Result<(), AppError> {
        for (collection_id, item_ids) in matches {
            let set: ItemIdSet = item_ids.iter().cloned().collect();
            self.store.merge_matches(user_id, *collection_id, &set).await?;
            tracing::debug!(user_id, collection_id, count = set.len(), "Merged matches");
        }
        Ok(())
    }

    async fn archive_collection(
        &self,
        archive: &ArchiveMirror,
        access_token: &str,
        user_id: &str,
        collection_id: u64,
    ) -> Result<(), AppError> {
        let collection = self
            .store
            .get_collection(user_id, collection_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Collection {}", collection_id)))?;

        let snapshot = self
            .twitter
            .lookup_items(access_token, &collection.matched_item_ids.to_vec())
            .await?;

        archive.publish(user_id, collection_id, &snapshot).await
    }
}
