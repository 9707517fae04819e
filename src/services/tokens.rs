// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token lifecycle: provider refresh and authorization-token reconciliation.
//!
//! Each user record carries two access tokens. `provider_access_token` is
//! always the newest token Twitter issued; `authorization_access_token` is the
//! one last handed to the browser. A background refresh only touches the
//! provider token, and the next authenticated request advances the
//! authorization token to match.

use crate::db::SharedStore;
use crate::error::AppError;
use crate::models::{UserPatch, UserRecord};
use crate::services::twitter::TwitterClient;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;

/// Shared refresh locks type for use in AppState.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Outcome of checking a presented authorization token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub is_authorized: bool,
    /// Token the client should use from now on.
    pub effective_access_token: String,
    /// True when the stored authorization token was advanced.
    pub rotated: bool,
}

/// Result of a completed sign-in.
#[derive(Debug, Clone)]
pub struct SignInResult {
    pub user_id: String,
    pub name: String,
    pub username: String,
    pub profile_image_url: Option<String>,
    pub access_token: String,
}

/// Manages the provider and authorization tokens of every user.
#[derive(Clone)]
pub struct TokenService {
    client: TwitterClient,
    store: SharedStore,
    /// Per-user mutex to serialize token refresh operations.
    refresh_locks: RefreshLocks,
    refresh_margin: Duration,
}

impl TokenService {
    pub fn new(
        client: TwitterClient,
        store: SharedStore,
        refresh_locks: RefreshLocks,
        refresh_margin: Duration,
    ) -> Self {
        Self {
            client,
            store,
            refresh_locks,
            refresh_margin,
        }
    }

    /// Return a provider access token for `user_id` that is valid for at
    /// least the refresh margin, refreshing it first if needed.
    ///
    /// A rejected refresh surfaces as [`AppError::CredentialRefresh`] and is
    /// not retried; the record stays expired until the user signs in again.
    pub async fn ensure_access_token(&self, user_id: &str) -> Result<String, AppError> {
        let user = self.load_user(user_id).await?;
        if self.is_fresh(&user) {
            return Ok(user.provider_access_token);
        }

        let lock = self
            .refresh_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let _guard = lock.lock().await;

        // Another task may have refreshed while we were waiting.
        let user = self.load_user(user_id).await?;
        if self.is_fresh(&user) {
            return Ok(user.provider_access_token);
        }

        tracing::info!(user_id, "Access token expired, refreshing");

        let tokens = match self.client.refresh_token(&user.provider_refresh_token).await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Token refresh rejected");
                return Err(e);
            }
        };

        let expiration_time = Utc::now() + Duration::seconds(tokens.expires_in);
        let refresh_token = tokens
            .refresh_token
            .unwrap_or(user.provider_refresh_token);

        self.store
            .update_user(
                user_id,
                &UserPatch::refreshed_tokens(
                    tokens.access_token.clone(),
                    refresh_token,
                    expiration_time,
                ),
            )
            .await?;

        tracing::info!(user_id, expires = %expiration_time, "Token refreshed");
        Ok(tokens.access_token)
    }

    /// Check a token presented by a client and catch the authorization token
    /// up with the provider token.
    ///
    /// The client is authorized iff `presented` equals the stored
    /// authorization token. When authorized and a background refresh has
    /// happened since, the stored authorization token is advanced to the
    /// provider token and that token is returned as effective.
    pub async fn reconcile_authorization_token(
        &self,
        user_id: &str,
        presented: &str,
    ) -> Result<Reconciliation, AppError> {
        let Some(user) = self.store.get_user(user_id).await? else {
            return Ok(Reconciliation {
                is_authorized: false,
                effective_access_token: presented.to_string(),
                rotated: false,
            });
        };

        let is_authorized: bool = presented
            .as_bytes()
            .ct_eq(user.authorization_access_token.as_bytes())
            .into();

        if !is_authorized {
            tracing::debug!(user_id, "Presented token does not match");
            return Ok(Reconciliation {
                is_authorized: false,
                effective_access_token: presented.to_string(),
                rotated: false,
            });
        }

        if user.provider_access_token == user.authorization_access_token {
            return Ok(Reconciliation {
                is_authorized: true,
                effective_access_token: presented.to_string(),
                rotated: false,
            });
        }

        self.store
            .update_user(
                user_id,
                &UserPatch::authorization_advanced(user.provider_access_token.clone()),
            )
            .await?;

        tracing::info!(user_id, "Authorization token advanced to provider token");

        Ok(Reconciliation {
            is_authorized: true,
            effective_access_token: user.provider_access_token,
            rotated: true,
        })
    }

    /// Complete an OAuth 2.0 PKCE sign-in and store the user record.
    ///
    /// Both tokens are set to the freshly issued access token. A known user
    /// is merge-patched, so their cursor and creation time are kept.
    pub async fn handle_oauth_callback(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<SignInResult, AppError> {
        let tokens = self
            .client
            .exchange_code(code, code_verifier, redirect_uri)
            .await?;

        let refresh_token = tokens.refresh_token.ok_or_else(|| {
            AppError::BadRequest("Token response has no refresh token (offline.access scope missing)".to_string())
        })?;

        let me = self.client.get_me(&tokens.access_token).await?;
        let now = Utc::now();
        let expiration_time = now + Duration::seconds(tokens.expires_in);

        if self.store.get_user(&me.id).await?.is_some() {
            // A concurrent sync pass may have advanced the cursor.
            let patch = UserPatch::signed_in(
                tokens.access_token.clone(),
                refresh_token,
                expiration_time,
                me.name.clone(),
                me.username.clone(),
                me.profile_image_url.clone(),
            );
            self.store.update_user(&me.id, &patch).await?;
        } else {
            let user = UserRecord {
                user_id: me.id.clone(),
                provider_access_token: tokens.access_token.clone(),
                provider_refresh_token: refresh_token,
                authorization_access_token: tokens.access_token.clone(),
                expiration_time,
                last_item_cursor: None,
                name: Some(me.name.clone()),
                username: Some(me.username.clone()),
                profile_image_url: me.profile_image_url.clone(),
                created_at: now,
                updated_at: now,
            };
            self.store.put_user(&user).await?;
        }

        tracing::info!(
            user_id = %me.id,
            username = %me.username,
            "OAuth callback handled, user stored"
        );

        Ok(SignInResult {
            user_id: me.id,
            name: me.name,
            username: me.username,
            profile_image_url: me.profile_image_url,
            access_token: tokens.access_token,
        })
    }

    fn is_fresh(&self, user: &UserRecord) -> bool {
        Utc::now() + self.refresh_margin < user.expiration_time
    }

    async fn load_user(&self, user_id: &str) -> Result<UserRecord, AppError> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))
    }
}
