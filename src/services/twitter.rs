// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Twitter API v2 client.
//!
//! Handles:
//! - Incremental timeline fetches since a cursor
//! - Tweet lookup with author and media expansions
//! - OAuth 2.0 code exchange (PKCE) and token refresh

use crate::error::AppError;
use crate::models::{Cursor, FetchedPage, Item, ItemSnapshot, SnapshotIncludes};
use serde::Deserialize;
use std::time::Duration;

/// Page size for timeline fetches (API maximum).
const MAX_RESULTS: u32 = 100;

/// Maximum ids per tweet lookup request.
const LOOKUP_CHUNK: usize = 100;

const USER_FIELDS: &str = "id,name,profile_image_url,protected,url,username";

/// Twitter API client.
#[derive(Clone)]
pub struct TwitterClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
}

impl TwitterClient {
    /// Create a new client. Every request is bounded by `timeout`.
    pub fn new(
        base_url: impl Into<String>,
        client_id: String,
        client_secret: String,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_id,
            client_secret,
        })
    }

    /// Fetch the user's own tweets newer than `since`, newest first.
    ///
    /// Retweets and replies are excluded. Only the first page is read; anything
    /// beyond it is picked up on a later pass because the cursor only moves to
    /// the newest id actually returned.
    pub async fn fetch_new_items(
        &self,
        access_token: &str,
        user_id: &str,
        since: Option<&Cursor>,
    ) -> Result<FetchedPage, AppError> {
        let url = format!(
            "{}/2/users/{}/tweets",
            self.base_url,
            urlencoding::encode(user_id)
        );

        let mut query: Vec<(&str, String)> = vec![
            ("exclude", "retweets,replies".to_string()),
            ("expansions", "author_id".to_string()),
            ("max_results", MAX_RESULTS.to_string()),
        ];
        if let Some(cursor) = since {
            query.push(("since_id", cursor.to_string()));
        }

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&query)
            .send()
            .await
            .map_err(|e| AppError::Fetch(e.to_string()))?;

        let timeline: TimelineResponse = check_response_json(response).await?;

        let newest_cursor = timeline
            .meta
            .and_then(|m| m.newest_id)
            .or_else(|| timeline.data.first().map(|item| item.id.clone()))
            .map(Cursor::new);

        tracing::debug!(
            user_id,
            count = timeline.data.len(),
            newest = ?newest_cursor,
            "Fetched timeline page"
        );

        Ok(FetchedPage {
            items: timeline.data,
            newest_cursor,
        })
    }

    /// Look up tweets by id with author and media expansions.
    pub async fn lookup_items(
        &self,
        access_token: &str,
        ids: &[String],
    ) -> Result<ItemSnapshot, AppError> {
        let url = format!("{}/2/tweets", self.base_url);
        let mut snapshot = ItemSnapshot::default();

        for chunk in ids.chunks(LOOKUP_CHUNK) {
            let response = self
                .http
                .get(&url)
                .bearer_auth(access_token)
                .query(&[
                    ("ids", chunk.join(",")),
                    ("expansions", "author_id,attachments.media_keys".to_string()),
                    ("media.fields", "preview_image_url".to_string()),
                    ("tweet.fields", "text".to_string()),
                    ("user.fields", USER_FIELDS.to_string()),
                ])
                .send()
                .await
                .map_err(|e| AppError::Fetch(e.to_string()))?;

            let page: LookupResponse = check_response_json(response).await?;
            snapshot.extend(ItemSnapshot {
                tweets: page.data,
                includes: page.includes,
            });
        }

        Ok(snapshot)
    }

    /// Profile of the user owning `access_token`.
    pub async fn get_me(&self, access_token: &str) -> Result<TwitterUser, AppError> {
        let url = format!("{}/2/users/me", self.base_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("user.fields", "profile_image_url")])
            .send()
            .await
            .map_err(|e| AppError::Fetch(e.to_string()))?;

        let me: DataEnvelope<TwitterUser> = check_response_json(response).await?;
        Ok(me.data)
    }

    /// Exchange an authorization code (PKCE) for a token pair.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, AppError> {
        let response = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("code_verifier", code_verifier),
                ("redirect_uri", redirect_uri),
                ("client_id", self.client_id.as_str()),
            ])
            .await
            .map_err(|e| AppError::BadRequest(format!("Token exchange failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Twitter token exchange failed");
            return Err(AppError::BadRequest(format!(
                "Token exchange failed with status {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Fetch(format!("Failed to parse token response: {}", e)))
    }

    /// Exchange a refresh token for a new token pair.
    ///
    /// Any failure is a [`AppError::CredentialRefresh`]; the caller decides
    /// whether the user has to sign in again.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        let response = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
            ])
            .await
            .map_err(|e| AppError::CredentialRefresh(format!("Token refresh request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::CredentialRefresh(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::CredentialRefresh(format!("Failed to parse token response: {}", e)))
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<reqwest::Response, reqwest::Error> {
        self.http
            .post(format!("{}/2/oauth2/token", self.base_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(form)
            .send()
            .await
    }
}

/// Check response status and parse the JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            tracing::warn!("Twitter rate limit hit (429)");
        }

        return Err(AppError::Fetch(format!("HTTP {}: {}", status, body)));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::Fetch(format!("JSON parse error: {}", e)))
}

/// Token response from the OAuth 2.0 token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Twitter rotates refresh tokens, but only when `offline.access` was granted.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of `access_token` in seconds.
    pub expires_in: i64,
}

/// Authenticated user profile.
#[derive(Debug, Clone, Deserialize)]
pub struct TwitterUser {
    pub id: String,
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub profile_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct TimelineResponse {
    /// Absent when there are no new tweets.
    #[serde(default)]
    data: Vec<Item>,
    #[serde(default)]
    meta: Option<TimelineMeta>,
}

#[derive(Debug, Deserialize)]
struct TimelineMeta {
    #[serde(default)]
    newest_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    data: Vec<serde_json::Value>,
    #[serde(default)]
    includes: SnapshotIncludes,
}
