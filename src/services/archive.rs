// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Archive mirror: publishes collection snapshots to a GitHub repository.
//!
//! Authenticates as a GitHub App (RS256 app JWT exchanged for an installation
//! token) and writes `albums/{user_id}/{collection_id}.json` through the
//! contents API.

use crate::config::ArchiveSettings;
use crate::error::AppError;
use crate::models::ItemSnapshot;
use crate::time_utils::format_utc_rfc3339;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const USER_AGENT: &str = "album-sync";
const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// App JWT lifetime; GitHub rejects anything over ten minutes.
const APP_JWT_TTL_SECS: i64 = 9 * 60;

#[derive(Serialize)]
struct AppClaims {
    iat: i64,
    exp: i64,
    iss: String,
}

#[derive(Deserialize)]
struct InstallationToken {
    token: String,
}

#[derive(Deserialize)]
struct ContentsEntry {
    sha: String,
}

#[derive(Serialize)]
struct PutContents<'a> {
    message: String,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

/// GitHub contents-API writer.
#[derive(Clone)]
pub struct ArchiveMirror {
    http: reqwest::Client,
    settings: ArchiveSettings,
    key: EncodingKey,
}

impl ArchiveMirror {
    pub fn new(settings: ArchiveSettings, timeout: Duration) -> Result<Self, AppError> {
        let key = EncodingKey::from_rsa_pem(settings.private_key_pem.as_bytes())
            .map_err(|e| AppError::Archive(format!("Invalid GitHub App private key: {}", e)))?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            settings,
            key,
        })
    }

    /// Repository path of a collection snapshot.
    pub fn snapshot_path(user_id: &str, collection_id: u64) -> String {
        format!(
            "albums/{}/{}.json",
            urlencoding::encode(user_id),
            collection_id
        )
    }

    /// Write (create or replace) the snapshot of one collection.
    pub async fn publish(
        &self,
        user_id: &str,
        collection_id: u64,
        snapshot: &ItemSnapshot,
    ) -> Result<(), AppError> {
        let token = self.installation_token().await?;
        let path = Self::snapshot_path(user_id, collection_id);
        let url = format!(
            "{}/repos/{}/contents/{}",
            self.settings.api_base_url, self.settings.repo, path
        );

        let sha = self.existing_sha(&url, &token).await?;

        let body = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| AppError::Archive(format!("Failed to serialize snapshot: {}", e)))?;

        let put = PutContents {
            message: format!(
                "Update album {} ({})",
                collection_id,
                format_utc_rfc3339(Utc::now())
            ),
            content: STANDARD.encode(body),
            branch: &self.settings.branch,
            sha,
        };

        let response = self
            .http
            .put(&url)
            .bearer_auth(&token)
            .header(reqwest::header::ACCEPT, GITHUB_ACCEPT)
            .json(&put)
            .send()
            .await
            .map_err(|e| AppError::Archive(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Archive(format!("HTTP {}: {}", status, body)));
        }

        tracing::info!(user_id, collection_id, path = %path, "Archived collection snapshot");
        Ok(())
    }

    /// Blob sha of the current file, required by the API to replace it.
    async fn existing_sha(&self, url: &str, token: &str) -> Result<Option<String>, AppError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, GITHUB_ACCEPT)
            .query(&[("ref", self.settings.branch.as_str())])
            .send()
            .await
            .map_err(|e| AppError::Archive(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::Archive(format!("Contents lookup failed: HTTP {}", status)));
        }

        let entry: ContentsEntry = response
            .json()
            .await
            .map_err(|e| AppError::Archive(format!("JSON parse error: {}", e)))?;

        Ok(Some(entry.sha))
    }

    async fn installation_token(&self) -> Result<String, AppError> {
        let jwt = self.app_jwt()?;
        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.settings.api_base_url, self.settings.installation_id
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(jwt)
            .header(reqwest::header::ACCEPT, GITHUB_ACCEPT)
            .send()
            .await
            .map_err(|e| AppError::Archive(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Archive(format!(
                "Installation token request failed: HTTP {}: {}",
                status, body
            )));
        }

        let token: InstallationToken = response
            .json()
            .await
            .map_err(|e| AppError::Archive(format!("JSON parse error: {}", e)))?;

        Ok(token.token)
    }

    fn app_jwt(&self) -> Result<String, AppError> {
        // Backdated to tolerate clock skew with GitHub.
        let now = Utc::now().timestamp() - 60;
        let claims = AppClaims {
            iat: now,
            exp: now + APP_JWT_TTL_SECS,
            iss: self.settings.app_id.clone(),
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| AppError::Archive(format!("Failed to sign app JWT: {}", e)))
    }
}
