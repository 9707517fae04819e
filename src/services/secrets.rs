// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Secrets blob fetched once at startup from an HTTP secrets endpoint.
//!
//! The endpoint is a local secrets-caching sidecar: `GET {url}` with the
//! session token in a header, returning either the secret JSON itself or an
//! envelope whose `SecretString` field holds it.

use crate::config::ConfigError;
use serde::Deserialize;
use std::time::Duration;

const SECRETS_TOKEN_HEADER: &str = "X-Aws-Parameters-Secrets-Token";

/// Opaque secrets bundle. Every field is optional so a partial blob only
/// overrides what it carries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppSecrets {
    #[serde(rename = "TwitterClientId", default)]
    pub twitter_client_id: Option<String>,
    #[serde(rename = "TwitterClientSecret", default)]
    pub twitter_client_secret: Option<String>,
    #[serde(rename = "SyncTriggerToken", default)]
    pub sync_trigger_token: Option<String>,
    #[serde(rename = "GitHubAppId", default)]
    pub github_app_id: Option<String>,
    /// Base64 of the PEM-encoded RSA private key.
    #[serde(rename = "GitHubAppPem", default)]
    pub github_app_pem: Option<String>,
    #[serde(rename = "GitHubInstallationId", default)]
    pub github_installation_id: Option<String>,
}

#[derive(Deserialize)]
struct SecretEnvelope {
    #[serde(rename = "SecretString")]
    secret_string: String,
}

/// Client for the secrets endpoint.
pub struct SecretsProvider {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl SecretsProvider {
    pub fn new(url: String, token: Option<String>, timeout: Duration) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::SecretManager(e.to_string()))?;

        Ok(Self { http, url, token })
    }

    pub async fn fetch(&self) -> Result<AppSecrets, ConfigError> {
        let mut request = self.http.get(&self.url);
        if let Some(token) = &self.token {
            request = request.header(SECRETS_TOKEN_HEADER, token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ConfigError::SecretManager(format!("Secrets request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(ConfigError::SecretManager(format!(
                "Secrets endpoint returned {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ConfigError::SecretManager(e.to_string()))?;

        parse_secrets(&body)
    }
}

/// Parse either a bare secrets object or a `SecretString` envelope.
pub fn parse_secrets(body: &str) -> Result<AppSecrets, ConfigError> {
    let parse_err = |e: serde_json::Error| ConfigError::SecretManager(format!("Invalid secrets JSON: {}", e));

    match serde_json::from_str::<SecretEnvelope>(body) {
        Ok(envelope) => serde_json::from_str(&envelope.secret_string).map_err(parse_err),
        Err(_) => serde_json::from_str(body).map_err(parse_err),
    }
}
