//! Application configuration loaded from environment variables and the
//! secrets endpoint.
//!
//! Secrets are fetched once at startup and cached in memory.

use crate::services::secrets::{AppSecrets, SecretsProvider};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::env;
use std::time::Duration;

/// Which backend holds users and collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    /// Process-local; for tests and local runs.
    Memory,
}

/// GitHub App credentials and target for the archive mirror.
#[derive(Debug, Clone)]
pub struct ArchiveSettings {
    /// `owner/name`
    pub repo: String,
    pub branch: String,
    pub api_base_url: String,
    pub app_id: String,
    pub installation_id: String,
    /// PEM-encoded RSA private key (already base64-decoded)
    pub private_key_pem: String,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL (CORS origin and OAuth redirect base)
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    pub store_backend: StoreBackend,
    /// Twitter API base URL (overridden in tests)
    pub twitter_api_base_url: String,
    /// Twitter OAuth 2.0 client ID
    pub twitter_client_id: String,
    /// Timeout for every outbound HTTP call
    pub http_timeout: Duration,
    /// Users synced in parallel during a pass
    pub sync_concurrency: usize,
    /// Tokens expiring within this margin are refreshed early
    pub token_refresh_margin: chrono::Duration,
    /// How long a deleted collection lingers before it is purged
    pub collection_retention: chrono::Duration,

    // --- Secrets ---
    /// Twitter OAuth 2.0 client secret
    pub twitter_client_secret: String,
    /// Shared token required by `POST /tasks/sync`
    pub sync_trigger_token: String,
    /// Archive mirror; `None` disables it
    pub archive: Option<ArchiveSettings>,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            store_backend: StoreBackend::Memory,
            twitter_api_base_url: "http://127.0.0.1:9".to_string(),
            twitter_client_id: "test_client_id".to_string(),
            http_timeout: Duration::from_secs(5),
            sync_concurrency: 1,
            token_refresh_margin: chrono::Duration::seconds(60),
            collection_retention: chrono::Duration::days(30),
            twitter_client_secret: "test_secret".to_string(),
            sync_trigger_token: "test_sync_token".to_string(),
            archive: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// For local development, secrets can be set via environment variables.
    /// In production, use `load_with_secrets()` to fetch them from the
    /// secrets endpoint.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Self::build(AppSecrets::default())
    }

    /// Load configuration, overlaying the secrets blob when `SECRETS_URL` is
    /// set. Values in the blob win over environment variables.
    pub async fn load_with_secrets() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let Ok(url) = env::var("SECRETS_URL") else {
            return Self::build(AppSecrets::default());
        };

        tracing::info!("Fetching secrets from secrets endpoint");

        let provider = SecretsProvider::new(
            url,
            env::var("SECRETS_TOKEN").ok(),
            Duration::from_secs(parse_env("HTTP_TIMEOUT_SECS", 10)?),
        )?;
        let secrets = provider.fetch().await?;

        tracing::info!("Secrets loaded and cached");

        Self::build(secrets)
    }

    fn build(secrets: AppSecrets) -> Result<Self, ConfigError> {
        let store_backend = match env::var("STORE_BACKEND").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            Ok("firestore") | Err(_) => StoreBackend::Firestore,
            Ok(_) => return Err(ConfigError::Invalid("STORE_BACKEND")),
        };

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: parse_env("PORT", 8080)?,
            store_backend,
            twitter_api_base_url: env::var("TWITTER_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.twitter.com".to_string()),
            twitter_client_id: secret_or_env(secrets.twitter_client_id, "TWITTER_CLIENT_ID")?,
            http_timeout: Duration::from_secs(parse_env("HTTP_TIMEOUT_SECS", 10)?),
            sync_concurrency: parse_env("SYNC_CONCURRENCY", 1)?,
            token_refresh_margin: chrono::Duration::seconds(parse_env(
                "TOKEN_REFRESH_MARGIN_SECS",
                60,
            )?),
            collection_retention: chrono::Duration::days(parse_env(
                "COLLECTION_RETENTION_DAYS",
                30,
            )?),
            twitter_client_secret: secret_or_env(
                secrets.twitter_client_secret,
                "TWITTER_CLIENT_SECRET",
            )?,
            sync_trigger_token: secret_or_env(secrets.sync_trigger_token, "SYNC_TRIGGER_TOKEN")?,
            archive: archive_settings(
                secrets.github_app_id,
                secrets.github_app_pem,
                secrets.github_installation_id,
            )?,
        })
    }
}

/// The archive mirror is enabled only when `ARCHIVE_REPO` and all three
/// GitHub App credentials are present.
fn archive_settings(
    app_id: Option<String>,
    pem_base64: Option<String>,
    installation_id: Option<String>,
) -> Result<Option<ArchiveSettings>, ConfigError> {
    let Ok(repo) = env::var("ARCHIVE_REPO") else {
        return Ok(None);
    };

    let app_id = app_id.or_else(|| env::var("GITHUB_APP_ID").ok());
    let pem_base64 = pem_base64.or_else(|| env::var("GITHUB_APP_PEM").ok());
    let installation_id = installation_id.or_else(|| env::var("GITHUB_INSTALLATION_ID").ok());

    let (Some(app_id), Some(pem_base64), Some(installation_id)) =
        (app_id, pem_base64, installation_id)
    else {
        tracing::warn!("ARCHIVE_REPO set without GitHub App credentials; archive disabled");
        return Ok(None);
    };

    let pem = STANDARD
        .decode(pem_base64.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or(ConfigError::Invalid("GITHUB_APP_PEM"))?;

    Ok(Some(ArchiveSettings {
        repo,
        branch: env::var("ARCHIVE_BRANCH").unwrap_or_else(|_| "main".to_string()),
        api_base_url: env::var("GITHUB_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.github.com".to_string()),
        app_id: app_id.trim().to_string(),
        installation_id: installation_id.trim().to_string(),
        private_key_pem: pem,
    }))
}

fn secret_or_env(secret: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    secret
        .or_else(|| env::var(name).ok())
        .map(|v| v.trim().to_string())
        .ok_or(ConfigError::Missing(name))
}

fn parse_env<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(v) => v.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Secret Manager error: {0}")]
    SecretManager(String),
}
