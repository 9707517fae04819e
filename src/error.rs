// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// The provider rejected the refresh token; the user must sign in again.
    #[error("Credential refresh failed: {0}")]
    CredentialRefresh(String),

    /// Non-success status or timeout from the content API.
    #[error("Content fetch failed: {0}")]
    Fetch(String),

    /// A rule kind that is declared but has no matcher.
    #[error("Unsupported rule: {0}")]
    UnsupportedRule(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Archive mirror error: {0}")]
    Archive(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True when the error means the user has to go through sign-in again.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(self, AppError::CredentialRefresh(_) | AppError::Unauthorized)
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::CredentialRefresh(msg) => {
                tracing::warn!(error = %msg, "Credential refresh rejected");
                (StatusCode::UNAUTHORIZED, "reauthentication_required", None)
            }
            AppError::Fetch(msg) => (StatusCode::BAD_GATEWAY, "twitter_error", Some(msg.clone())),
            AppError::UnsupportedRule(msg) => {
                tracing::error!(error = %msg, "Unsupported rule");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "unsupported_rule",
                    Some(msg.clone()),
                )
            }
            AppError::Store(msg) => {
                tracing::error!(error = %msg, "Store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "store_error", None)
            }
            AppError::Archive(msg) => {
                tracing::error!(error = %msg, "Archive mirror error");
                (StatusCode::BAD_GATEWAY, "archive_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
