// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token authentication middleware.
//!
//! Clients send `Authorization: {user_id}:{access_token}` (optionally with a
//! `Bearer ` prefix). The token is checked against the user's authorization
//! token; if a background refresh rotated it, the new token is returned in
//! the `x-refreshed-access-token` response header.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Response header carrying a rotated access token.
pub const REFRESHED_TOKEN_HEADER: &str = "x-refreshed-access-token";

/// Authenticated user extracted from the authorization header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    /// Current provider access token for this user
    pub access_token: String,
}

/// Middleware that requires a valid `{user_id}:{token}` authorization header.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (user_id, presented) = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(parse_authorization)
        .ok_or(AppError::Unauthorized)?;

    let reconciliation = state
        .tokens
        .reconcile_authorization_token(&user_id, &presented)
        .await?;

    if !reconciliation.is_authorized {
        tracing::debug!(user_id = %user_id, "Rejected request with stale or unknown token");
        return Err(AppError::Unauthorized);
    }

    request.extensions_mut().insert(AuthUser {
        user_id,
        access_token: reconciliation.effective_access_token.clone(),
    });

    let mut response = next.run(request).await;

    if reconciliation.rotated {
        if let Ok(value) = HeaderValue::from_str(&reconciliation.effective_access_token) {
            response.headers_mut().insert(REFRESHED_TOKEN_HEADER, value);
        }
    }

    Ok(response)
}

/// Split `[Bearer ]{user_id}:{token}` into its parts.
pub fn parse_authorization(value: &str) -> Option<(String, String)> {
    let value = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    let (user_id, token) = value.split_once(':')?;

    if user_id.is_empty() || token.is_empty() {
        return None;
    }

    Some((user_id.to_string(), token.to_string()))
}
