// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Scheduler authentication middleware for `/tasks/*` routes.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Header carrying the shared trigger token.
pub const SYNC_TOKEN_HEADER: &str = "x-sync-token";

/// Require the shared trigger token, either in `x-sync-token` or as a bearer
/// token.
pub async fn require_tasks_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(presented) = presented_token(request.headers()) else {
        tracing::warn!("Blocked tasks request without trigger token");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let expected = state.config.sync_trigger_token.as_bytes();
    let valid: bool = presented.as_bytes().ct_eq(expected).into();

    if !valid {
        tracing::warn!("Blocked tasks request with invalid trigger token");
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(request).await)
}

fn presented_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(token) = headers.get(SYNC_TOKEN_HEADER).and_then(|h| h.to_str().ok()) {
        return Some(token);
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_presented_token_sources() {
        let mut headers = HeaderMap::new();
        assert_eq!(presented_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(presented_token(&headers), Some("abc"));

        headers.insert(SYNC_TOKEN_HEADER, HeaderValue::from_static("xyz"));
        assert_eq!(presented_token(&headers), Some("xyz"));
    }

    #[test]
    fn test_empty_bearer_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(presented_token(&headers), None);
    }
}
