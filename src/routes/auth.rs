// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth sign-in route.
//!
//! The browser runs the Twitter OAuth 2.0 PKCE flow and posts the resulting
//! code and verifier here. We exchange them, store the user, and hand the
//! access token back as the client's authorization token.

use crate::error::{AppError, Result};
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Auth routes (public).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth", post(sign_in))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    code: String,
    verifier: String,
    #[serde(alias = "redirect_url")]
    redirect_url: String,
}

/// Sign-in response: profile plus the token to send as `{id}:{access_token}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SignInResponse {
    pub id: String,
    pub name: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
    pub access_token: String,
}

/// Exchange a PKCE authorization code and store the user.
async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<SignInResponse>> {
    if request.code.is_empty() || request.verifier.is_empty() {
        return Err(AppError::BadRequest(
            "code and verifier are required".to_string(),
        ));
    }

    tracing::info!("Exchanging authorization code for tokens");

    let result = state
        .tokens
        .handle_oauth_callback(&request.code, &request.verifier, &request.redirect_url)
        .await?;

    tracing::info!(user_id = %result.user_id, "Sign-in successful");

    Ok(Json(SignInResponse {
        id: result.user_id,
        name: result.name,
        username: result.username,
        profile_image_url: result.profile_image_url,
        access_token: result.access_token,
    }))
}
