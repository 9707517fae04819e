// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Task routes called by the scheduler, not directly by users.
//!
//! Protected by the shared trigger token (see `middleware::tasks_auth`).

use crate::error::Result;
use crate::middleware::tasks_auth::require_tasks_auth;
use crate::services::SyncReport;
use crate::AppState;
use axum::{extract::State, middleware, routing::post, Json, Router};
use std::sync::Arc;

/// Task handler routes.
pub fn routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks/sync", post(run_sync))
        .route_layer(middleware::from_fn_with_state(state, require_tasks_auth))
}

/// Run one sync pass over all users.
///
/// Returns 200 with the report even when some users failed; only a failure
/// to scan the store fails the request.
async fn run_sync(State(state): State<Arc<AppState>>) -> Result<Json<SyncReport>> {
    tracing::info!("Sync pass triggered");
    let report = state.sync.run_pass().await?;
    Ok(Json(report))
}
