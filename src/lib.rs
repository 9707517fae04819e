// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! album-sync: keyword albums over a user's own tweets
//!
//! This crate provides the backend API and the incremental sync engine that
//! polls each user's new tweets, matches them against the user's albums
//! (collections) and records the matches.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::SharedStore;
use error::AppError;
use services::{ArchiveMirror, SyncService, TokenService, TwitterClient};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: SharedStore,
    pub twitter: TwitterClient,
    pub tokens: TokenService,
    pub sync: SyncService,
}

impl AppState {
    /// Wire up the services over `db`.
    pub fn new(config: Config, db: SharedStore) -> Result<Self, AppError> {
        let twitter = TwitterClient::new(
            config.twitter_api_base_url.clone(),
            config.twitter_client_id.clone(),
            config.twitter_client_secret.clone(),
            config.http_timeout,
        )?;

        let tokens = TokenService::new(
            twitter.clone(),
            db.clone(),
            Arc::new(dashmap::DashMap::new()),
            config.token_refresh_margin,
        );

        let archive = config
            .archive
            .clone()
            .map(|settings| ArchiveMirror::new(settings, config.http_timeout))
            .transpose()?;

        let sync = SyncService::new(
            db.clone(),
            tokens.clone(),
            twitter.clone(),
            archive,
            config.sync_concurrency,
        );

        Ok(Self {
            config,
            db,
            twitter,
            tokens,
            sync,
        })
    }
}
