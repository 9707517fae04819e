// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod archive;
pub mod matcher;
pub mod secrets;
pub mod sync;
pub mod tokens;
pub mod twitter;

pub use archive::ArchiveMirror;
pub use matcher::{match_items, MatchSet};
pub use secrets::{AppSecrets, SecretsProvider};
pub use sync::{SyncReport, SyncService, UserOutcome};
pub use tokens::{Reconciliation, RefreshLocks, SignInResult, TokenService};
pub use twitter::{TokenResponse, TwitterClient, TwitterUser};
