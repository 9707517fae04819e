// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod collection;
pub mod item;
pub mod user;

pub use collection::{Collection, ItemIdSet, Rule};
pub use item::{Cursor, FetchedPage, Item, ItemSnapshot, SnapshotIncludes};
pub use user::{CredentialState, UserPatch, UserRecord};
