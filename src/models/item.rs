// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Items (tweets) pulled from the content API, and the per-user cursor.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// A single post returned by the content API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    #[serde(default)]
    pub author_id: Option<String>,
    pub text: String,
}

/// High-water mark of the newest item a user has been polled through.
///
/// Item ids are decimal snowflakes, so ordering compares by length first and
/// then lexicographically, which matches numeric order without parsing.
/// Equality and hashing ignore leading zeros to agree with the ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this cursor points at a strictly newer item than `other`.
    pub fn is_newer_than(&self, other: &Cursor) -> bool {
        self.cmp(other) == Ordering::Greater
    }

    fn significant_digits(&self) -> &str {
        self.0.trim_start_matches('0')
    }
}

impl Ord for Cursor {
    fn cmp(&self, other: &Self) -> Ordering {
        let a = self.significant_digits();
        let b = other.significant_digits();
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    }
}

impl PartialEq for Cursor {
    fn eq(&self, other: &Self) -> bool {
        self.significant_digits() == other.significant_digits()
    }
}

impl Eq for Cursor {}

impl Hash for Cursor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant_digits().hash(state);
    }
}

impl PartialOrd for Cursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of new items for a user.
#[derive(Debug, Clone, Default)]
pub struct FetchedPage {
    /// Newest first, as returned by the API.
    pub items: Vec<Item>,
    /// Newest id on the page; `None` when the page is empty.
    pub newest_cursor: Option<Cursor>,
}

/// Hydrated view of a collection: the tweets plus expanded authors and media.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub tweets: Vec<serde_json::Value>,
    pub includes: SnapshotIncludes,
}

/// Expansion objects referenced by the tweets in a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotIncludes {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<serde_json::Value>,
}

impl ItemSnapshot {
    /// Append another lookup page, dropping expansion objects already present.
    pub fn extend(&mut self, other: ItemSnapshot) {
        self.tweets.extend(other.tweets);
        extend_unique(&mut self.includes.users, other.includes.users);
        extend_unique(&mut self.includes.media, other.includes.media);
    }
}

fn extend_unique(target: &mut Vec<serde_json::Value>, values: Vec<serde_json::Value>) {
    for value in values {
        if !target.contains(&value) {
            target.push(value);
        }
    }
}
