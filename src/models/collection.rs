// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Collection ("album") model: a user-owned accumulator of matched items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A predicate that decides whether an item belongs in a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Rule {
    /// Case-sensitive substring match on the item text.
    Keyword { keyword: String },
    /// Declared for forward compatibility; evaluating it is an error.
    Pattern { pattern: String },
    /// Any other stored kind. Kept readable so one odd record cannot break
    /// scans; evaluating it is an error.
    #[serde(other)]
    Unsupported,
}

impl Rule {
    pub fn keyword(keyword: impl Into<String>) -> Self {
        Rule::Keyword {
            keyword: keyword.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Rule::Keyword { .. } => "keyword",
            Rule::Pattern { .. } => "pattern",
            Rule::Unsupported => "unsupported",
        }
    }
}

/// Set of matched item ids. Insertion order is irrelevant and duplicates are
/// impossible; stored as a plain array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemIdSet(BTreeSet<String>);

impl ItemIdSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.0.insert(id.into())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    /// Set-union `other` into `self`. Returns the number of ids that were new.
    pub fn union_with(&mut self, other: &ItemIdSet) -> usize {
        let before = self.0.len();
        self.0.extend(other.0.iter().cloned());
        self.0.len() - before
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl FromIterator<String> for ItemIdSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a str> for ItemIdSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(str::to_string).collect())
    }
}

/// Collection stored in Firestore, keyed by `(user_id, id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    /// Owning user (partition key)
    pub user_id: String,
    /// Creation time in milliseconds, unique per user (sort key)
    pub id: u64,
    /// Free-text label
    #[serde(default)]
    pub title: String,
    /// Missing or empty rules match nothing.
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub matched_item_ids: ItemIdSet,
    /// Soft-delete marker; the record may be purged after this instant.
    #[serde(default)]
    pub deletion_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Collection {
    pub fn new(user_id: impl Into<String>, id: u64, title: impl Into<String>, rules: Vec<Rule>) -> Self {
        Self {
            user_id: user_id.into(),
            id,
            title: title.into(),
            rules,
            matched_item_ids: ItemIdSet::new(),
            deletion_time: None,
            created_at: Utc::now(),
        }
    }

    /// Document ID combining the partition and sort keys.
    pub fn document_id(&self) -> String {
        Self::document_id_for(&self.user_id, self.id)
    }

    pub fn document_id_for(user_id: &str, collection_id: u64) -> String {
        format!("{}_{}", urlencoding::encode(user_id), collection_id)
    }

    /// Marked for deletion (whether or not the purge time has passed).
    pub fn is_deleted(&self) -> bool {
        self.deletion_time.is_some()
    }

    pub fn is_purgeable(&self, now: DateTime<Utc>) -> bool {
        self.deletion_time.is_some_and(|t| t <= now)
    }
}
