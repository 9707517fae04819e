//! Rule matching: decides which collections each new item belongs to.

use crate::error::AppError;
use crate::models::{Collection, Item, Rule};
use std::collections::BTreeMap;

/// Matched item ids per collection id. Lists keep item input order and may
/// hold the same id twice if two rules of one collection both match it; the
/// set-union merge collapses those.
pub type MatchSet = BTreeMap<u64, Vec<String>>;

/// Evaluate every rule of every collection against every item.
///
/// Collections without a match have no entry. A non-keyword rule fails the
/// whole call before anything is returned.
pub fn match_items(items: &[Item], collections: &[Collection]) -> Result<MatchSet, AppError> {
    let mut matches = MatchSet::new();

    for collection in collections {
        let mut matched = Vec::new();

        for item in items {
            for rule in &collection.rules {
                if rule_matches(rule, item)? {
                    matched.push(item.id.clone());
                }
            }
        }

        if !matched.is_empty() {
            matches.insert(collection.id, matched);
        }
    }

    Ok(matches)
}

fn rule_matches(rule: &Rule, item: &Item) -> Result<bool, AppError> {
    match rule {
        Rule::Keyword { keyword } => Ok(item.text.contains(keyword.as_str())),
        Rule::Pattern { pattern } => Err(AppError::UnsupportedRule(format!(
            "pattern rule {:?} is not supported",
            pattern
        ))),
        Rule::Unsupported => Err(AppError::UnsupportedRule(
            "unknown rule kind is not supported".to_string(),
        )),
    }
}
