//! Fuzzy name scoring for catalog search.
//!
//! Scores are additive bonuses for increasingly loose kinds of match, minus
//! a small penalty for long names. An exact (case-insensitive) match always
//! scores [`EXACT_MATCH`]; every other score is capped below it.

use std::collections::HashSet;

use applist_core::CatalogEntry;

pub const EXACT_MATCH: u32 = 10_000;
const PREFIX_BONUS: i64 = 5_000;
const FIRST_WORD_BONUS: i64 = 3_000;
const ALL_WORDS_BONUS: i64 = 2_000;
const SUBSTRING_BONUS: i64 = 1_000;
const WORD_PREFIX_BONUS: i64 = 500;
const SUBSEQUENCE_BONUS: i64 = 100;
/// One point of penalty per this many extra characters in the name.
const LENGTH_PENALTY_DIVISOR: i64 = 10;

const NAME_SEPARATORS: &[char] = &[' ', '-', ':', '_', '™', '®'];

/// A lowercased, pre-tokenized search query.
#[derive(Debug, Clone)]
pub struct Query {
    lower: String,
    tokens: Vec<String>,
    len: usize,
}

impl Query {
    pub fn new(raw: &str) -> Self {
        let lower = raw.trim().to_lowercase();
        let tokens = lower.split_whitespace().map(str::to_string).collect();
        let len = lower.chars().count();
        Self { lower, tokens, len }
    }

    pub fn as_str(&self) -> &str {
        &self.lower
    }

    pub fn char_len(&self) -> usize {
        self.len
    }
}

/// A catalog entry with its score for some query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredEntry {
    pub entry: CatalogEntry,
    pub score: u32,
}

fn name_tokens(name: &str) -> impl Iterator<Item = &str> {
    name.split(NAME_SEPARATORS).filter(|t| !t.is_empty())
}

fn is_subsequence(haystack: &str, needle: &str) -> bool {
    let mut wanted = needle.chars().peekable();
    for c in haystack.chars() {
        if wanted.peek() == Some(&c) {
            wanted.next();
        }
    }
    wanted.peek().is_none()
}

/// Score `name` against `query`. Zero means "no match".
pub fn score_name(query: &Query, name: &str) -> u32 {
    if name.is_empty() || query.lower.is_empty() {
        return 0;
    }
    let name_lower = name.to_lowercase();
    let q = query.lower.as_str();
    if name_lower == q {
        return EXACT_MATCH;
    }

    let tokens: Vec<&str> = name_tokens(&name_lower).collect();
    let mut score: i64 = 0;

    if name_lower.starts_with(q) {
        score += PREFIX_BONUS;
    }
    if tokens.first().is_some_and(|first| q.starts_with(first)) {
        score += FIRST_WORD_BONUS;
    }
    if query.tokens.len() > 1
        && query
            .tokens
            .iter()
            .all(|qt| tokens.iter().any(|t| t.starts_with(qt.as_str())))
    {
        score += ALL_WORDS_BONUS;
    }
    if name_lower.contains(q) {
        score += SUBSTRING_BONUS;
    }
    if is_subsequence(&name_lower, q) {
        score += SUBSEQUENCE_BONUS;
    }
    if tokens.iter().any(|t| t.starts_with(q)) {
        score += WORD_PREFIX_BONUS;
    }

    let extra_chars = name_lower.chars().count() as i64 - query.len as i64;
    score -= extra_chars.max(0) / LENGTH_PENALTY_DIVISOR;

    score.clamp(0, EXACT_MATCH as i64 - 1) as u32
}

/// Order by score descending, then shorter name, then name and id so the
/// output does not depend on input order.
fn compare(a: &ScoredEntry, b: &ScoredEntry) -> std::cmp::Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| {
            a.entry
                .name
                .chars()
                .count()
                .cmp(&b.entry.name.chars().count())
        })
        .then_with(|| a.entry.name.cmp(&b.entry.name))
        .then_with(|| a.entry.id.cmp(&b.entry.id))
}

/// Merge remote ("smart") hits with the local catalog and rank them.
///
/// Smart hits come first in the dedup pass, so for an id present in both
/// sources the smart entry wins. Smart hits are kept even if they score
/// zero locally (the remote search matched them on something other than
/// the name); local entries must score above zero.
pub fn rank(
    query: &Query,
    smart: &[CatalogEntry],
    local: &[CatalogEntry],
    max_results: usize,
) -> Vec<ScoredEntry> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut scored = Vec::new();

    for entry in smart {
        if seen.insert(entry.id.as_str()) {
            scored.push(ScoredEntry {
                entry: entry.clone(),
                score: score_name(query, &entry.name),
            });
        }
    }
    for entry in local {
        if seen.contains(entry.id.as_str()) {
            continue;
        }
        let score = score_name(query, &entry.name);
        if score > 0 {
            seen.insert(entry.id.as_str());
            scored.push(ScoredEntry {
                entry: entry.clone(),
                score,
            });
        }
    }

    scored.sort_by(compare);
    scored.truncate(max_results);
    scored
}

#[cfg(test)]
#[path = "tests/score_tests.rs"]
mod tests;
