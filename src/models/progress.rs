//! Run progress and the visited-set.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Identifiers of threads whose detail fetch has been attempted.
pub type VisitedSet = BTreeSet<String>;

/// A search term finished within one category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct CompletedTerm {
    pub category: String,
    pub term: String,
}

impl CompletedTerm {
    pub fn new(category: &str, term: &str) -> Self {
        Self {
            category: category.to_string(),
            term: term.to_string(),
        }
    }
}

/// Counters persisted between runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Progress {
    #[serde(default, alias = "total_comments")]
    pub total_records: u64,

    #[serde(default)]
    pub total_words: u64,

    #[serde(default)]
    pub completed_terms: BTreeSet<CompletedTerm>,

    /// Older `"{category}_{term}"` markers, honoured but never added to
    #[serde(
        default,
        rename = "completed_keywords",
        skip_serializing_if = "BTreeSet::is_empty"
    )]
    pub legacy_keys: BTreeSet<String>,
}

impl Progress {
    /// Add a thread's output to the totals.
    ///
    /// Returns true when the record total crossed a multiple of `flush_every`.
    pub fn add(&mut self, records: u64, words: u64, flush_every: u64) -> bool {
        let before = self.total_records;
        self.total_records += records;
        self.total_words += words;
        flush_every > 0 && before / flush_every != self.total_records / flush_every
    }

    pub fn is_completed(&self, category: &str, term: &str) -> bool {
        self.completed_terms
            .contains(&CompletedTerm::new(category, term))
            || self.legacy_keys.contains(&format!("{category}_{term}"))
    }

    /// Number of finished terms, old-style markers included.
    pub fn completed_count(&self) -> usize {
        self.completed_terms.len() + self.legacy_keys.len()
    }

    pub fn mark_completed(&mut self, category: &str, term: &str) {
        self.completed_terms.insert(CompletedTerm::new(category, term));
    }

    /// Forget every completed term of a category. Returns how many were removed.
    pub fn clear_category(&mut self, category: &str) -> usize {
        let before = self.completed_count();
        self.completed_terms.retain(|t| t.category != category);
        let prefix = format!("{category}_");
        self.legacy_keys.retain(|key| !key.starts_with(&prefix));
        before - self.completed_count()
    }
}
