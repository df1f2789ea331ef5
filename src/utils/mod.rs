//! Utility functions and helpers.

pub mod http;

use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Count words the naive way: runs of non-whitespace.
pub fn word_count(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}
