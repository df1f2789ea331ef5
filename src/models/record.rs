//! Flattened reply record, one per line of a category stream.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Source tag written into every record.
pub const SOURCE: &str = "reddit";

static THREAD_ID_IN_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/comments/([A-Za-z0-9]+)").expect("thread id pattern is valid")
});

/// A single reply, flattened out of its thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    /// Reply identifier
    pub id: String,

    /// Reply body
    pub text: String,

    /// Creation time, ISO-8601 UTC
    pub timestamp: String,

    /// Where the reply came from
    #[serde(default = "default_source")]
    pub source: String,

    /// Thread provenance
    pub metadata: RecordMetadata,
}

/// Provenance of a record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordMetadata {
    /// Category tag of the enclosing thread
    #[serde(alias = "subreddit")]
    pub category: String,

    /// Identifier of the enclosing thread (absent in older streams)
    #[serde(default)]
    pub thread_id: Option<String>,

    /// Title of the enclosing thread
    #[serde(alias = "post_title")]
    pub thread_title: String,

    /// URL of the enclosing thread
    pub url: String,
}

impl RecordMetadata {
    /// Thread identifier, falling back to the one embedded in the URL.
    pub fn resolved_thread_id(&self) -> Option<String> {
        self.thread_id.clone().or_else(|| thread_id_from_url(&self.url))
    }
}

fn default_source() -> String {
    SOURCE.to_string()
}

/// Extract the thread identifier from a permalink such as
/// `/r/recruiting/comments/abc123/some_title/`.
pub fn thread_id_from_url(url: &str) -> Option<String> {
    THREAD_ID_IN_URL
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
