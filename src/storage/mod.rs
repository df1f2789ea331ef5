//! Storage abstractions for crawl output and crawl state.
//!
//! Three concerns share one backend:
//!
//! - Record streams: `{records_dir}/{category}_all.jsonl`, append-only
//! - Visited-set: one JSON array, replaced whole on every merge
//! - Progress: counters and finished search terms
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml
//! ├── crawl_progress.json
//! ├── seen_posts.json
//! └── jsonl_crawl_full/
//!     ├── recruiting_all.jsonl
//!     └── humanresources_all.jsonl
//! ```

pub mod local;

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Progress, Record, VisitedSet};

// Re-export for convenience
pub use local::LocalStorage;

/// Records read back from a stream.
#[derive(Debug, Default)]
pub struct RecordScan {
    pub records: Vec<Record>,
    /// Lines that could not be parsed (e.g. a torn final write)
    pub skipped_lines: usize,
}

/// Append-only per-category record streams.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Append records to a category's stream, one line each.
    async fn append(&self, category: &str, records: &[Record]) -> Result<()>;

    /// Read every parsable record of a category's stream.
    async fn read_records(&self, category: &str) -> Result<RecordScan>;

    /// Size of a category's stream in bytes, `None` if it does not exist.
    async fn stream_size(&self, category: &str) -> Result<Option<u64>>;

    /// Delete a category's stream. Returns whether it existed.
    async fn remove_stream(&self, category: &str) -> Result<bool>;
}

/// Durable set of visited thread identifiers.
#[async_trait]
pub trait VisitedStore: Send + Sync {
    async fn load_visited(&self) -> Result<VisitedSet>;

    /// Union `ids` into the stored set and return the merged set.
    async fn merge_visited(&self, ids: &[String]) -> Result<VisitedSet>;

    /// Drop `ids` from the stored set. Returns how many were present.
    async fn remove_visited(&self, ids: &BTreeSet<String>) -> Result<usize>;
}

/// Durable run progress.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn load_progress(&self) -> Result<Progress>;

    async fn save_progress(&self, progress: &Progress) -> Result<()>;
}

/// Everything a crawl run persists.
pub trait CrawlStore: RecordSink + VisitedStore + ProgressStore {}

impl<T: RecordSink + VisitedStore + ProgressStore> CrawlStore for T {}
