// src/pipeline/status.rs

use serde::Serialize;

use crate::error::Result;
use crate::storage::CrawlStore;

/// One category's record stream on disk.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StreamStatus {
    pub category: String,
    /// `None` when the stream has not been created yet
    pub bytes: Option<u64>,
    pub records: usize,
    pub corrupt_lines: usize,
}

/// Snapshot of the crawl state.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CrawlStatus {
    pub total_records: u64,
    pub total_words: u64,
    pub completed_terms: usize,
    pub visited: usize,
    pub streams: Vec<StreamStatus>,
}

/// Collect counters, the visited-set size and per-category stream stats.
pub async fn collect_status(store: &impl CrawlStore, categories: &[String]) -> Result<CrawlStatus> {
    let progress = store.load_progress().await?;
    let visited = store.load_visited().await?;

    let mut streams = Vec::with_capacity(categories.len());
    for category in categories {
        let bytes = store.stream_size(category).await?;
        let scan = store.read_records(category).await?;
        streams.push(StreamStatus {
            category: category.clone(),
            bytes,
            records: scan.records.len(),
            corrupt_lines: scan.skipped_lines,
        });
    }

    Ok(CrawlStatus {
        total_records: progress.total_records,
        total_words: progress.total_words,
        completed_terms: progress.completed_count(),
        visited: visited.len(),
        streams,
    })
}
