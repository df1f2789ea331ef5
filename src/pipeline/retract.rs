// src/pipeline/retract.rs

//! Undo a category's crawl output so it can be crawled again.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::storage::CrawlStore;

/// What a retraction removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetractSummary {
    pub records: usize,
    /// Thread ids found in the stream
    pub threads: usize,
    /// Of those, ids that were present in the visited-set
    pub unvisited: usize,
    pub completed_terms_cleared: usize,
    pub stream_removed: bool,
}

/// Remove a category's records and forget the threads they came from.
///
/// Threads that were visited but produced no records are not in the stream
/// and stay visited.
pub async fn retract_category(store: &impl CrawlStore, category: &str) -> Result<RetractSummary> {
    let scan = store.read_records(category).await?;
    if scan.skipped_lines > 0 {
        log::warn!(
            "Skipped {} unreadable lines in the {} stream",
            scan.skipped_lines,
            category
        );
    }

    let threads: BTreeSet<String> = scan
        .records
        .iter()
        .filter_map(|record| record.metadata.resolved_thread_id())
        .collect();

    let unvisited = store.remove_visited(&threads).await?;

    let mut progress = store.load_progress().await?;
    let completed_terms_cleared = progress.clear_category(category);
    store.save_progress(&progress).await?;

    let stream_removed = store.remove_stream(category).await?;

    log::info!(
        "Retracted r/{}: {} records from {} threads, {} ids unvisited",
        category,
        scan.records.len(),
        threads.len(),
        unvisited
    );

    Ok(RetractSummary {
        records: scan.records.len(),
        threads: threads.len(),
        unvisited,
        completed_terms_cleared,
        stream_removed,
    })
}
