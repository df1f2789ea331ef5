// src/pipeline/crawl.rs

//! Crawl orchestration.
//!
//! Walks the category × term matrix: search, filter out visited and quiet
//! threads, fetch each remaining thread, flatten it, append the records and
//! mark the thread visited. A thread is marked visited whether or not its
//! detail fetch worked, so a permanently broken thread is attempted once.

use std::collections::HashSet;

use crate::error::Result;
use crate::models::{CrawlPlan, Progress, ThreadSummary, VisitedSet};
use crate::pipeline::review::{Approver, Candidate, resolve_decisions};
use crate::services::{ThreadSource, flatten};
use crate::storage::CrawlStore;

/// Mutable crawl state, loaded once per run and saved at checkpoints.
#[derive(Debug, Clone, Default)]
pub struct CrawlState {
    pub visited: VisitedSet,
    pub progress: Progress,
}

impl CrawlState {
    /// Load the visited-set and progress from storage.
    pub async fn load(store: &impl CrawlStore) -> Result<Self> {
        Ok(Self {
            visited: store.load_visited().await?,
            progress: store.load_progress().await?,
        })
    }
}

/// Totals of a single run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Threads whose detail fetch returned a response
    pub threads_fetched: usize,
    /// Threads skipped after the fetcher gave up
    pub threads_failed: usize,
    /// Candidates dropped as already visited or too quiet
    pub threads_filtered: usize,
    /// Candidates a reviewer declined
    pub threads_declined: usize,
    pub records_written: u64,
    pub words_written: u64,
    /// Review batches voided by a malformed reply
    pub batches_discarded: usize,
    /// Search requests that failed
    pub searches_failed: usize,
    /// Whether the run ended because both targets were reached
    pub stopped_early: bool,
}

/// Drives searches and thread fetches against a source and a store.
pub struct Crawler<'a, S: ThreadSource, St: CrawlStore> {
    source: &'a S,
    store: &'a St,
    plan: &'a CrawlPlan,
}

impl<'a, S: ThreadSource, St: CrawlStore> Crawler<'a, S, St> {
    pub fn new(source: &'a S, store: &'a St, plan: &'a CrawlPlan) -> Self {
        Self {
            source,
            store,
            plan,
        }
    }

    fn targets_met(&self, state: &CrawlState) -> bool {
        self.plan
            .targets_met(state.progress.total_records, state.progress.total_words)
    }

    /// Run the automatic crawl over every category and term.
    pub async fn run(&self, state: &mut CrawlState) -> Result<CrawlSummary> {
        let mut summary = CrawlSummary::default();
        log::info!(
            "Resuming crawl. Current totals: {} records, {} words",
            state.progress.total_records,
            state.progress.total_words
        );

        'categories: for category in &self.plan.categories {
            for term in &self.plan.terms {
                if self.targets_met(state) {
                    break 'categories;
                }
                if state.progress.is_completed(category, term) {
                    log::info!("Skipping already completed: r/{} {:?}", category, term);
                    continue;
                }

                log::info!("Searching r/{} for {:?}...", category, term);
                let Some(threads) = self.search(category, term, &mut summary).await else {
                    continue;
                };

                let mut finished = true;
                for thread in threads {
                    if self.targets_met(state) {
                        finished = false;
                        break;
                    }
                    if !self.is_candidate(&thread, state) {
                        summary.threads_filtered += 1;
                        continue;
                    }

                    self.process_thread(category, &thread, state, &mut summary)
                        .await?;
                    state.visited = self.store.merge_visited(&[thread.id.clone()]).await?;
                }

                if finished {
                    state.progress.mark_completed(category, term);
                    self.store.save_progress(&state.progress).await?;
                }
            }
        }

        self.finish(state, &mut summary).await?;
        Ok(summary)
    }

    /// Run the crawl with a reviewer approving each batch of candidates.
    ///
    /// A batch whose decisions do not line up with its members is discarded
    /// whole: nothing is fetched and nothing is marked visited, so it comes
    /// back on the next run. Completed-term markers are neither read nor
    /// written here for the same reason.
    pub async fn run_reviewed(
        &self,
        state: &mut CrawlState,
        approver: &mut dyn Approver,
        hint: &(dyn Fn(&str) -> String + Sync),
    ) -> Result<CrawlSummary> {
        let mut summary = CrawlSummary::default();
        let batch_size = self.plan.batch_size.max(1);

        'categories: for category in &self.plan.categories {
            for term in &self.plan.terms {
                if self.targets_met(state) {
                    break 'categories;
                }

                log::info!("Searching r/{} for {:?}...", category, term);
                let Some(threads) = self.search(category, term, &mut summary).await else {
                    continue;
                };

                let candidates: Vec<ThreadSummary> = threads
                    .into_iter()
                    .filter(|thread| {
                        let keep = self.is_candidate(thread, state);
                        if !keep {
                            summary.threads_filtered += 1;
                        }
                        keep
                    })
                    .collect();

                for (batch_no, batch) in candidates.chunks(batch_size).enumerate() {
                    if self.targets_met(state) {
                        break 'categories;
                    }
                    self.review_batch(
                        category,
                        batch_no + 1,
                        batch,
                        state,
                        approver,
                        hint,
                        &mut summary,
                    )
                    .await?;
                }
            }
        }

        self.finish(state, &mut summary).await?;
        Ok(summary)
    }

    #[allow(clippy::too_many_arguments)]
    async fn review_batch(
        &self,
        category: &str,
        batch_no: usize,
        batch: &[ThreadSummary],
        state: &mut CrawlState,
        approver: &mut dyn Approver,
        hint: &(dyn Fn(&str) -> String + Sync),
        summary: &mut CrawlSummary,
    ) -> Result<()> {
        let presented: Vec<Candidate<'_>> = batch
            .iter()
            .map(|thread| Candidate {
                thread,
                hint: hint(&thread.title),
            })
            .collect();

        let decisions = approver.review(batch_no, &presented).await?;
        let Some(approved) = resolve_decisions(batch, &decisions) else {
            log::warn!(
                "Batch {}: got {} decisions for {} threads. Skipping this batch entirely; nothing marked as visited.",
                batch_no,
                decisions.len(),
                batch.len()
            );
            summary.batches_discarded += 1;
            return Ok(());
        };

        for (thread, keep) in batch.iter().zip(approved) {
            if keep {
                self.process_thread(category, thread, state, summary).await?;
            } else {
                summary.threads_declined += 1;
            }
        }

        let ids: Vec<String> = batch.iter().map(|t| t.id.clone()).collect();
        state.visited = self.store.merge_visited(&ids).await?;
        self.store.save_progress(&state.progress).await?;
        Ok(())
    }

    /// Search once; a failure is logged and reported as `None`.
    async fn search(
        &self,
        category: &str,
        term: &str,
        summary: &mut CrawlSummary,
    ) -> Option<Vec<ThreadSummary>> {
        match self
            .source
            .search_threads(category, term, self.plan.search_limit)
            .await
        {
            Ok(threads) => Some(dedupe(threads)),
            Err(e) => {
                summary.searches_failed += 1;
                log::warn!("Failed to search r/{} for {:?}: {}", category, term, e);
                None
            }
        }
    }

    fn is_candidate(&self, thread: &ThreadSummary, state: &CrawlState) -> bool {
        !state.visited.contains(&thread.id) && thread.activity >= self.plan.min_activity
    }

    /// Fetch, flatten and append one thread, updating the counters.
    async fn process_thread(
        &self,
        category: &str,
        thread: &ThreadSummary,
        state: &mut CrawlState,
        summary: &mut CrawlSummary,
    ) -> Result<()> {
        log::info!(
            "  Fetching replies for {} ({} replies)",
            thread.url,
            thread.activity
        );
        let Some(detail) = self.source.fetch_thread_detail(thread).await else {
            summary.threads_failed += 1;
            return Ok(());
        };
        summary.threads_fetched += 1;

        let flat = flatten(detail, &thread.id, &thread.url);
        self.store.append(category, &flat.records).await?;

        summary.records_written += flat.record_count;
        summary.words_written += flat.word_count;
        let crossed = state.progress.add(
            flat.record_count,
            flat.word_count,
            self.plan.progress_flush_every,
        );
        log::info!(
            "  +{} records, +{} words | Total: {} records, {} words",
            flat.record_count,
            flat.word_count,
            state.progress.total_records,
            state.progress.total_words
        );

        if crossed {
            self.store.save_progress(&state.progress).await?;
        }
        Ok(())
    }

    async fn finish(&self, state: &CrawlState, summary: &mut CrawlSummary) -> Result<()> {
        summary.stopped_early = self.targets_met(state);
        if summary.stopped_early {
            log::info!("Reached target corpus size!");
        }
        self.store.save_progress(&state.progress).await?;
        log::info!(
            "Final stats: {} records, {} words",
            state.progress.total_records,
            state.progress.total_words
        );
        Ok(())
    }
}

/// Drop repeated thread ids within one search result, keeping the first.
fn dedupe(threads: Vec<ThreadSummary>) -> Vec<ThreadSummary> {
    let mut seen = HashSet::new();
    threads
        .into_iter()
        .filter(|thread| seen.insert(thread.id.clone()))
        .collect()
}
