//! Service layer for the crawler application.
//!
//! This module contains the business logic for:
//! - Thread search and detail fetching (`RedditClient`)
//! - Reply tree flattening (`flatten`)

mod flatten;
mod reddit;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ThreadDetail, ThreadSummary};

pub use flatten::{Flattened, TOMBSTONES, flatten};
pub use reddit::RedditClient;

/// A source of discussion threads.
#[async_trait]
pub trait ThreadSource: Send + Sync {
    /// Search a category for a term, returning at most `limit` threads,
    /// most active first.
    async fn search_threads(
        &self,
        category: &str,
        term: &str,
        limit: usize,
    ) -> Result<Vec<ThreadSummary>>;

    /// Fetch a thread's reply tree. `None` means "skip this thread".
    async fn fetch_thread_detail(&self, thread: &ThreadSummary) -> Option<ThreadDetail>;
}
