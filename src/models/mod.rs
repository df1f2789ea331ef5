// src/models/mod.rs

//! Domain models for the crawler application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod progress;
mod record;
mod thread;

// Re-export all public types
pub use config::{
    Config, CrawlPlan, CrawlerConfig, PathsConfig, StepHint, UNKNOWN_STEP, suggest_step,
};
pub use progress::{CompletedTerm, Progress, VisitedSet};
pub use record::{Record, RecordMetadata, SOURCE, thread_id_from_url};
pub(crate) use thread::RawPost;
pub use thread::{
    Listing, ListingData, REPLY_KIND, ReplyData, Thing, ThreadDetail, ThreadMeta, ThreadSummary,
};
