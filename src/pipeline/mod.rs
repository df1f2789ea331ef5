//! Pipeline entry points for crawl operations.
//!
//! - `Crawler::run`: automatic crawl over the category × term matrix
//! - `Crawler::run_reviewed`: same walk, with batch approval
//! - `retract_category`: undo one category's output
//! - `collect_status`: summarize persisted state

pub mod crawl;
pub mod retract;
pub mod review;
pub mod status;

pub use crawl::{CrawlState, CrawlSummary, Crawler};
pub use retract::{RetractSummary, retract_category};
pub use review::{Approver, Candidate, Decision, LineApprover, resolve_decisions};
pub use status::{CrawlStatus, StreamStatus, collect_status};
