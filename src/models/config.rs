//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP, pacing and retry settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// What to crawl and when to stop
    #[serde(default)]
    pub crawl: CrawlPlan,

    /// File locations relative to the storage directory
    #[serde(default)]
    pub paths: PathsConfig,

    /// Title keyword hints shown during review
    #[serde(default = "defaults::hints")]
    pub hints: Vec<StepHint>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration, falling back to defaults only when the file is missing.
    ///
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        match Self::load(&path) {
            Err(AppError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("No config at {:?}. Using defaults.", path.as_ref());
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_attempts == 0 {
            return Err(AppError::validation("crawler.max_attempts must be > 0"));
        }
        url::Url::parse(&self.crawler.base_url)
            .map_err(|e| AppError::validation(format!("crawler.base_url is invalid: {e}")))?;
        if self.crawl.categories.is_empty() {
            return Err(AppError::validation("No categories defined"));
        }
        if self.crawl.terms.is_empty() {
            return Err(AppError::validation("No search terms defined"));
        }
        if let Some(bad) = self
            .crawl
            .categories
            .iter()
            .find(|c| c.trim().is_empty() || c.contains(['/', '\\']))
        {
            return Err(AppError::validation(format!(
                "Invalid category name {bad:?}"
            )));
        }
        if self.crawl.search_limit == 0 {
            return Err(AppError::validation("crawl.search_limit must be > 0"));
        }
        if self.crawl.batch_size == 0 {
            return Err(AppError::validation("crawl.batch_size must be > 0"));
        }
        if self.crawl.progress_flush_every == 0 {
            return Err(AppError::validation(
                "crawl.progress_flush_every must be > 0",
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            crawl: CrawlPlan::default(),
            paths: PathsConfig::default(),
            hints: defaults::hints(),
        }
    }
}

/// HTTP client, pacing and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Scheme and host of the source
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Pause after every search request in milliseconds
    #[serde(default = "defaults::search_delay")]
    pub search_delay_ms: u64,

    /// Pause after every thread detail request in milliseconds
    #[serde(default = "defaults::detail_delay")]
    pub detail_delay_ms: u64,

    /// Attempts per thread detail request, first try included
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Backoff before the second attempt; doubles on every further attempt
    #[serde(default = "defaults::backoff_base")]
    pub backoff_base_ms: u64,

    /// Upper bound of the random jitter added to each backoff (0 disables)
    #[serde(default = "defaults::backoff_jitter")]
    pub backoff_jitter_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            base_url: defaults::base_url(),
            search_delay_ms: defaults::search_delay(),
            detail_delay_ms: defaults::detail_delay(),
            max_attempts: defaults::max_attempts(),
            backoff_base_ms: defaults::backoff_base(),
            backoff_jitter_ms: defaults::backoff_jitter(),
        }
    }
}

/// The category × term matrix and the run's stopping rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlPlan {
    /// Categories to crawl, one output stream each
    #[serde(default = "defaults::categories")]
    pub categories: Vec<String>,

    /// Free-text search terms tried within every category
    #[serde(default = "defaults::terms")]
    pub terms: Vec<String>,

    /// Threads kept per search after local re-ranking
    #[serde(default = "defaults::search_limit")]
    pub search_limit: usize,

    /// Threads with fewer replies than this are never fetched
    #[serde(default = "defaults::min_activity")]
    pub min_activity: u64,

    /// Stop once this many records exist (together with `target_words`)
    #[serde(default = "defaults::target_records")]
    pub target_records: Option<u64>,

    /// Stop once this many words exist (together with `target_records`)
    #[serde(default = "defaults::target_words")]
    pub target_words: Option<u64>,

    /// Flush progress counters every time the record total crosses a multiple of this
    #[serde(default = "defaults::progress_flush_every")]
    pub progress_flush_every: u64,

    /// Threads presented per review prompt
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,
}

impl CrawlPlan {
    /// Whether both targets are configured and reached.
    pub fn targets_met(&self, total_records: u64, total_words: u64) -> bool {
        match (self.target_records, self.target_words) {
            (Some(records), Some(words)) => total_records >= records && total_words >= words,
            _ => false,
        }
    }
}

impl Default for CrawlPlan {
    fn default() -> Self {
        Self {
            categories: defaults::categories(),
            terms: defaults::terms(),
            search_limit: defaults::search_limit(),
            min_activity: defaults::min_activity(),
            target_records: defaults::target_records(),
            target_words: defaults::target_words(),
            progress_flush_every: defaults::progress_flush_every(),
            batch_size: defaults::batch_size(),
        }
    }
}

/// File locations, relative to the storage directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding `{category}_all.jsonl` streams
    #[serde(default = "defaults::records_dir")]
    pub records_dir: String,

    /// Visited-set file
    #[serde(default = "defaults::visited_file")]
    pub visited_file: String,

    /// Progress counters file
    #[serde(default = "defaults::progress_file")]
    pub progress_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            records_dir: defaults::records_dir(),
            visited_file: defaults::visited_file(),
            progress_file: defaults::progress_file(),
        }
    }
}

/// Title keywords that suggest which hiring step a thread discusses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepHint {
    /// Label printed next to the thread
    pub label: String,

    /// Case-insensitive title substrings
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Label used when no hint matches.
pub const UNKNOWN_STEP: &str = "Unknown Step";

/// Suggest a step label for a thread title. First matching hint wins.
pub fn suggest_step<'a>(hints: &'a [StepHint], title: &str) -> &'a str {
    let title = title.to_lowercase();
    hints
        .iter()
        .find(|hint| {
            hint.keywords
                .iter()
                .any(|kw| title.contains(&kw.to_lowercase()))
        })
        .map_or(UNKNOWN_STEP, |hint| hint.label.as_str())
}

mod defaults {
    use super::StepHint;

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; threadcrawl/0.1)".into()
    }
    pub fn timeout() -> u64 {
        15
    }
    pub fn base_url() -> String {
        "https://www.reddit.com".into()
    }
    pub fn search_delay() -> u64 {
        2_000
    }
    pub fn detail_delay() -> u64 {
        3_000
    }
    pub fn max_attempts() -> u32 {
        5
    }
    pub fn backoff_base() -> u64 {
        10_000
    }
    pub fn backoff_jitter() -> u64 {
        1_000
    }

    // Plan defaults
    pub fn categories() -> Vec<String> {
        ["recruiting", "recruitment", "humanresources", "recruitmentagencies"]
            .into_iter()
            .map(String::from)
            .collect()
    }
    pub fn terms() -> Vec<String> {
        [
            "AI recruit",
            "AI recruiting",
            "AI hiring",
            "AI resume screening",
            "AI interview",
            "ATS AI",
            "recruitment automation",
            "automated candidate screening",
            "interview bot",
            "candidate ranking AI",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
    pub fn search_limit() -> usize {
        100
    }
    pub fn min_activity() -> u64 {
        20
    }
    pub fn target_records() -> Option<u64> {
        Some(70_000)
    }
    pub fn target_words() -> Option<u64> {
        Some(600_000)
    }
    pub fn progress_flush_every() -> u64 {
        1_000
    }
    pub fn batch_size() -> usize {
        30
    }

    // Path defaults
    pub fn records_dir() -> String {
        "jsonl_crawl_full".into()
    }
    pub fn visited_file() -> String {
        "seen_posts.json".into()
    }
    pub fn progress_file() -> String {
        "crawl_progress.json".into()
    }

    // Review hints
    pub fn hints() -> Vec<StepHint> {
        let hint = |label: &str, keywords: &[&str]| StepHint {
            label: label.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        };
        vec![
            hint(
                "Job Posting & Sourcing",
                &["AI recruit", "AI recruiting", "AI hiring"],
            ),
            hint(
                "Resume/CV Screening",
                &[
                    "AI resume screening",
                    "ATS AI",
                    "candidate ranking AI",
                    "automated candidate screening",
                ],
            ),
            hint(
                "Pre-employment Assessments",
                &["AI interview", "interview bot", "AI coding test", "technical assessment"],
            ),
            hint(
                "Candidate Evaluation/Ranking",
                &["candidate ranking AI", "recruitment automation"],
            ),
        ]
    }
}
