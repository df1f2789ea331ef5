// src/services/reddit.rs

//! Rate-limited client for the Reddit JSON endpoints.
//!
//! Two request shapes are used:
//!
//! - search: `/r/{category}/search.json?q=..&sort=relevance&limit=..&restrict_sr=1`
//! - thread detail: `{thread url}.json`
//!
//! Every call is followed by a fixed pacing delay, whatever its outcome.
//! Detail requests are retried with exponential backoff on transient failures.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{CrawlerConfig, RawPost, ThreadDetail, ThreadSummary};
use crate::services::ThreadSource;
use crate::utils::http::{ReqwestTransport, StatusClass, Transport, backoff_delay, pause};
use crate::utils::resolve_url;

#[derive(Deserialize)]
struct PostThing {
    data: RawPost,
}

#[derive(Deserialize, Default)]
struct SearchData {
    #[serde(default)]
    children: Vec<PostThing>,
}

#[derive(Deserialize)]
struct SearchListing {
    #[serde(default)]
    data: SearchData,
}

/// Outcome of a single detail attempt.
enum Attempt {
    Done(Option<ThreadDetail>),
    Retry(String),
}

/// Client for the search and thread detail endpoints.
pub struct RedditClient<T = ReqwestTransport> {
    transport: T,
    base_url: Url,
    search_delay: Duration,
    detail_delay: Duration,
    max_attempts: u32,
    backoff_base: Duration,
    backoff_jitter: Duration,
}

impl RedditClient<ReqwestTransport> {
    /// Create a client that talks HTTP through `reqwest`.
    pub fn from_config(config: &CrawlerConfig) -> Result<Self> {
        Self::with_transport(ReqwestTransport::from_config(config)?, config)
    }
}

impl<T: Transport> RedditClient<T> {
    /// Create a client on top of any transport.
    pub fn with_transport(transport: T, config: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            transport,
            base_url: Url::parse(&config.base_url)?,
            search_delay: Duration::from_millis(config.search_delay_ms),
            detail_delay: Duration::from_millis(config.detail_delay_ms),
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_jitter: Duration::from_millis(config.backoff_jitter_ms),
        })
    }

    /// Build the search URL, asking for twice the wanted number of results.
    fn search_url(&self, category: &str, term: &str, limit: usize) -> Result<Url> {
        let path = format!("r/{category}/search.json");
        let mut url = self.base_url.join(&path)?;
        url.query_pairs_mut()
            .append_pair("q", term)
            .append_pair("sort", "relevance")
            .append_pair("limit", &(limit * 2).to_string())
            .append_pair("restrict_sr", "1");
        Ok(url)
    }

    /// Detail endpoint of a thread.
    fn detail_url(thread: &ThreadSummary) -> String {
        format!("{}.json", thread.url.trim_end_matches('/'))
    }

    fn summarize(&self, post: RawPost) -> ThreadSummary {
        ThreadSummary {
            url: resolve_url(&self.base_url, &post.permalink),
            id: post.id,
            title: post.title,
            permalink: post.permalink,
            activity: post.num_comments,
            category: post.subreddit,
        }
    }

    async fn search_once(
        &self,
        category: &str,
        term: &str,
        limit: usize,
    ) -> Result<Vec<ThreadSummary>> {
        let url = self.search_url(category, term, limit)?;
        let reply = self
            .transport
            .get(url.as_str())
            .await
            .map_err(|e| AppError::crawl(format!("search {category}/{term:?}"), e))?;

        if StatusClass::of(reply.status) != StatusClass::Success {
            return Err(AppError::status(url.as_str(), reply.status));
        }

        let listing: SearchListing = serde_json::from_str(&reply.body)?;
        let mut threads: Vec<ThreadSummary> = listing
            .data
            .children
            .into_iter()
            .map(|thing| self.summarize(thing.data))
            .collect();

        // The source ranks by relevance; re-rank the wider pull by activity.
        threads.sort_by(|a, b| b.activity.cmp(&a.activity));
        threads.truncate(limit);

        log::info!(
            "  Found {} threads for r/{} {:?}",
            threads.len(),
            category,
            term
        );
        Ok(threads)
    }

    async fn attempt_detail(&self, url: &str) -> Attempt {
        let reply = match self.transport.get(url).await {
            Ok(reply) => reply,
            Err(e) => return Attempt::Retry(e.to_string()),
        };

        match (StatusClass::of(reply.status), reply.status) {
            (StatusClass::Success, _) => match ThreadDetail::from_json(&reply.body) {
                Ok(detail) => Attempt::Done(Some(detail)),
                Err(e) => {
                    log::warn!("Unparsable detail response from {}: {}", url, e);
                    Attempt::Done(None)
                }
            },
            (StatusClass::Transient, 429) => Attempt::Retry("429 rate limited".to_string()),
            (StatusClass::Transient, status) => Attempt::Retry(format!("HTTP {status}")),
            (StatusClass::Permanent, 403) => {
                log::warn!("403 forbidden: {} may be private or removed. Skipping.", url);
                Attempt::Done(None)
            }
            (StatusClass::Permanent, 404) => {
                log::warn!("404 not found: {} was deleted. Skipping.", url);
                Attempt::Done(None)
            }
            (StatusClass::Permanent, status) => {
                log::warn!("HTTP {} for {}. Skipping.", status, url);
                Attempt::Done(None)
            }
        }
    }

    async fn fetch_detail_with_retry(&self, thread: &ThreadSummary) -> Option<ThreadDetail> {
        let url = Self::detail_url(thread);

        for attempt in 0..self.max_attempts {
            match self.attempt_detail(&url).await {
                Attempt::Done(detail) => return detail,
                Attempt::Retry(reason) if attempt + 1 < self.max_attempts => {
                    let wait = backoff_delay(self.backoff_base, attempt, self.backoff_jitter);
                    log::warn!(
                        "{}: backing off for {:?} (attempt {}/{})",
                        reason,
                        wait,
                        attempt + 1,
                        self.max_attempts
                    );
                    pause(wait).await;
                }
                Attempt::Retry(reason) => {
                    log::warn!("{} on final attempt for {}", reason, url);
                }
            }
        }

        log::warn!(
            "Max retries ({}) exceeded for {}. Skipping this thread.",
            self.max_attempts,
            url
        );
        None
    }
}

#[async_trait]
impl<T: Transport> ThreadSource for RedditClient<T> {
    async fn search_threads(
        &self,
        category: &str,
        term: &str,
        limit: usize,
    ) -> Result<Vec<ThreadSummary>> {
        let result = self.search_once(category, term, limit).await;
        pause(self.search_delay).await;
        result
    }

    async fn fetch_thread_detail(&self, thread: &ThreadSummary) -> Option<ThreadDetail> {
        let detail = self.fetch_detail_with_retry(thread).await;
        pause(self.detail_delay).await;
        detail
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::utils::http::{HttpReply, TransportError};

    type Reply = std::result::Result<HttpReply, TransportError>;

    /// Plays back canned responses and remembers every requested URL.
    struct Scripted {
        replies: Mutex<VecDeque<Reply>>,
        requests: Arc<Mutex<Vec<String>>>,
    }

    struct RequestLog(Arc<Mutex<Vec<String>>>);

    impl RequestLog {
        fn count(&self) -> usize {
            self.0.lock().unwrap().len()
        }

        fn first(&self) -> String {
            self.0.lock().unwrap()[0].clone()
        }
    }

    fn scripted(replies: Vec<Reply>) -> (RedditClient<Scripted>, RequestLog) {
        scripted_with(replies, &fast_config())
    }

    fn scripted_with(
        replies: Vec<Reply>,
        config: &CrawlerConfig,
    ) -> (RedditClient<Scripted>, RequestLog) {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let transport = Scripted {
            replies: Mutex::new(replies.into()),
            requests: Arc::clone(&requests),
        };
        let client = RedditClient::with_transport(transport, config).unwrap();
        (client, RequestLog(requests))
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn get(&self, url: &str) -> std::result::Result<HttpReply, TransportError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(HttpReply::new(500, "script exhausted")))
        }
    }

    fn fast_config() -> CrawlerConfig {
        CrawlerConfig {
            search_delay_ms: 0,
            detail_delay_ms: 0,
            backoff_base_ms: 0,
            backoff_jitter_ms: 0,
            ..CrawlerConfig::default()
        }
    }

    /// Real-looking delays, without jitter so the schedule is exact.
    fn paced_config() -> CrawlerConfig {
        CrawlerConfig {
            search_delay_ms: 2_000,
            detail_delay_ms: 3_000,
            backoff_base_ms: 10_000,
            backoff_jitter_ms: 0,
            ..CrawlerConfig::default()
        }
    }

    fn thread() -> ThreadSummary {
        ThreadSummary {
            id: "abc".to_string(),
            title: "AI hiring".to_string(),
            permalink: "/r/recruiting/comments/abc/ai_hiring/".to_string(),
            url: "https://www.reddit.com/r/recruiting/comments/abc/ai_hiring/".to_string(),
            activity: 42,
            category: "recruiting".to_string(),
        }
    }

    const DETAIL: &str = r#"[
        {"kind":"Listing","data":{"children":[{"kind":"t3","data":{"subreddit":"recruiting","title":"AI hiring"}}]}},
        {"kind":"Listing","data":{"children":[]}}
    ]"#;

    fn search_body(counts: &[(&str, u64)]) -> String {
        let children: Vec<String> = counts
            .iter()
            .map(|(id, n)| {
                format!(
                    r#"{{"kind":"t3","data":{{"id":"{id}","title":"T {id}","permalink":"/r/recruiting/comments/{id}/t/","num_comments":{n},"subreddit":"recruiting"}}}}"#
                )
            })
            .collect();
        format!(r#"{{"kind":"Listing","data":{{"children":[{}]}}}}"#, children.join(","))
    }

    #[tokio::test]
    async fn test_rate_limited_then_success_uses_five_requests() {
        let (client, log) = scripted(vec![
            Ok(HttpReply::new(429, "")),
            Ok(HttpReply::new(429, "")),
            Ok(HttpReply::new(429, "")),
            Ok(HttpReply::new(429, "")),
            Ok(HttpReply::new(200, DETAIL)),
        ]);

        let detail = client.fetch_thread_detail(&thread()).await;

        assert!(detail.is_some());
        assert_eq!(detail.unwrap().parts.len(), 2);
        assert_eq!(log.count(), 5);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let (client, log) = scripted(vec![
            Err(TransportError::Timeout),
            Ok(HttpReply::new(503, "")),
            Err(TransportError::Connect("refused".into())),
            Ok(HttpReply::new(429, "")),
            Ok(HttpReply::new(500, "")),
            Ok(HttpReply::new(200, DETAIL)),
        ]);

        assert!(client.fetch_thread_detail(&thread()).await.is_none());
        assert_eq!(log.count(), 5);
    }

    #[tokio::test]
    async fn test_forbidden_and_not_found_fail_fast() {
        for status in [403, 404] {
            let (client, log) = scripted(vec![
                Ok(HttpReply::new(status, "")),
                Ok(HttpReply::new(200, DETAIL)),
            ]);

            assert!(client.fetch_thread_detail(&thread()).await.is_none());
            assert_eq!(log.count(), 1);
        }
    }

    #[tokio::test]
    async fn test_unparsable_detail_is_not_retried() {
        let (client, log) = scripted(vec![
            Ok(HttpReply::new(200, "<html>oops</html>")),
            Ok(HttpReply::new(200, DETAIL)),
        ]);

        assert!(client.fetch_thread_detail(&thread()).await.is_none());
        assert_eq!(log.count(), 1);
    }

    #[tokio::test]
    async fn test_detail_url_strips_trailing_slash() {
        let (client, log) = scripted(vec![Ok(HttpReply::new(200, DETAIL))]);
        client.fetch_thread_detail(&thread()).await;

        assert_eq!(
            log.first(),
            "https://www.reddit.com/r/recruiting/comments/abc/ai_hiring.json"
        );
    }

    #[tokio::test]
    async fn test_search_reranks_by_activity_and_truncates() {
        let body = search_body(&[("a", 5), ("b", 50), ("c", 20), ("d", 50)]);
        let (client, log) = scripted(vec![Ok(HttpReply::new(200, body))]);

        let threads = client.search_threads("recruiting", "AI hiring", 3).await.unwrap();
        let ids: Vec<&str> = threads.iter().map(|t| t.id.as_str()).collect();

        assert_eq!(ids, vec!["b", "d", "c"]);
        assert_eq!(
            threads[0].url,
            "https://www.reddit.com/r/recruiting/comments/b/t/"
        );

        let requested = Url::parse(&log.first()).unwrap();
        assert_eq!(requested.path(), "/r/recruiting/search.json");
        let query: Vec<(String, String)> = requested.query_pairs().into_owned().collect();
        assert!(query.contains(&("q".into(), "AI hiring".into())));
        assert!(query.contains(&("limit".into(), "6".into())));
        assert!(query.contains(&("restrict_sr".into(), "1".into())));
    }

    #[tokio::test]
    async fn test_deep_reply_chain_survives_fetch() {
        let mut node = r#"{"kind":"t1","data":{"id":"leaf","body":"deep","created_utc":1700000000.0,"replies":""}}"#.to_string();
        for level in (0..60).rev() {
            node = format!(
                r#"{{"kind":"t1","data":{{"id":"n{level}","body":"x","created_utc":1700000000.0,"replies":{{"kind":"Listing","data":{{"children":[{node}]}}}}}}}}"#
            );
        }
        let body = format!(
            r#"[{{"kind":"Listing","data":{{"children":[{{"kind":"t3","data":{{"subreddit":"recruiting","title":"AI hiring"}}}}]}}}},{{"kind":"Listing","data":{{"children":[{node}]}}}}]"#
        );
        let (client, log) = scripted(vec![Ok(HttpReply::new(200, body))]);

        let detail = client.fetch_thread_detail(&thread()).await.unwrap();
        let flat = crate::services::flatten(detail, "abc", &thread().url);

        assert_eq!(log.count(), 1);
        assert_eq!(flat.record_count, 61);
        assert_eq!(flat.records[60].id, "leaf");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_search_still_paces() {
        let (client, _log) = scripted_with(vec![Ok(HttpReply::new(503, ""))], &paced_config());
        let start = tokio::time::Instant::now();

        assert!(client.search_threads("recruiting", "AI", 10).await.is_err());
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_detail_still_paces() {
        let (client, log) = scripted_with(vec![Ok(HttpReply::new(404, ""))], &paced_config());
        let start = tokio::time::Instant::now();

        assert!(client.fetch_thread_detail(&thread()).await.is_none());
        assert_eq!(log.count(), 1);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_schedule_doubles() {
        let (client, _log) = scripted_with(
            vec![
                Ok(HttpReply::new(429, "")),
                Ok(HttpReply::new(429, "")),
                Ok(HttpReply::new(429, "")),
                Ok(HttpReply::new(429, "")),
                Ok(HttpReply::new(200, DETAIL)),
            ],
            &paced_config(),
        );
        let start = tokio::time::Instant::now();

        assert!(client.fetch_thread_detail(&thread()).await.is_some());
        // 10 + 20 + 40 + 80 of backoff, then the 3 second pacing delay.
        assert_eq!(start.elapsed(), Duration::from_secs(153));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_backoff_after_final_attempt() {
        let (client, log) = scripted_with(
            (0..5).map(|_| Ok(HttpReply::new(500, ""))).collect(),
            &paced_config(),
        );
        let start = tokio::time::Instant::now();

        assert!(client.fetch_thread_detail(&thread()).await.is_none());
        assert_eq!(log.count(), 5);
        assert_eq!(start.elapsed(), Duration::from_secs(153));
    }

    #[tokio::test]
    async fn test_search_failure_is_an_error() {
        let (client, log) = scripted(vec![Ok(HttpReply::new(429, ""))]);

        let result = client.search_threads("recruiting", "AI", 10).await;
        assert!(matches!(result, Err(AppError::Status { status: 429, .. })));
        assert_eq!(log.count(), 1);
    }
}
