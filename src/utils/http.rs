// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use thiserror::Error;

use crate::error::Result;
use crate::models::CrawlerConfig;

/// Status and body of a completed request.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// A request that never produced a status.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else {
            Self::Other(e.to_string())
        }
    }
}

/// Something that can perform a GET request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> std::result::Result<HttpReply, TransportError>;
}

/// How a status code should be treated by a retrying caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    /// Rate limited or server side trouble
    Transient,
    /// Forbidden, not found, or any other client error
    Permanent,
}

impl StatusClass {
    pub fn of(status: u16) -> Self {
        match status {
            200..=299 => Self::Success,
            429 | 500..=599 => Self::Transient,
            _ => Self::Permanent,
        }
    }
}

/// Exponential backoff: `base * 2^attempt`, plus up to `jitter` of random noise.
pub fn backoff_delay(base: Duration, attempt: u32, jitter: Duration) -> Duration {
    let backoff = base.saturating_mul(2u32.saturating_pow(attempt));
    if jitter.is_zero() {
        return backoff;
    }
    let noise = rand::rng().random_range(0..=jitter.as_millis() as u64);
    backoff + Duration::from_millis(noise)
}

/// Sleep unless the duration is zero.
pub async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// [`Transport`] backed by a `reqwest` client.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self::new(create_async_client(config)?))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> std::result::Result<HttpReply, TransportError> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpReply { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        assert_eq!(StatusClass::of(200), StatusClass::Success);
        assert_eq!(StatusClass::of(429), StatusClass::Transient);
        assert_eq!(StatusClass::of(503), StatusClass::Transient);
        assert_eq!(StatusClass::of(403), StatusClass::Permanent);
        assert_eq!(StatusClass::of(404), StatusClass::Permanent);
    }

    #[test]
    fn test_backoff_doubles() {
        let base = Duration::from_secs(10);
        assert_eq!(backoff_delay(base, 0, Duration::ZERO), Duration::from_secs(10));
        assert_eq!(backoff_delay(base, 3, Duration::ZERO), Duration::from_secs(80));
    }

    #[test]
    fn test_backoff_jitter_is_bounded() {
        let base = Duration::from_millis(100);
        let jitter = Duration::from_millis(50);
        for _ in 0..20 {
            let delay = backoff_delay(base, 1, jitter);
            assert!(delay >= Duration::from_millis(200));
            assert!(delay <= Duration::from_millis(250));
        }
    }
}
