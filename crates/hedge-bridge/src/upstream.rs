//! HTTP client for the upstream addon.
//!
//! Two egress calls exist: forwarding a hedge-closure notification (with
//! retry) and the liveness probe used by the reconnect coordinator. The
//! forwarded body is the exact bytes the downstream executor sent; the
//! bridge never re-serialises it.
//!
//! ## Retry policy
//!
//! Attempt `k` (1-based) runs with a `5 + 2k` second timeout, so the
//! default three attempts use 7 s, 9 s and 11 s. Transport failures back
//! off `500·k` ms before the next attempt. A completed exchange that
//! returns a non-2xx status is a terminal rejection and is not retried.

use std::time::Duration;

use axum::body::Bytes;
use reqwest::{header, Client, StatusCode};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::UpstreamConfig;

/// Per-attempt timeout: 5 + 2k seconds for attempt k.
pub fn attempt_timeout(attempt: u32) -> Duration {
    Duration::from_secs(5 + 2 * attempt as u64)
}

/// Backoff after a failed attempt k: 500·k ms.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(500 * attempt as u64)
}

/// Failure of the closure forward.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// Every attempt failed at the transport level.
    #[error("upstream unreachable after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        source: reqwest::Error,
    },

    /// The upstream answered with a non-2xx status.
    #[error("upstream rejected notification with status {status}")]
    Rejected { status: StatusCode, body: String },

    /// The upstream answered 2xx but its body could not be read.
    #[error("failed to read upstream response: {0}")]
    ReadBody(reqwest::Error),
}

/// A successful (2xx) upstream acknowledgement.
#[derive(Debug)]
pub struct ForwardReceipt {
    pub status: StatusCode,
    pub body: Bytes,
}

/// Client for the upstream addon endpoints.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: Client,
    notify_url: String,
    ping_url: String,
    attempts: u32,
    ping_timeout: Duration,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Self {
        // Timeouts are set per request; the shared client carries none.
        let http = Client::builder()
            .build()
            .expect("failed to build upstream HTTP client");
        Self {
            http,
            notify_url: format!("{}{}", config.base_url, config.notify_path),
            ping_url: format!("{}{}", config.base_url, config.ping_path),
            attempts: config.forward_attempts,
            ping_timeout: Duration::from_secs(config.ping_timeout_secs),
        }
    }

    pub fn notify_url(&self) -> &str {
        &self.notify_url
    }

    pub fn ping_url(&self) -> &str {
        &self.ping_url
    }

    /// Forward a closure notification body verbatim.
    pub async fn forward_closure(&self, body: Bytes) -> Result<ForwardReceipt, ForwardError> {
        let mut attempt = 1u32;
        loop {
            let timeout = attempt_timeout(attempt);
            debug!(
                attempt,
                max_attempts = self.attempts,
                timeout_secs = timeout.as_secs(),
                url = %self.notify_url,
                "forwarding closure notification upstream"
            );

            let result = self
                .http
                .post(&self.notify_url)
                .header(header::CONTENT_TYPE, "application/json")
                .timeout(timeout)
                .body(body.clone())
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        let body = response.text().await.unwrap_or_default();
                        warn!(status = status.as_u16(), body = %body, "upstream rejected closure notification");
                        return Err(ForwardError::Rejected { status, body });
                    }
                    let body = response.bytes().await.map_err(ForwardError::ReadBody)?;
                    debug!(attempt, status = status.as_u16(), "closure notification forwarded");
                    return Ok(ForwardReceipt { status, body });
                }
                Err(e) => {
                    warn!(attempt, max_attempts = self.attempts, error = %e, "closure forward attempt failed");
                    if attempt >= self.attempts {
                        return Err(ForwardError::Exhausted {
                            attempts: self.attempts,
                            source: e,
                        });
                    }
                    tokio::time::sleep(backoff_delay(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Probe the upstream liveness endpoint. Returns the HTTP status; the
    /// caller decides what non-2xx means.
    pub async fn ping(&self) -> Result<StatusCode, reqwest::Error> {
        let response = self
            .http
            .get(&self.ping_url)
            .timeout(self.ping_timeout)
            .send()
            .await?;
        Ok(response.status())
    }
}
