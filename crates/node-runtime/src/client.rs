//! The retrying HTTP client used for all outbound peer and tracker calls.
//!
//! Centralizes bounded exponential backoff, escalating per-attempt
//! timeouts, and absence-instead-of-error semantics: a peer that stays
//! unreachable after every retry yields `None`, and the caller proceeds
//! degraded (skip the peer, treat the tracker as temporarily away). An
//! HTTP response of any status is a definitive answer and is never
//! retried.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Outcome of a POST that reached the peer: status plus parsed body.
#[derive(Debug, Clone)]
pub struct PeerResponse {
    /// HTTP status the peer answered with.
    pub status: StatusCode,
    /// Parsed JSON body, `Null` when the body did not parse.
    pub body: Value,
}

/// Reqwest wrapper with bounded retries.
#[derive(Clone)]
pub struct RetryingClient {
    http: reqwest::Client,
    max_attempts: u32,
    base_timeout: Duration,
    timeout_step: Duration,
    initial_backoff: Duration,
}

impl RetryingClient {
    /// Client with the default retry policy: three attempts, half-second
    /// doubling backoff, timeouts escalating from three seconds.
    pub fn new() -> Self {
        Self::with_policy(3, Duration::from_secs(3), Duration::from_secs(2), Duration::from_millis(500))
    }

    /// Client with an explicit retry policy.
    pub fn with_policy(
        max_attempts: u32,
        base_timeout: Duration,
        timeout_step: Duration,
        initial_backoff: Duration,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            max_attempts,
            base_timeout,
            timeout_step,
            initial_backoff,
        }
    }

    /// GET a JSON document. `None` once every retry is exhausted, or on a
    /// non-success status.
    pub async fn get_json(&self, url: &str) -> Option<Value> {
        for attempt in 0..self.max_attempts {
            self.backoff(attempt).await;
            let request = self.http.get(url).timeout(self.attempt_timeout(attempt));
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    match response.json::<Value>().await {
                        Ok(body) => return Some(body),
                        Err(error) => {
                            warn!(url, %error, "peer returned unparseable JSON");
                            return None;
                        }
                    }
                }
                Ok(response) => {
                    debug!(url, status = %response.status(), "request answered unsuccessfully");
                    return None;
                }
                Err(error) => warn!(url, attempt, %error, "request failed, will retry"),
            }
        }
        None
    }

    /// POST a JSON body and return whatever the peer answered.
    pub async fn post_json<T: Serialize>(&self, url: &str, body: &T) -> Option<PeerResponse> {
        for attempt in 0..self.max_attempts {
            self.backoff(attempt).await;
            let request = self
                .http
                .post(url)
                .json(body)
                .timeout(self.attempt_timeout(attempt));
            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let body = response.json::<Value>().await.unwrap_or(Value::Null);
                    return Some(PeerResponse { status, body });
                }
                Err(error) => warn!(url, attempt, %error, "request failed, will retry"),
            }
        }
        None
    }

    fn attempt_timeout(&self, attempt: u32) -> Duration {
        self.base_timeout + self.timeout_step * attempt
    }

    async fn backoff(&self, attempt: u32) {
        if attempt > 0 {
            let delay = self.initial_backoff * 2u32.saturating_pow(attempt - 1);
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for RetryingClient {
    fn default() -> Self {
        Self::new()
    }
}
