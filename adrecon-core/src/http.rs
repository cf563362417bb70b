//! Retrying HTTP transport shared by every fetcher.
//!
//! One [`HttpClient`] wraps one pooled `reqwest` session. Retry applies to
//! transport failures, timeouts, 5xx and 429; 429 honours a numeric
//! `Retry-After`. Non-429 4xx fail fast with the body attached so the
//! caller can diagnose (and branch on 401 for token refresh).

use std::time::Duration;

use rand::Rng;
use reqwest::header::RETRY_AFTER;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use adrecon_types::{AdreconError, Network};

/// Transport-level failure returned by [`HttpClient`].
#[derive(Debug, Error)]
pub enum HttpError {
    /// Non-retryable status (4xx other than 429). Body retained for
    /// diagnosis.
    #[error("http {status}: {body}")]
    Status {
        /// Response status code.
        status: u16,
        /// Response body, truncated to a diagnostic length.
        body: String,
    },

    /// Still rate limited after every attempt.
    #[error("rate limited after {attempts} attempts")]
    RateLimited {
        /// Attempts made, including the first.
        attempts: u32,
    },

    /// Connection errors, timeouts, or 5xx after every attempt.
    #[error("transport: {0}")]
    Transport(String),

    /// Response body was not valid JSON for the expected shape.
    #[error("undecodable response: {0}")]
    Decode(String),
}

impl HttpError {
    /// Status code for `Status` failures.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this failure is a credential rejection (401/403).
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }

    /// Attribute this failure to a network using the workspace taxonomy.
    #[must_use]
    pub fn into_fetch_error(self, network: Network) -> AdreconError {
        match self {
            Self::Status { status: 401 | 403, body } => AdreconError::auth(network, body),
            Self::RateLimited { .. } => AdreconError::RateLimit { network },
            Self::Transport(msg) => AdreconError::transport(network, msg),
            Self::Status { status, body } => {
                AdreconError::response_shape(network, format!("http {status}: {body}"))
            }
            Self::Decode(msg) => AdreconError::response_shape(network, msg),
        }
    }
}

/// Retry schedule: full-jitter exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Base delay for the exponential schedule.
    pub base_delay: Duration,
    /// Cap applied to any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before the given (0-based) retry: `min(base * 2^attempt +
    /// rand(0, base), cap)`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_secs_f64();
        let jitter: f64 = if base > 0.0 {
            rand::rng().random_range(0.0..base)
        } else {
            0.0
        };
        let raw = base * f64::from(2u32.saturating_pow(attempt)) + jitter;
        Duration::from_secs_f64(raw.min(self.max_delay.as_secs_f64()))
    }
}

/// Schedule for polling an async report URL until it materializes.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    /// First wait between polls.
    pub initial_interval: Duration,
    /// Multiplier applied after each poll.
    pub factor: f64,
    /// Cap on the interval.
    pub max_interval: Duration,
    /// Overall deadline for the report to appear.
    pub deadline: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(5),
            factor: 1.5,
            max_interval: Duration::from_secs(30),
            deadline: Duration::from_secs(300),
        }
    }
}

/// Successful response: status, body bytes and headers.
#[derive(Debug)]
pub struct HttpResponse {
    /// Response status.
    pub status: StatusCode,
    /// Full response body.
    pub body: Vec<u8>,
    /// Response headers.
    pub headers: reqwest::header::HeaderMap,
}

impl HttpResponse {
    /// Body as UTF-8, lossily.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserialize the body as JSON.
    ///
    /// # Errors
    /// [`HttpError::Decode`] when the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_slice(&self.body).map_err(|e| HttpError::Decode(e.to_string()))
    }
}

const DIAGNOSTIC_BODY_LIMIT: usize = 500;

fn truncate_body(body: &str) -> String {
    if body.len() <= DIAGNOSTIC_BODY_LIMIT {
        body.to_string()
    } else {
        let mut end = DIAGNOSTIC_BODY_LIMIT;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    }
}

/// Pooled, retrying HTTP session. One instance per fetcher; safe to share
/// across tasks.
#[derive(Debug)]
pub struct HttpClient {
    inner: reqwest::Client,
    retry: RetryPolicy,
    min_interval: Option<Duration>,
    last_request: Mutex<Option<Instant>>,
}

impl HttpClient {
    /// Build a client with the default 60s request / 10s connect timeouts.
    ///
    /// # Panics
    /// Panics if the underlying TLS backend cannot initialize, which does
    /// not happen in normal environments.
    #[must_use]
    pub fn new() -> Self {
        let inner = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");
        Self {
            inner,
            retry: RetryPolicy::default(),
            min_interval: None,
            last_request: Mutex::new(None),
        }
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Impose a minimum delay between consecutive requests (declared QPS
    /// caps, e.g. 5 QPS -> 200ms).
    #[must_use]
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = Some(interval);
        self
    }

    /// The underlying `reqwest` client, for building requests.
    #[must_use]
    pub const fn inner(&self) -> &reqwest::Client {
        &self.inner
    }

    /// Start a GET request against `url`.
    #[must_use]
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.inner.get(url)
    }

    /// Start a POST request against `url`.
    #[must_use]
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.inner.post(url)
    }

    /// Start a PUT request against `url`.
    #[must_use]
    pub fn put(&self, url: &str) -> RequestBuilder {
        self.inner.put(url)
    }

    async fn pace(&self) {
        let Some(interval) = self.min_interval else {
            return;
        };
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < interval {
                tokio::time::sleep(interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Send a request, retrying per the configured policy.
    ///
    /// The request must have a cloneable body (buffered, not streamed).
    ///
    /// # Errors
    /// [`HttpError`] per the retry contract: `Status` for fast-fail 4xx,
    /// `RateLimited` when 429 persists, `Transport` when connectivity or
    /// 5xx persists.
    pub async fn send(&self, request: RequestBuilder) -> Result<HttpResponse, HttpError> {
        let mut saw_rate_limit = false;
        let mut last_error = String::new();

        for attempt in 0..self.retry.max_attempts {
            let Some(req) = request.try_clone() else {
                return Err(HttpError::Transport(
                    "request body is not cloneable for retry".to_string(),
                ));
            };

            self.pace().await;

            match req.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        saw_rate_limit = true;
                        let retry_after = resp
                            .headers()
                            .get(RETRY_AFTER)
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.trim().parse::<u64>().ok())
                            .map(Duration::from_secs);
                        if attempt + 1 < self.retry.max_attempts {
                            let delay = retry_after.unwrap_or_else(|| self.retry.delay_for(attempt));
                            warn!(attempt, delay_ms = delay.as_millis() as u64, "rate limited, backing off");
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        break;
                    }
                    if status.is_server_error() {
                        last_error = format!("http {status}");
                        if attempt + 1 < self.retry.max_attempts {
                            let delay = self.retry.delay_for(attempt);
                            warn!(attempt, %status, "server error, backing off");
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        break;
                    }
                    let headers = resp.headers().clone();
                    let body = resp
                        .bytes()
                        .await
                        .map_err(|e| HttpError::Transport(e.to_string()))?
                        .to_vec();
                    if status.is_client_error() {
                        return Err(HttpError::Status {
                            status: status.as_u16(),
                            body: truncate_body(&String::from_utf8_lossy(&body)),
                        });
                    }
                    debug!(%status, bytes = body.len(), "request succeeded");
                    return Ok(HttpResponse { status, body, headers });
                }
                Err(e) => {
                    last_error = e.to_string();
                    if attempt + 1 < self.retry.max_attempts {
                        let delay = self.retry.delay_for(attempt);
                        warn!(attempt, error = %last_error, "transport error, backing off");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                }
            }
        }

        if saw_rate_limit {
            Err(HttpError::RateLimited {
                attempts: self.retry.max_attempts,
            })
        } else {
            Err(HttpError::Transport(last_error))
        }
    }

    /// Send and deserialize a JSON response body.
    ///
    /// # Errors
    /// See [`send`](Self::send); additionally `Decode` on a JSON mismatch.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, HttpError> {
        self.send(request).await?.json()
    }

    /// Poll an async-report URL until it returns 200 with a body.
    ///
    /// The report endpoint answers 202/204/404 while the report is being
    /// prepared; those continue the poll on a growing interval. Any other
    /// failure aborts immediately.
    ///
    /// # Errors
    /// `Transport` when the deadline passes without a ready report.
    pub async fn poll_until_ready(
        &self,
        url: &str,
        config: PollConfig,
        decorate: impl Fn(RequestBuilder) -> RequestBuilder,
    ) -> Result<Vec<u8>, HttpError> {
        let started = Instant::now();
        let mut interval = config.initial_interval;

        loop {
            let req = decorate(self.inner.get(url));
            match self.send(req).await {
                Ok(resp) if resp.status == StatusCode::OK && !resp.body.is_empty() => {
                    return Ok(resp.body);
                }
                Ok(resp) => {
                    debug!(status = %resp.status, "report not ready yet");
                }
                Err(HttpError::Status { status: 404, .. }) => {
                    debug!("report url not materialized yet");
                }
                Err(other) => return Err(other),
            }

            if started.elapsed() + interval > config.deadline {
                return Err(HttpError::Transport(format!(
                    "report polling exceeded {}s deadline",
                    config.deadline.as_secs()
                )));
            }
            tokio::time::sleep(interval).await;
            interval = Duration::from_secs_f64(
                (interval.as_secs_f64() * config.factor).min(config.max_interval.as_secs_f64()),
            );
        }
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_capped_and_jittered() {
        let policy = RetryPolicy::default();
        for attempt in 0..10 {
            let delay = policy.delay_for(attempt);
            assert!(delay <= policy.max_delay);
        }
        let first = policy.delay_for(0);
        assert!(first >= policy.base_delay);
        assert!(first <= policy.base_delay * 2);
    }

    #[test]
    fn body_truncation_keeps_char_boundaries() {
        let long = "é".repeat(400);
        let truncated = truncate_body(&long);
        assert!(truncated.ends_with("..."));
        assert!(truncated.len() <= DIAGNOSTIC_BODY_LIMIT + 3);
    }
}
