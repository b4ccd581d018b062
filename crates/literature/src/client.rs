//! External-API client framework (spec.md §4.8): per-client rate limiting,
//! retrying JSON fetch with fixed backoff, and shared timeout handling.
//! Every concrete source client in `sources/` is built on top of this.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use ba_domain::error::{Error, Result};

/// Enforces a minimum interval between requests from a single client.
/// Guarded by a mutex so concurrent callers serialize on the wait, matching
/// spec.md §4.8's "guarded against concurrent access."
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Block until at least `min_interval` has elapsed since the previous call.
    pub async fn wait(&self) {
        let sleep_for = {
            let mut last = self.last_request.lock();
            let now = Instant::now();
            let sleep_for = match *last {
                Some(prev) if now.duration_since(prev) < self.min_interval => {
                    self.min_interval - now.duration_since(prev)
                }
                _ => Duration::ZERO,
            };
            *last = Some(now + sleep_for);
            sleep_for
        };
        if !sleep_for.is_zero() {
            tokio::time::sleep(sleep_for).await;
        }
    }
}

/// Shared configuration for one concrete source client (spec.md §4.8): base
/// URL, default headers, default timeout, default min-interval. Every
/// concrete client in `sources/` constructs one of these and reads its
/// `base_url`/`timeout`/`min_interval`/`user_agent`/`api_key` from it rather
/// than hardcoding its own copies.
pub struct ClientConfig {
    pub base_url: String,
    pub user_agent: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub min_interval: Duration,
    pub max_retries: u32,
}

impl ClientConfig {
    /// Start from a base URL and the client's minimum request interval.
    /// Defaults: `BioAgent/1.0` user agent, no API key, 30s timeout, 2 retries.
    pub fn new(base_url: impl Into<String>, min_interval: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            user_agent: "BioAgent/1.0".into(),
            api_key: None,
            timeout: Duration::from_secs(30),
            min_interval,
            max_retries: 2,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Fetch JSON with bounded retries and fixed backoff on transient network
/// errors. Non-2xx HTTP status and JSON-parse failures are treated as
/// permanent for the current attempt, but still count against retries since
/// upstream APIs occasionally 5xx transiently.
pub async fn retrying_fetch_json<F>(
    client: &reqwest::Client,
    source: &str,
    max_retries: u32,
    timeout: Duration,
    build: F,
) -> Result<serde_json::Value>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = tokio::time::timeout(timeout, build().send()).await;
        match result {
            Ok(Ok(resp)) => {
                let status = resp.status();
                if status.is_success() {
                    return resp.json::<serde_json::Value>().await.map_err(|e| {
                        Error::Parse(format!("{source}: invalid JSON response: {e}"))
                    });
                }
                if status.is_server_error() && attempt <= max_retries {
                    backoff(attempt).await;
                    continue;
                }
                return Err(Error::ExternalApiPermanent {
                    source: source.into(),
                    message: format!("HTTP {status}"),
                });
            }
            Ok(Err(e)) if attempt <= max_retries => {
                tracing::warn!(source, attempt, error = %e, "transient fetch error, retrying");
                backoff(attempt).await;
            }
            Ok(Err(e)) => {
                return Err(Error::ExternalApiTransient {
                    source: source.into(),
                    message: e.to_string(),
                });
            }
            Err(_) => {
                return Err(Error::Timeout(format!(
                    "{source}: request timed out after {}ms",
                    timeout.as_millis()
                )));
            }
        }
    }
}

async fn backoff(attempt: u32) {
    tokio::time::sleep(Duration::from_millis(250 * attempt as u64)).await;
}
