// Fetcher: rate-limited, retried HTTP GET returning page content or a typed failure.

mod rate_limiter;
mod transport;

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use url::Url;

pub use rate_limiter::{Clock, RateLimiter, SystemClock};
pub use transport::{HttpTransport, RawResponse, ReqwestTransport, TransportError};

/// 429 responses wait this many times longer than the ordinary backoff.
const RATE_LIMIT_BACKOFF_MULTIPLIER: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSettings {
    pub timeout: Duration,
    /// Total attempts per request, the first one included.
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub min_host_interval: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            min_host_interval: Duration::from_secs(2),
        }
    }
}

/// Coarse error taxonomy recorded on failed companies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    TransientNetwork,
    TerminalRequest,
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureClass::TransientNetwork => f.write_str("transient network error"),
            FailureClass::TerminalRequest => f.write_str("terminal request error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("malformed URL '{0}'")]
    MalformedUrl(String),

    #[error("unsupported URL scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl FetchError {
    /// Timeouts, connection failures, 5xx and 429 are worth another attempt.
    pub fn is_retriable(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Connection(_) => true,
            FetchError::Status(status) => *status == 429 || (500..=599).contains(status),
            FetchError::MalformedUrl(_)
            | FetchError::UnsupportedScheme(_)
            | FetchError::Protocol(_) => false,
        }
    }

    pub fn class(&self) -> FailureClass {
        if self.is_retriable() {
            FailureClass::TransientNetwork
        } else {
            FailureClass::TerminalRequest
        }
    }
}

impl From<TransportError> for FetchError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Timeout => FetchError::Timeout,
            TransportError::Connection(msg) => FetchError::Connection(msg),
            TransportError::Protocol(msg) => FetchError::Protocol(msg),
        }
    }
}

/// A successfully fetched page. `url` is the final URL after redirects.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: Url,
    pub status: u16,
    pub body: String,
}

pub type FetchResult = Result<Page, FetchError>;

/// Parse a user-supplied URL, accepting only absolute http(s) URLs.
pub fn parse_http_url(raw: &str) -> Result<Url, FetchError> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).map_err(|_| FetchError::MalformedUrl(trimmed.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(FetchError::UnsupportedScheme(url.scheme().to_string()));
    }
    if url.host_str().is_none() {
        return Err(FetchError::MalformedUrl(trimmed.to_string()));
    }
    Ok(url)
}

pub struct Fetcher {
    transport: Arc<dyn HttpTransport>,
    limiter: Arc<RateLimiter>,
    settings: FetchSettings,
}

impl Fetcher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        limiter: Arc<RateLimiter>,
        settings: FetchSettings,
    ) -> Self {
        Self {
            transport,
            limiter,
            settings,
        }
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// Fetch with the configured timeout and retry bound.
    pub async fn get(&self, url: &str) -> FetchResult {
        self.fetch(url, self.settings.timeout, self.settings.max_retries)
            .await
    }

    /// Fetch `url`, making at most `max_retries` attempts (minimum one).
    /// Terminal failures return immediately; transient ones back off and retry.
    pub async fn fetch(&self, url: &str, timeout: Duration, max_retries: u32) -> FetchResult {
        let url = parse_http_url(url)?;
        let host = url.host_str().unwrap_or_default().to_string();
        let attempts = max_retries.max(1);

        let mut attempt = 0;
        loop {
            attempt += 1;
            self.limiter.acquire(&host).await;

            let outcome = match self.transport.get(&url, timeout).await {
                Ok(resp) => interpret(resp),
                Err(e) => Err(FetchError::from(e)),
            };

            match outcome {
                Ok(page) => return Ok(page),
                Err(err) if err.is_retriable() && attempt < attempts => {
                    let delay = self.backoff(attempt, &err);
                    tracing::warn!(
                        "Attempt {attempt}/{attempts} for {url} failed ({err}), retrying in {delay:?}"
                    );
                    if !delay.is_zero() {
                        self.limiter.clock().sleep(delay).await;
                    }
                }
                Err(err) => {
                    tracing::debug!("Giving up on {url} after {attempt} attempt(s): {err}");
                    return Err(err);
                }
            }
        }
    }

    fn backoff(&self, attempt: u32, err: &FetchError) -> Duration {
        let mut delay = self
            .settings
            .retry_delay
            .saturating_mul(1 << (attempt - 1).min(16));
        if matches!(err, FetchError::Status(429)) {
            delay = delay.saturating_mul(RATE_LIMIT_BACKOFF_MULTIPLIER);
        }
        let jitter_cap = u64::try_from(delay.as_millis() / 4).unwrap_or(u64::MAX);
        if jitter_cap > 0 {
            delay += Duration::from_millis(rand::rng().random_range(0..=jitter_cap));
        }
        delay
    }
}

fn interpret(resp: RawResponse) -> FetchResult {
    if (200..300).contains(&resp.status) {
        Ok(Page {
            url: resp.final_url,
            status: resp.status,
            body: resp.body,
        })
    } else {
        Err(FetchError::Status(resp.status))
    }
}
