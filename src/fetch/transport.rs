use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::AppError;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
const MAX_REDIRECTS: usize = 5;

/// What came back from a single GET, before any status interpretation.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub final_url: Url,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// The single HTTP capability the pipeline depends on.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &Url, timeout: Duration) -> Result<RawResponse, TransportError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| AppError::HttpClient(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &Url, timeout: Duration) -> Result<RawResponse, TransportError> {
        let resp = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .header("Accept", "text/html,application/xhtml+xml,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = resp.status().as_u16();
        let final_url = resp.url().clone();

        // Error bodies are never parsed, so don't pay for downloading them.
        let body = if resp.status().is_success() {
            resp.text().await.map_err(map_reqwest_error)?
        } else {
            String::new()
        };

        Ok(RawResponse {
            status,
            final_url,
            body,
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() || e.is_request() || e.is_body() {
        TransportError::Connection(e.to_string())
    } else {
        TransportError::Protocol(e.to_string())
    }
}
