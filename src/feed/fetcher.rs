use crate::feed::parser::parse_snapshot;
use crate::feed::snapshot::FeedSnapshot;
use futures::StreamExt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Default per-request timeout; a hung fetch must never wedge the poll loop.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while taking a feed snapshot.
///
/// Every variant is recoverable once the monitor is running; see
/// [`FetchError::cause`] for the coarse network/parse split.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Feed XML could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Coarse classification of a [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchCause {
    Network,
    Parse,
}

impl std::fmt::Display for FetchCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchCause::Network => f.write_str("network"),
            FetchCause::Parse => f.write_str("parse"),
        }
    }
}

impl FetchError {
    pub fn cause(&self) -> FetchCause {
        match self {
            FetchError::Parse(_) => FetchCause::Parse,
            FetchError::Network(_)
            | FetchError::HttpStatus(_)
            | FetchError::Timeout
            | FetchError::ResponseTooLarge
            | FetchError::IncompleteResponse { .. } => FetchCause::Network,
        }
    }
}

/// Anything that can produce a fresh [`FeedSnapshot`].
///
/// Implementations must not retry internally; retry and backoff belong to
/// the monitor.
pub trait FeedSource {
    fn fetch(&self) -> impl Future<Output = Result<FeedSnapshot, FetchError>> + Send;
}

/// Fetches a single feed URL over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFeedSource {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpFeedSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl FeedSource for HttpFeedSource {
    async fn fetch(&self) -> Result<FeedSnapshot, FetchError> {
        fetch_snapshot(&self.client, &self.url, self.timeout).await
    }
}

/// Retrieves `url` and parses the body into a [`FeedSnapshot`].
///
/// # Errors
///
/// - [`FetchError::Network`] - Connection or TLS errors
/// - [`FetchError::Timeout`] - Request exceeded `timeout`
/// - [`FetchError::HttpStatus`] - Non-2xx HTTP response
/// - [`FetchError::ResponseTooLarge`] - Response exceeded 10MB
/// - [`FetchError::IncompleteResponse`] - Body shorter than Content-Length
/// - [`FetchError::Parse`] - Invalid RSS/Atom XML
pub async fn fetch_snapshot(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<FeedSnapshot, FetchError> {
    // The timeout covers the body read as well as the headers
    let bytes = tokio::time::timeout(timeout, async {
        let response = client.get(url).send().await.map_err(FetchError::Network)?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        read_limited_bytes(response, MAX_FEED_SIZE).await
    })
    .await
    .map_err(|_| FetchError::Timeout)??;

    let snapshot = parse_snapshot(&bytes).map_err(|e| FetchError::Parse(e.to_string()))?;

    tracing::debug!(
        feed = %url,
        entries = snapshot.len(),
        bytes = bytes.len(),
        "Fetched feed snapshot"
    );

    Ok(snapshot)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Capture Content-Length for completeness check
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    ensure_complete(expected_length, bytes.len())?;
    Ok(bytes)
}

/// Fails if fewer bytes arrived than the response declared.
fn ensure_complete(expected: Option<u64>, received: usize) -> Result<(), FetchError> {
    match expected {
        Some(expected) if (received as u64) < expected => {
            Err(FetchError::IncompleteResponse { expected, received })
        }
        _ => Ok(()),
    }
}
