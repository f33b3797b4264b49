use crate::feed::parser::parse_items;
use crate::history::Item;
use crate::registry::FeedSource;
use crate::throttle::DomainThrottle;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while retrieving a single feed.
///
/// All of these are recoverable at the cycle level: the failure is recorded
/// on the feed source and the fetch is retried on the next scheduled cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The stored feed URL could not be parsed.
    #[error("Invalid feed URL: {0}")]
    Url(#[from] url::ParseError),
    /// The feed URL has no host to throttle against.
    #[error("Feed URL has no host")]
    MissingHost,
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request (including body read) exceeded the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Payload could not be decoded as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Retrieves one feed at a time, gated by the shared [`DomainThrottle`].
///
/// A fetch is all-or-nothing: any network, timeout, or decode failure
/// returns an error and no items. The fetcher mutates nothing beyond the
/// throttle state; registry and history updates belong to the update cycle.
pub struct SourceFetcher {
    client: reqwest::Client,
    throttle: Arc<DomainThrottle>,
    timeout: Duration,
}

impl SourceFetcher {
    pub fn new(client: reqwest::Client, throttle: Arc<DomainThrottle>, timeout: Duration) -> Self {
        Self {
            client,
            throttle,
            timeout,
        }
    }

    /// Fetches and decodes `source`, stamping each item with the source URL.
    ///
    /// Blocks in two places: the throttle gate (up to the per-domain
    /// minimum interval) and the network retrieval (bounded by the
    /// configured timeout, covering both the request and the body read).
    pub async fn fetch(&self, source: &FeedSource) -> Result<Vec<Item>, FetchError> {
        let url = Url::parse(&source.url)?;
        let host = url.host_str().ok_or(FetchError::MissingHost)?.to_owned();

        self.throttle.acquire(&host).await;

        let bytes = tokio::time::timeout(self.timeout, self.retrieve(url))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))??;

        let items =
            parse_items(&bytes, &source.url).map_err(|e| FetchError::Parse(e.to_string()))?;

        tracing::debug!(feed = %source.url, items = items.len(), "fetched feed");
        Ok(items)
    }

    async fn retrieve(&self, url: Url) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        read_limited_bytes(response, MAX_FEED_SIZE).await
    }
}

/// Streams the response body, refusing to buffer more than `limit` bytes.
async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
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

    Ok(bytes)
}
