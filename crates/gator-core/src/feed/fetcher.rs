use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Proxy};
use tokio::sync::watch;
use url::Url;

use super::parser::{parse_feed, FeedDocument};
use crate::config::AppConfig;
use crate::shutdown::wait_for_shutdown;
use crate::{Error, Result};

/// Fixed client identifier sent with every request
pub const CLIENT_USER_AGENT: &str = "gator";

/// Feed fetcher with a shared HTTP client
pub struct FeedFetcher {
    client: Client,
    max_feed_bytes: usize,
}

impl FeedFetcher {
    /// Create a new feed fetcher with configuration
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Self::build_client(&config.sync.proxy_url)?;

        Ok(Self {
            client,
            max_feed_bytes: config.sync.max_feed_bytes,
        })
    }

    /// Build HTTP client with optional proxy.
    ///
    /// No request timeout is set: a fetch is bounded only by the caller's
    /// shutdown signal.
    fn build_client(proxy_url: &Option<String>) -> Result<Client> {
        let mut builder = Client::builder()
            .default_headers(Self::build_headers())
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some(ref proxy) = proxy_url {
            let proxy = Proxy::all(proxy)
                .map_err(|e| Error::Config(format!("Invalid proxy URL: {}", e)))?;
            builder = builder.proxy(proxy);
            tracing::info!("Using HTTP proxy for feed fetching");
        }

        Ok(builder.build()?)
    }

    fn build_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/rss+xml,application/xml;q=0.9,text/xml;q=0.8,*/*;q=0.5"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
        headers
    }

    /// Validate a feed URL; only http(s) sources are fetchable
    pub fn resolve_url(&self, url: &str) -> Result<String> {
        validate_feed_url(url)
    }

    /// Fetch and parse a feed from URL.
    ///
    /// The request is abandoned with [`Error::Cancelled`] as soon as `true`
    /// is published on `shutdown`.
    pub async fn fetch(&self, url: &str, mut shutdown: watch::Receiver<bool>) -> Result<FeedDocument> {
        let resolved_url = self.resolve_url(url)?;

        if *shutdown.borrow() {
            return Err(Error::Cancelled);
        }

        tracing::debug!("Fetching feed from: {}", resolved_url);

        let body = tokio::select! {
            result = self.fetch_body(&resolved_url) => result?,
            _ = wait_for_shutdown(&mut shutdown) => {
                tracing::debug!("Fetch of {} cancelled", resolved_url);
                return Err(Error::Cancelled);
            }
        };

        let text = std::str::from_utf8(&body).map_err(|e| {
            Error::FeedParse(format!("Feed body is not valid UTF-8 ({}) for URL: {}", e, resolved_url))
        })?;

        parse_feed(text)
    }

    /// Issue the GET and read the whole body
    async fn fetch_body(&self, url: &str) -> Result<Bytes> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        if let Some(len) = response.content_length() {
            self.ensure_content_size(len as usize, url)?;
        }

        let body = response.bytes().await?;
        self.ensure_content_size(body.len(), url)?;

        Ok(body)
    }

    fn ensure_content_size(&self, size: usize, url: &str) -> Result<()> {
        if size > self.max_feed_bytes {
            return Err(Error::FeedTooLarge {
                size,
                limit: self.max_feed_bytes,
                url: url.to_string(),
            });
        }
        Ok(())
    }
}

/// Check that `url` parses and uses an http(s) scheme
pub fn validate_feed_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url.trim())?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed.to_string()),
        other => Err(Error::Config(format!(
            "Unsupported feed URL scheme '{}': {}",
            other, url
        ))),
    }
}
