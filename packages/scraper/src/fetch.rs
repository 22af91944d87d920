//! Raw source fetching.
//!
//! [`HttpFetcher`] retrieves the live traffic page; [`FileFetcher`] reads a
//! saved page from disk for offline runs and fixtures. Both produce a
//! [`RawSource`] that the extractor consumes.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::{FetchError, RawSource, retry};

/// Default traffic list page.
pub const DEFAULT_SOURCE_URL: &str = "https://anwb.nl/verkeer/filelijst";

/// Default browser-like user agent. Some CDNs reject obvious bots.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Trait for anything that can produce a [`RawSource`].
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Human-readable description of where content comes from.
    fn describe(&self) -> String;

    /// Fetches the raw source once.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the content cannot be retrieved.
    async fn fetch(&self) -> Result<RawSource, FetchError>;
}

/// HTTP fetch configuration.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// The URL to fetch.
    pub url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retries for transient failures.
    pub max_retries: u32,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Additional HTTP headers.
    pub headers: BTreeMap<String, String>,
}

impl FetchConfig {
    /// Creates a config for `url` with a 30 second timeout, two retries
    /// and Dutch-language browser headers.
    #[must_use]
    pub fn new(url: &str) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(
            "Accept".to_owned(),
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_owned(),
        );
        headers.insert("Accept-Language".to_owned(), "nl-NL,nl;q=0.9,en;q=0.8".to_owned());

        Self {
            url: url.to_owned(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers,
        }
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the number of retries for transient failures.
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        user_agent.clone_into(&mut self.user_agent);
        self
    }

    /// Adds an HTTP header to include in requests.
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SOURCE_URL)
    }
}

/// Fetches the traffic page over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    config: FetchConfig,
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Builds a fetcher and its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidHeader`] if a configured header is not
    /// valid, or [`FetchError::Http`] if the client cannot be built.
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let mut headers = reqwest::header::HeaderMap::new();
        for (key, value) in &config.headers {
            let name = reqwest::header::HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| FetchError::InvalidHeader(format!("{key}: {e}")))?;
            let value = reqwest::header::HeaderValue::from_str(value)
                .map_err(|e| FetchError::InvalidHeader(format!("{key}: {e}")))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self { config, client })
    }

    /// Returns the fetch configuration.
    #[must_use]
    pub const fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    fn describe(&self) -> String {
        self.config.url.clone()
    }

    async fn fetch(&self) -> Result<RawSource, FetchError> {
        log::info!("Fetching {}", self.config.url);
        let url = self.config.url.as_str();
        let response =
            retry::send_text(|| self.client.get(url), self.config.max_retries).await?;

        Ok(RawSource {
            origin: response.url,
            body: response.body,
            content_type: response.content_type,
            fetched_at: Utc::now(),
        })
    }
}

/// Reads a saved page from disk.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    path: PathBuf,
}

impl FileFetcher {
    /// Creates a fetcher for the given file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SourceFetcher for FileFetcher {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<RawSource, FetchError> {
        let body = tokio::fs::read_to_string(&self.path).await?;
        let content_type = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| e.eq_ignore_ascii_case("json"))
            .map(|_| "application/json".to_owned());

        Ok(RawSource::new(&self.describe(), body).with_content_type(content_type))
    }
}
