//! Page retrieval: one GET, markup reduced to text.
//!
//! [`ContentFetcher`] is the seam the fetch tool talks to. [`HttpFetcher`]
//! is the production implementation built on `reqwest`.
//!
//! Outcomes map onto the tool layer like this:
//!
//! | Situation | Return | Tool layer sees |
//! |-----------|--------|-----------------|
//! | 2xx | `Ok(text)` | text |
//! | non-2xx | `Ok("Failed to fetch ... status code N")` | text (soft) |
//! | malformed URL | `Err(FetchError::InvalidUrl)` | text (soft) |
//! | connect / timeout / body read | `Err(FetchError::Transport)` | hard failure |

pub mod html;

use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use html::{html_to_text, strip_line_breaks};

/// Desktop Chrome user agent. Many storefronts refuse obvious bots.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.302.98 Safari/537.36";

pub const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Scratch file holding the last reduced page.
pub const DEFAULT_SCRATCH_FILE: &str = "soup.txt";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Boxed future returned by [`ContentFetcher::fetch`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<String, FetchError>> + Send + 'a>>;

/// Retrieves a URL and reduces it to plain text.
pub trait ContentFetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> FetchFuture<'a>;
}

/// Settings for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub accept_language: String,
    pub timeout: Duration,
    /// Where to write the reduced text of the last successful fetch.
    /// `None` disables the scratch file.
    pub scratch_path: Option<PathBuf>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.into(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.into(),
            timeout: DEFAULT_FETCH_TIMEOUT,
            scratch_path: Some(PathBuf::from(DEFAULT_SCRATCH_FILE)),
        }
    }
}

impl FetchConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_scratch_path(mut self, path: Option<PathBuf>) -> Self {
        self.scratch_path = path;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Fetches pages over HTTP with browser-like headers.
pub struct HttpFetcher {
    client: reqwest::Client,
    scratch_path: Option<PathBuf>,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| FetchError::Client(format!("bad user agent: {e}")))?,
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.accept_language)
                .map_err(|e| FetchError::Client(format!("bad accept-language: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            scratch_path: config.scratch_path,
        })
    }

    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let parsed = parse_http_url(url)?;
        info!("Calling URL: {parsed}");
        let start = Instant::now();

        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let resp = self.client.get(parsed).send().await.map_err(transport)?;
        let status = resp.status();
        if !status.is_success() {
            debug!("GET {url} -> HTTP {status}");
            return Ok(format!(
                "Failed to fetch the HTML text from {url} with status code {}",
                status.as_u16()
            ));
        }

        let body = resp.text().await.map_err(transport)?;
        let text = html_to_text(&body);
        debug!(
            "GET {url} -> HTTP {status} in {:.1}s ({} bytes html, {} bytes text)",
            start.elapsed().as_secs_f64(),
            body.len(),
            text.len()
        );

        if let Some(path) = &self.scratch_path {
            match tokio::fs::write(path, &text).await {
                Ok(()) => debug!("Page text saved to {}", path.display()),
                Err(e) => warn!("Could not write scratch file {}: {e}", path.display()),
            }
        }

        Ok(strip_line_breaks(&text))
    }
}

impl ContentFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> FetchFuture<'a> {
        Box::pin(self.get_text(url))
    }
}

/// Accept only absolute `http`/`https` URLs.
pub fn parse_http_url(url: &str) -> Result<reqwest::Url, FetchError> {
    let invalid = |reason: String| FetchError::InvalidUrl {
        url: url.to_string(),
        reason,
    };
    let parsed = reqwest::Url::parse(url.trim()).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_http_urls() {
        assert!(parse_http_url("https://www.ikea.com/nl/en/cat/best-sellers/").is_ok());
        assert!(parse_http_url("  http://localhost:8080/x ").is_ok());
    }

    #[test]
    fn rejects_non_http_urls() {
        assert!(matches!(
            parse_http_url("ftp://example.com/file"),
            Err(FetchError::InvalidUrl { .. })
        ));
        assert!(matches!(
            parse_http_url("not a url"),
            Err(FetchError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn default_config_matches_browser() {
        let config = FetchConfig::default();
        assert!(config.user_agent.starts_with("Mozilla/5.0"));
        assert_eq!(config.accept_language, "en-US,en;q=0.5");
        assert_eq!(config.timeout, Duration::from_secs(20));
        assert_eq!(config.scratch_path, Some(PathBuf::from("soup.txt")));
    }
}
