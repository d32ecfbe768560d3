//! Link-preview entry points
//!
//! [`Previewer`] validates the input, runs a bounded fetch through its
//! [`Fetcher`] and feeds the body to the extractor. Every outcome, including
//! failure, comes back as an [`OpenGraphResult`].

use crate::error::{ConfigError, ErrorCode};
use crate::extract::extract;
use crate::fetchers::{Fetcher, HttpFetcher};
use crate::types::{FetchOptions, FetchRequest, OpenGraphResult, PartialMetadata};
use crate::{DEFAULT_MAX_BYTES, DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
use std::num::NonZeroUsize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Binary content type prefixes that are never scanned for markup
const BINARY_PREFIXES: &[&str] = &[
    "image/",
    "audio/",
    "video/",
    "application/octet-stream",
    "application/pdf",
    "application/zip",
    "application/gzip",
    "application/x-tar",
    "application/x-rar",
    "application/x-7z",
    "application/vnd.ms-",
    "application/vnd.openxmlformats",
    "font/",
];

/// Fetch link-preview metadata with the default configuration
pub async fn fetch_open_graph(url: &str) -> OpenGraphResult {
    fetch_open_graph_with_options(url, FetchOptions::default()).await
}

/// Fetch link-preview metadata with per-call overrides
///
/// For custom defaults, User-Agent or redirect cap, build a [`Previewer`].
pub async fn fetch_open_graph_with_options(url: &str, options: FetchOptions) -> OpenGraphResult {
    Previewer::default().fetch_open_graph(url, options).await
}

/// Builder for configuring a [`Previewer`]
#[derive(Default)]
pub struct PreviewerBuilder {
    timeout: Option<Duration>,
    max_bytes: Option<usize>,
    max_redirects: Option<usize>,
    user_agent: Option<String>,
    fetcher: Option<Box<dyn Fetcher>>,
}

impl PreviewerBuilder {
    /// Create a builder with the documented defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default deadline for calls that do not override it
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Default body byte ceiling for calls that do not override it
    pub fn max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    /// Redirect cap for the built-in HTTP fetcher
    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = Some(max_redirects);
        self
    }

    /// User-Agent for the built-in HTTP fetcher
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Replace the HTTP fetcher
    ///
    /// `max_redirects` and `user_agent` only configure the built-in fetcher.
    pub fn fetcher(mut self, fetcher: Box<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Build the previewer, rejecting zero timeout or byte ceiling
    pub fn build(self) -> Result<Previewer, ConfigError> {
        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        let max_bytes = NonZeroUsize::new(self.max_bytes.unwrap_or(DEFAULT_MAX_BYTES))
            .ok_or(ConfigError::ZeroMaxBytes)?;

        let fetcher = self.fetcher.unwrap_or_else(|| {
            Box::new(
                HttpFetcher::new()
                    .with_user_agent(self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT))
                    .with_max_redirects(self.max_redirects.unwrap_or(DEFAULT_MAX_REDIRECTS)),
            )
        });

        Ok(Previewer {
            timeout,
            max_bytes,
            fetcher,
        })
    }
}

/// Configured link-preview fetcher
///
/// Holds configuration only; nothing is shared between calls, so one
/// previewer can serve any number of concurrent calls.
pub struct Previewer {
    timeout: Duration,
    max_bytes: NonZeroUsize,
    fetcher: Box<dyn Fetcher>,
}

impl Default for Previewer {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_bytes: NonZeroUsize::new(DEFAULT_MAX_BYTES).unwrap_or(NonZeroUsize::MIN),
            fetcher: Box::new(HttpFetcher::new()),
        }
    }
}

impl std::fmt::Debug for Previewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Previewer")
            .field("timeout", &self.timeout)
            .field("max_bytes", &self.max_bytes)
            .field("fetcher", &self.fetcher.name())
            .finish()
    }
}

impl Previewer {
    /// Create a new previewer builder
    pub fn builder() -> PreviewerBuilder {
        PreviewerBuilder::new()
    }

    /// Default deadline
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Default body byte ceiling
    pub fn max_bytes(&self) -> usize {
        self.max_bytes.get()
    }

    /// Fetch `url` and extract its link-preview metadata
    ///
    /// Never fails: errors are reported through [`OpenGraphResult::error`].
    pub async fn fetch_open_graph(&self, url: &str, options: FetchOptions) -> OpenGraphResult {
        let Some(target) = parse_target(url) else {
            debug!(url, "Rejected invalid URL");
            return OpenGraphResult::failed(url, ErrorCode::InvalidUrl);
        };

        let request = FetchRequest::new(
            target,
            options
                .timeout_ms
                .map(|ms| Duration::from_millis(ms.get()))
                .unwrap_or(self.timeout),
            options.max_bytes.unwrap_or(self.max_bytes),
        );

        debug!(fetcher = self.fetcher.name(), url = %request.url, "Using fetcher");
        let mut outcome = match self.fetcher.fetch(&request).await {
            Ok(outcome) => outcome,
            Err(err) => {
                debug!(url, error = %err, "Fetch failed");
                return OpenGraphResult::failed(url, err.code());
            }
        };

        if !outcome.is_success() {
            debug!(url, status = outcome.status_code, "Non-success status");
            return OpenGraphResult::failed(url, ErrorCode::BadStatus);
        }

        let metadata = match outcome.content_type.as_deref() {
            Some(ct) if is_binary_content_type(ct) => {
                outcome.body.close();
                binary_metadata(ct, &outcome.final_url)
            }
            _ => extract(&mut outcome.body, &outcome.final_url).await,
        };

        if outcome.truncated() {
            debug!(
                url = %outcome.final_url,
                bytes_read = outcome.body.bytes_read(),
                "Extracted from truncated body"
            );
        }

        OpenGraphResult::from_metadata(outcome.final_url.as_str(), metadata)
    }
}

/// Parse and validate the caller's URL: absolute, http/https, with a host
fn parse_target(url: &str) -> Option<Url> {
    let parsed = Url::parse(url.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return None;
    }
    Some(parsed)
}

/// Check if content type indicates binary content
fn is_binary_content_type(content_type: &str) -> bool {
    let ct_lower = content_type.trim().to_lowercase();
    BINARY_PREFIXES
        .iter()
        .any(|prefix| ct_lower.starts_with(prefix))
}

/// A direct link to an image previews as that image
fn binary_metadata(content_type: &str, final_url: &Url) -> PartialMetadata {
    let is_image = content_type.trim().to_lowercase().starts_with("image/");
    PartialMetadata {
        image_url: is_image.then(|| final_url.to_string()),
        ..Default::default()
    }
}
