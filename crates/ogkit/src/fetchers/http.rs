//! HTTP fetcher
//!
//! Fetches over HTTP/HTTPS with a single deadline covering every redirect
//! hop and the body, manual redirect handling so each hop is re-validated,
//! and a byte-capped streaming body.

use crate::error::FetchError;
use crate::fetchers::{check_scheme, BodyStream, FetchOutcome, Fetcher, PrimeError};
use crate::types::FetchRequest;
use crate::{DEFAULT_MAX_REDIRECTS, DEFAULT_USER_AGENT};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, LOCATION, USER_AGENT};
use reqwest::StatusCode;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

/// Accept header favoring markup
const ACCEPT_HTML: &str = "text/html, application/xhtml+xml;q=0.9, */*;q=0.8";

/// HTTP fetcher
///
/// Holds configuration only; a fresh client is built for every fetch.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    user_agent: String,
    max_redirects: usize,
}

impl HttpFetcher {
    /// Create a fetcher with the default User-Agent and redirect cap
    pub fn new() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }

    /// Set the User-Agent header
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set how many redirects are followed before giving up
    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    fn build_client(&self, request: &FetchRequest) -> Result<reqwest::Client, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT)),
        );
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));

        reqwest::Client::builder()
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(request.timeout)
            .build()
            .map_err(FetchError::ClientBuildError)
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, FetchError> {
        let deadline = Instant::now() + request.timeout;
        check_scheme(&request.url)?;

        let client = self.build_client(request)?;
        let mut current = request.url.clone();
        let mut redirects = 0;

        let response = loop {
            let send = client.get(current.clone()).send();
            let response = match tokio::time::timeout_at(deadline, send).await {
                Err(_) => return Err(FetchError::Timeout),
                Ok(Err(err)) => return Err(FetchError::from_reqwest(err)),
                Ok(Ok(response)) => response,
            };

            let Some(target) = redirect_target(&response, &current) else {
                break response;
            };
            if redirects >= self.max_redirects {
                return Err(FetchError::TooManyRedirects(self.max_redirects));
            }
            check_scheme(&target)?;

            redirects += 1;
            debug!(
                from = %current,
                to = %target,
                status = response.status().as_u16(),
                hop = redirects,
                "Following redirect"
            );
            current = target;
        };

        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        if !response.status().is_success() {
            // Status is all the caller needs; the body is dropped unread
            return Ok(FetchOutcome {
                final_url: current,
                status_code,
                content_type,
                body: BodyStream::empty(),
            });
        }

        let mut body = BodyStream::new(response.bytes_stream().boxed(), deadline, request.max_bytes);
        match body.prime().await {
            Ok(()) => {}
            Err(PrimeError::TimedOut) => return Err(FetchError::Timeout),
            Err(PrimeError::Failed(err)) => return Err(FetchError::from_reqwest(err)),
        }

        Ok(FetchOutcome {
            final_url: current,
            status_code,
            content_type,
            body,
        })
    }
}

/// Resolve the redirect target of a response, if it is a followable redirect
///
/// A 3xx without a parseable `Location` is treated as a terminal response.
fn redirect_target(response: &reqwest::Response, current: &Url) -> Option<Url> {
    if !matches!(
        response.status(),
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    ) {
        return None;
    }

    let location = response.headers().get(LOCATION)?.to_str().ok()?.trim();
    if location.is_empty() {
        return None;
    }
    current.join(location).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_fetcher_defaults() {
        let fetcher = HttpFetcher::new();
        assert_eq!(fetcher.name(), "http");
        assert_eq!(fetcher.max_redirects, DEFAULT_MAX_REDIRECTS);
        assert_eq!(fetcher.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_http_fetcher_builder() {
        let fetcher = HttpFetcher::new()
            .with_user_agent("PreviewBot/2.0")
            .with_max_redirects(2);
        assert_eq!(fetcher.user_agent, "PreviewBot/2.0");
        assert_eq!(fetcher.max_redirects, 2);
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_http_scheme_without_io() {
        let request = FetchRequest::new(
            Url::parse("gopher://example.com/").unwrap(),
            std::time::Duration::from_secs(1),
            std::num::NonZeroUsize::new(1024).unwrap(),
        );
        let result = HttpFetcher::new().fetch(&request).await;
        assert!(matches!(result, Err(FetchError::UnsupportedScheme(s)) if s == "gopher"));
    }
}
