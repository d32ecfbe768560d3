//! Bounded fetching
//!
//! Design: a [`Fetcher`] turns a [`FetchRequest`] into a [`FetchOutcome`]
//! whose body is a forward-only [`BodyStream`]. [`HttpFetcher`] is the
//! network implementation; the trait is the seam the previewer is built on.

mod body;
mod http;

pub use body::BodyStream;
pub use http::HttpFetcher;

pub(crate) use body::PrimeError;

use crate::error::FetchError;
use crate::types::FetchRequest;
use async_trait::async_trait;
use url::Url;

/// Response metadata plus the bounded body
#[derive(Debug)]
pub struct FetchOutcome {
    /// URL after following redirects
    pub final_url: Url,
    /// Terminal HTTP status code
    pub status_code: u16,
    /// Content-Type header value
    pub content_type: Option<String>,
    /// Body, read at most once
    pub body: BodyStream,
}

impl FetchOutcome {
    /// True if the terminal status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// True if the body was cut short so far
    pub fn truncated(&self) -> bool {
        self.body.is_truncated()
    }
}

/// Trait for bounded document fetchers
///
/// Implementations must honor the request's deadline and byte ceiling, and
/// fail only when no usable bytes were obtained.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Identifier for logging
    fn name(&self) -> &'static str;

    /// Fetch the document
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, FetchError>;
}

/// Check that a URL uses a scheme we are willing to fetch
pub(crate) fn check_scheme(url: &Url) -> Result<(), FetchError> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(FetchError::UnsupportedScheme(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_scheme() {
        assert!(check_scheme(&Url::parse("http://example.com").unwrap()).is_ok());
        assert!(check_scheme(&Url::parse("https://example.com/a?b").unwrap()).is_ok());
        assert!(matches!(
            check_scheme(&Url::parse("ftp://example.com").unwrap()),
            Err(FetchError::UnsupportedScheme(s)) if s == "ftp"
        ));
        assert!(check_scheme(&Url::parse("file:///etc/passwd").unwrap()).is_err());
    }

    #[test]
    fn test_outcome_success_range() {
        let outcome = FetchOutcome {
            final_url: Url::parse("https://example.com").unwrap(),
            status_code: 204,
            content_type: None,
            body: BodyStream::empty(),
        };
        assert!(outcome.is_success());
        assert!(!outcome.truncated());

        let outcome = FetchOutcome {
            status_code: 304,
            ..outcome
        };
        assert!(!outcome.is_success());
    }
}
