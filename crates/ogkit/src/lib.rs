//! ogkit - bounded Open Graph fetching
//!
//! Fetches an untrusted URL under a single deadline and a byte ceiling,
//! scans the head of the document for link-preview metadata (Open Graph,
//! Twitter cards, plain HTML fallbacks) and always returns a value.
//!
//! ```no_run
//! # async fn run() {
//! let result = ogkit::fetch_open_graph("https://example.com").await;
//! match result.error {
//!     Some(code) => eprintln!("no preview: {}", code),
//!     None => println!("{:?}", result.title),
//! }
//! # }
//! ```
//!
//! ## Components
//!
//! - [`HttpFetcher`] - deadline, redirect cap, byte ceiling; yields a
//!   forward-only [`BodyStream`]
//! - [`MetadataScanner`] / [`extract`] - streaming, tolerant head scanner
//! - [`Previewer`] - validation, defaults, error mapping

pub mod client;
mod error;
pub mod extract;
pub mod fetchers;
mod types;

use std::time::Duration;

pub use client::{fetch_open_graph, fetch_open_graph_with_options, Previewer, PreviewerBuilder};
pub use error::{ConfigError, ErrorCode, FetchError};
pub use extract::{extract, extract_from_bytes, MetadataScanner, Scan};
pub use fetchers::{BodyStream, FetchOutcome, Fetcher, HttpFetcher};
pub use types::{FetchOptions, FetchRequest, OpenGraphResult, PartialMetadata};

/// Default User-Agent string
pub const DEFAULT_USER_AGENT: &str = concat!("ogkit/", env!("CARGO_PKG_VERSION"));

/// Deadline used when a call does not set one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Body byte ceiling used when a call does not set one (1 MiB)
pub const DEFAULT_MAX_BYTES: usize = 1024 * 1024;

/// Redirects followed before failing with `too-many-redirects`
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// JSON schema of [`OpenGraphResult`]
pub fn output_schema() -> serde_json::Value {
    let schema = schemars::schema_for!(OpenGraphResult);
    serde_json::to_value(schema).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_schema() {
        let schema = output_schema();
        let props = &schema["properties"];

        assert!(props["url"].is_object());
        assert!(props["imageUrl"].is_object());
        assert!(props["type"].is_object());
        assert!(props["fetchedAt"].is_object());
        assert!(props["error"].is_object());

        let required = schema["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v == "url"));
        assert!(!required.iter().any(|v| v == "title"));
    }

    #[test]
    fn test_default_user_agent() {
        assert!(DEFAULT_USER_AGENT.starts_with("ogkit/"));
        assert!(reqwest::header::HeaderValue::from_str(DEFAULT_USER_AGENT).is_ok());
    }
}
