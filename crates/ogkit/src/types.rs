//! Core types for ogkit

use crate::error::{ConfigError, ErrorCode};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::num::{NonZeroU64, NonZeroUsize};
use std::time::Duration;
use url::Url;

/// A single bounded fetch
///
/// Built once per call by the orchestrator. `timeout` and `max_bytes` are
/// always positive.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Absolute http/https URL
    pub url: Url,
    /// End-to-end deadline, measured from the start of the fetch
    pub timeout: Duration,
    /// Ceiling on body bytes read
    pub max_bytes: usize,
}

impl FetchRequest {
    /// Create a new request
    pub fn new(url: Url, timeout: Duration, max_bytes: NonZeroUsize) -> Self {
        Self {
            url,
            timeout,
            max_bytes: max_bytes.get(),
        }
    }
}

/// Per-call overrides for the previewer defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FetchOptions {
    /// Deadline in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<NonZeroU64>,

    /// Body byte ceiling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bytes: Option<NonZeroUsize>,
}

impl FetchOptions {
    /// Create options with both values set, rejecting zeros
    pub fn new(timeout_ms: u64, max_bytes: usize) -> Result<Self, ConfigError> {
        Ok(Self {
            timeout_ms: Some(NonZeroU64::new(timeout_ms).ok_or(ConfigError::ZeroTimeout)?),
            max_bytes: Some(NonZeroUsize::new(max_bytes).ok_or(ConfigError::ZeroMaxBytes)?),
        })
    }

    /// Override the deadline
    pub fn timeout_ms(mut self, timeout_ms: NonZeroU64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Override the byte ceiling
    pub fn max_bytes(mut self, max_bytes: NonZeroUsize) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }
}

/// Metadata found by the extractor
///
/// Every field is optional: absence means "not found in the scanned prefix".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Absolute http/https URL
    pub image_url: Option<String>,
    pub site_name: Option<String>,
    pub og_type: Option<String>,
    /// Absolute http/https URL from `og:url` or `<link rel="canonical">`
    pub canonical_url: Option<String>,
}

impl PartialMetadata {
    /// True when nothing was found
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Link-preview result returned to callers
///
/// Always produced. `error` is set only when no usable response was obtained;
/// fields that were simply not found are omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenGraphResult {
    /// Final URL after redirects, or the input when the fetch failed
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,

    /// `og:type`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub og_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,

    /// When the result was produced
    pub fetched_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCode>,
}

impl OpenGraphResult {
    /// A result carrying only an error code
    pub fn failed(url: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            error: Some(code),
            ..Self::from_metadata(url, PartialMetadata::default())
        }
    }

    /// A successful result built from extracted metadata
    pub fn from_metadata(url: impl Into<String>, metadata: PartialMetadata) -> Self {
        Self {
            url: url.into(),
            title: metadata.title,
            description: metadata.description,
            image_url: metadata.image_url,
            site_name: metadata.site_name,
            og_type: metadata.og_type,
            canonical_url: metadata.canonical_url,
            fetched_at: Utc::now(),
            error: None,
        }
    }

    /// True when the fetch failed
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
