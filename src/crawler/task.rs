//! Units of work flowing through the crawler and the records they resolve to

use crate::url::{extract_domain, normalize_url};
use crate::{UrlError, UrlResult};
use std::fmt;
use thiserror::Error;
use url::Url;

/// A normalized URL queued for fetching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTask {
    /// The normalized URL to fetch
    pub url: Url,

    /// Lowercase host of `url`, the key for the domain limiter
    pub domain: String,

    /// Number of link hops from the seed that discovered this URL
    pub depth: u32,
}

impl UrlTask {
    /// Creates a task from an already-normalized URL
    pub fn new(url: Url, depth: u32) -> UrlResult<Self> {
        let domain = extract_domain(&url).ok_or(UrlError::MissingDomain)?;
        Ok(Self { url, domain, depth })
    }

    /// Normalizes a raw URL string and wraps it in a task
    pub fn parse(raw: &str, depth: u32) -> UrlResult<Self> {
        Self::new(normalize_url(raw)?, depth)
    }

    /// The dedup key for this task
    pub fn key(&self) -> &str {
        self.url.as_str()
    }
}

/// A fetched page as handed back by a fetch capability
#[derive(Debug, Clone)]
pub struct Page {
    /// URL the content was served from, after redirects
    pub final_url: Url,

    /// HTTP status code
    pub status: u16,

    /// Content-Type header value, if any
    pub content_type: Option<String>,

    /// Response body
    pub body: String,
}

impl Page {
    /// Returns true if the content type is absent or declares HTML
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map_or(true, |ct| ct.to_ascii_lowercase().contains("text/html"))
    }
}

/// Why a task failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    /// Connection, DNS, TLS or HTTP status failure
    Network,

    /// The fetch did not finish within the configured timeout
    Timeout,

    /// The domain is outside the allowed scope; never fetched
    DisallowedDomain,

    /// Link extraction failed on a fetched page
    Parse,

    /// The task was abandoned before it could resolve normally
    Cancelled,
}

impl ErrorKind {
    /// Short name used in logs and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::DisallowedDomain => "disallowed_domain",
            Self::Parse => "parse",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by a fetch capability
#[derive(Debug, Clone, Error)]
#[error("{kind} error: {message}")]
pub struct FetchError {
    pub kind: ErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Network,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Timeout,
            message: message.into(),
        }
    }

    pub fn disallowed(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::DisallowedDomain,
            message: message.into(),
        }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Cancelled,
            message: message.into(),
        }
    }
}

/// Error returned by a link extraction capability
#[derive(Debug, Clone, Error)]
#[error("link extraction failed: {0}")]
pub struct ExtractError(pub String);

/// Outcome of processing one task
///
/// Produced by a worker iteration and consumed by the completion tracker.
#[derive(Debug)]
pub enum CrawlResult {
    /// The page was fetched and its links extracted
    Success {
        task: UrlTask,
        page: Page,
        /// Normalized links found on the page (before dedup)
        links: Vec<Url>,
    },

    /// The task failed; the crawl carries on
    Failure {
        task: UrlTask,
        kind: ErrorKind,
        message: String,
    },
}

impl CrawlResult {
    /// Builds a failure result for a task
    pub fn failure(task: UrlTask, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Failure {
            task,
            kind,
            message: message.into(),
        }
    }

    /// The task this result resolves
    pub fn task(&self) -> &UrlTask {
        match self {
            Self::Success { task, .. } | Self::Failure { task, .. } => task,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The failure kind, if this is a failure
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}
