//! URL handling module for Sumi-Crawl
//!
//! This module provides URL normalization, domain extraction, wildcard matching,
//! and the allowed/blocked domain policy applied before every fetch.

mod normalize;

use crate::config::ScopeConfig;
use url::Url;

pub use normalize::normalize_url;

/// Extracts the lowercase host of a URL
///
/// The port is not part of the domain: `example.com:8080` and `example.com`
/// share one domain limiter.
///
/// ```
/// use url::Url;
/// use sumi_crawl::url::extract_domain;
///
/// let url = Url::parse("https://Blog.Example.COM:8443/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("blog.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Checks if a domain matches a wildcard pattern
///
/// `"example.com"` matches only itself; `"*.example.com"` matches the bare
/// domain and any subdomain at any depth.
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            candidate == base
                || candidate
                    .strip_suffix(base)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        }
        None => candidate == pattern,
    }
}

/// Decides which domains may be fetched
///
/// Blocked patterns win over allowed ones. An empty allowed list admits
/// every domain that isn't blocked.
#[derive(Debug, Clone, Default)]
pub struct DomainPolicy {
    allowed: Vec<String>,
    blocked: Vec<String>,
}

impl DomainPolicy {
    /// Creates a policy from explicit pattern lists
    pub fn new(allowed: Vec<String>, blocked: Vec<String>) -> Self {
        Self {
            allowed: allowed.into_iter().map(|p| p.to_lowercase()).collect(),
            blocked: blocked.into_iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    /// Builds the policy from the `[scope]` configuration section
    pub fn from_scope(scope: &ScopeConfig) -> Self {
        Self::new(scope.allowed_domains.clone(), scope.blocked_domains.clone())
    }

    /// Returns true if the (lowercase) domain may be fetched
    pub fn is_allowed(&self, domain: &str) -> bool {
        if self.blocked.iter().any(|p| matches_wildcard(p, domain)) {
            return false;
        }

        self.allowed.is_empty() || self.allowed.iter().any(|p| matches_wildcard(p, domain))
    }
}
