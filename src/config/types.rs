use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Sumi-Crawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub scope: ScopeConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of concurrent workers in the fetcher pool
    pub workers: usize,

    /// Maximum number of in-flight requests to a single domain
    #[serde(rename = "per-domain-parallelism")]
    pub per_domain_parallelism: usize,

    /// Maximum depth to crawl from seed URLs (seeds are depth 0)
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Timeout applied to every individual fetch (milliseconds)
    #[serde(rename = "fetch-timeout-ms")]
    pub fetch_timeout_ms: u64,
}

impl CrawlerConfig {
    /// Returns the per-fetch timeout as a Duration
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    ///
    /// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// What gets crawled: seeds and the domain filter
#[derive(Debug, Clone, Deserialize)]
pub struct ScopeConfig {
    /// URLs the crawl starts from
    pub seeds: Vec<String>,

    /// Domain patterns that may be fetched (e.g., "example.com" or "*.example.com").
    /// Empty means every domain is allowed.
    #[serde(rename = "allowed-domains", default)]
    pub allowed_domains: Vec<String>,

    /// Domain patterns that are never fetched; takes priority over the allowed list
    #[serde(rename = "blocked-domains", default)]
    pub blocked_domains: Vec<String>,
}
