//! Fetch capability and its HTTP implementation
//!
//! The crawler core only sees the [`Fetcher`] trait and interprets its result
//! as success or failure. [`HttpFetcher`] is the reqwest-backed implementation
//! used by the binary:
//! - Builds a client with the configured user agent
//! - Follows redirects only while they stay inside the crawl scope (max 10 hops)
//! - Maps non-2xx statuses and transport errors onto failure kinds

use crate::config::UserAgentConfig;
use crate::crawler::task::{FetchError, Page};
use crate::url::{extract_domain, DomainPolicy};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Fetches the content behind a URL
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches one URL
    ///
    /// Implementations may apply their own timeout or retry policy; the pool
    /// additionally bounds every call with the configured fetch timeout.
    async fn fetch(&self, url: &Url) -> Result<Page, FetchError>;
}

/// Maximum redirect hops followed for one request
const MAX_REDIRECTS: usize = 10;

/// Builds an HTTP client with proper configuration
///
/// Redirects are followed only to domains `policy` allows. A redirect that
/// leaves the crawl scope is not followed; the 3xx response is returned as is.
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Whole-request timeout
/// * `policy` - Domain filter applied to every redirect target
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use sumi_crawl::config::UserAgentConfig;
/// use sumi_crawl::crawler::build_http_client;
/// use sumi_crawl::DomainPolicy;
///
/// let config = UserAgentConfig {
///     crawler_name: "SumiCrawl".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client =
///     build_http_client(&config, Duration::from_secs(10), DomainPolicy::default()).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
    policy: DomainPolicy,
) -> Result<Client, reqwest::Error> {
    let redirects = Policy::custom(move |attempt| {
        let hops = attempt.previous().len();
        let in_scope = extract_domain(attempt.url()).is_some_and(|d| policy.is_allowed(&d));

        if hops >= MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if in_scope {
            attempt.follow()
        } else {
            tracing::debug!("Not following redirect to {}", attempt.url());
            attempt.stop()
        }
    });

    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(redirects)
        .gzip(true)
        .brotli(true)
        .build()
}

/// reqwest-backed fetch capability
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    policy: DomainPolicy,
}

impl HttpFetcher {
    /// Wraps a client; `policy` should be the one the client's redirect policy was built with
    pub fn new(client: Client, policy: DomainPolicy) -> Self {
        Self { client, policy }
    }

    /// Builds the fetcher from user agent settings, a request timeout and the domain filter
    pub fn from_config(
        config: &UserAgentConfig,
        timeout: Duration,
        policy: DomainPolicy,
    ) -> Result<Self, reqwest::Error> {
        let client = build_http_client(config, timeout, policy.clone())?;
        Ok(Self::new(client, policy))
    }

    /// Classifies a redirect response the client did not follow
    fn unfollowed_redirect(&self, response: &reqwest::Response) -> FetchError {
        let target = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|location| response.url().join(location).ok());

        match target {
            Some(target)
                if !extract_domain(&target).is_some_and(|d| self.policy.is_allowed(&d)) =>
            {
                FetchError::disallowed(format!(
                    "redirect to {} is outside the crawl scope",
                    target
                ))
            }
            _ => FetchError::network(format!("HTTP {}", response.status().as_u16())),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    /// # Error Classification
    ///
    /// | Condition | Kind |
    /// |-----------|------|
    /// | Request timeout | Timeout |
    /// | Connection refused / DNS / TLS | Network |
    /// | Redirect out of scope | DisallowedDomain |
    /// | Other non-2xx status | Network |
    /// | Body read failure | Network |
    async fn fetch(&self, url: &Url) -> Result<Page, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        let final_url = response.url().clone();

        if status.is_redirection() {
            return Err(self.unfollowed_redirect(&response));
        }

        if !status.is_success() {
            return Err(FetchError::network(format!("HTTP {}", status.as_u16())));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.text().await.map_err(classify_error)?;

        Ok(Page {
            final_url,
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

/// Maps a reqwest error onto a failure kind
fn classify_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::timeout("Request timeout")
    } else if error.is_connect() {
        FetchError::network(format!("Connection failed: {}", error))
    } else {
        FetchError::network(error.to_string())
    }
}
