//! Shared fixtures: test configuration and scripted capabilities

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use sumi_crawl::config::{Config, CrawlerConfig, ScopeConfig, UserAgentConfig};
use sumi_crawl::crawler::{ExtractError, FetchError, Fetcher, LinkExtractor, Page};
use sumi_crawl::extract_domain;
use url::Url;

/// Creates a test configuration for the given seeds
pub fn create_test_config(seeds: Vec<String>, max_depth: u32) -> Config {
    Config {
        crawler: CrawlerConfig {
            workers: 4,
            per_domain_parallelism: 2,
            max_depth,
            fetch_timeout_ms: 2000,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        scope: ScopeConfig {
            seeds,
            allowed_domains: vec![],
            blocked_domains: vec![],
        },
    }
}

/// Serves canned HTML keyed by normalized URL after an optional delay
///
/// Unknown URLs fail with a network error. Every call is recorded, along with
/// the highest number of concurrent calls seen per domain.
pub struct ScriptedFetcher {
    pages: HashMap<String, String>,
    delay: Duration,
    calls: Mutex<Vec<(String, Instant)>>,
    in_flight: Mutex<HashMap<String, usize>>,
    peak_in_flight: Mutex<HashMap<String, usize>>,
    total_in_flight: AtomicUsize,
    peak_total: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(pages: Vec<(String, String)>) -> Self {
        Self {
            pages: pages.into_iter().collect(),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            in_flight: Mutex::new(HashMap::new()),
            peak_in_flight: Mutex::new(HashMap::new()),
            total_in_flight: AtomicUsize::new(0),
            peak_total: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// URLs fetched, in call order
    pub fn fetched(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    /// When each fetch started
    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }

    /// Highest concurrent fetch count observed for a domain
    pub fn peak_for(&self, domain: &str) -> usize {
        self.peak_in_flight
            .lock()
            .unwrap()
            .get(domain)
            .copied()
            .unwrap_or(0)
    }

    /// Highest concurrent fetch count observed across all domains
    pub fn peak_total(&self) -> usize {
        self.peak_total.load(Ordering::SeqCst)
    }

    fn enter(&self, domain: &str) {
        let mut in_flight = self.in_flight.lock().unwrap();
        let count = in_flight.entry(domain.to_string()).or_insert(0);
        *count += 1;

        let mut peaks = self.peak_in_flight.lock().unwrap();
        let peak = peaks.entry(domain.to_string()).or_insert(0);
        *peak = (*peak).max(*count);

        let total = self.total_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_total.fetch_max(total, Ordering::SeqCst);
    }

    fn exit(&self, domain: &str) {
        if let Some(count) = self.in_flight.lock().unwrap().get_mut(domain) {
            *count -= 1;
        }
        self.total_in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Leaves the in-flight count even when the fetch future is dropped by a timeout
struct InFlight<'a> {
    fetcher: &'a ScriptedFetcher,
    domain: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.fetcher.exit(&self.domain);
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &Url) -> Result<Page, FetchError> {
        let domain = extract_domain(url).unwrap_or_default();
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), Instant::now()));
        self.enter(&domain);
        let _guard = InFlight {
            fetcher: self,
            domain,
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.pages.get(url.as_str()) {
            Some(body) => Ok(Page {
                final_url: url.clone(),
                status: 200,
                content_type: Some("text/html; charset=utf-8".to_string()),
                body: body.clone(),
            }),
            None => Err(FetchError::network("connection refused")),
        }
    }
}

/// Extractor that fails on every page
pub struct FailingExtractor;

impl LinkExtractor for FailingExtractor {
    fn extract_links(&self, _page: &Page) -> Result<Vec<String>, ExtractError> {
        Err(ExtractError("malformed document".to_string()))
    }
}

/// HTML body linking to each of `targets`
pub fn links_to(targets: &[String]) -> String {
    let anchors: String = targets
        .iter()
        .map(|t| format!(r#"<a href="{}">link</a>"#, t))
        .collect();
    format!("<html><body>{}</body></html>", anchors)
}
