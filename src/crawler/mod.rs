//! Crawler module: the concurrent crawl engine
//!
//! This module contains the core crawling logic, including:
//! - The frontier (dedup, queue, per-domain limiter)
//! - The fetcher pool of concurrent workers
//! - Completion tracking
//! - Overall crawl coordination
//! - The fetch, link extraction and result sink capabilities

mod coordinator;
mod fetcher;
mod frontier;
mod parser;
mod pool;
mod sink;
mod task;
mod tracker;

pub use coordinator::Coordinator;
pub use fetcher::{build_http_client, Fetcher, HttpFetcher};
pub use frontier::{Dequeue, Frontier, ScheduledTask};
pub use parser::{parse_links, HtmlLinkExtractor, LinkExtractor};
pub use pool::{Capabilities, FetcherPool, PoolExit, PoolSettings};
pub use sink::{LogSink, MemorySink, ResultSink};
pub use task::{CrawlResult, ErrorKind, ExtractError, FetchError, Page, UrlTask};
pub use tracker::{CompletionTracker, TrackerSnapshot};

use crate::config::Config;
use crate::output::CrawlReport;
use crate::SumiError;

/// Runs a complete crawl over HTTP
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Validate the configuration and normalize the seeds
/// 2. Build the HTTP client
/// 3. Fetch pages with a fixed pool of workers
/// 4. Extract and follow links within the configured depth
/// 5. Return the final report
///
/// The returned report's state is `Cancelled` if `cancel` fired first.
pub async fn crawl(
    config: Config,
    cancel: tokio_util::sync::CancellationToken,
) -> Result<CrawlReport, SumiError> {
    Coordinator::with_http(config)?
        .with_cancel_token(cancel)
        .run()
        .await
}
