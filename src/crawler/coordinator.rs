//! Crawler coordinator - top-level crawl lifecycle
//!
//! This module owns a crawl run from start to finish:
//! - Validating configuration and normalizing seeds before anything runs
//! - Seeding the frontier
//! - Starting the fetcher pool
//! - Waiting for completion or cancellation
//! - Tearing the pool down and producing the final report

use crate::config::{validate, Config};
use crate::crawler::fetcher::{Fetcher, HttpFetcher};
use crate::crawler::frontier::Frontier;
use crate::crawler::parser::{HtmlLinkExtractor, LinkExtractor};
use crate::crawler::pool::{Capabilities, FetcherPool, PoolSettings};
use crate::crawler::sink::{LogSink, ResultSink};
use crate::crawler::task::UrlTask;
use crate::crawler::tracker::CompletionTracker;
use crate::output::CrawlReport;
use crate::state::CrawlState;
use crate::url::DomainPolicy;
use crate::SumiError;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    seeds: Vec<UrlTask>,
    capabilities: Capabilities,
    cancel: CancellationToken,
    state: CrawlState,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// All setup errors surface here, before the run starts: the configuration
    /// is validated and every seed is normalized.
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `fetcher` - Fetch capability
    /// * `extractor` - Link extraction capability
    /// * `sink` - Result sink capability
    pub fn new(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn LinkExtractor>,
        sink: Arc<dyn ResultSink>,
    ) -> Result<Self, SumiError> {
        validate(&config)?;

        let seeds = config
            .scope
            .seeds
            .iter()
            .map(|seed| UrlTask::parse(seed, 0))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            config: Arc::new(config),
            seeds,
            capabilities: Capabilities {
                fetcher,
                extractor,
                sink,
            },
            cancel: CancellationToken::new(),
            state: CrawlState::Idle,
        })
    }

    /// Creates a coordinator wired to the HTTP fetcher, HTML link extractor and log sink
    pub fn with_http(config: Config) -> Result<Self, SumiError> {
        let fetcher = HttpFetcher::from_config(
            &config.user_agent,
            config.crawler.fetch_timeout(),
            DomainPolicy::from_scope(&config.scope),
        )?;
        Self::new(
            config,
            Arc::new(fetcher),
            Arc::new(HtmlLinkExtractor),
            Arc::new(LogSink),
        )
    }

    /// Token that cancels this crawl when fired
    ///
    /// Cancellation is cooperative: workers finish their current fetch and
    /// stop dequeuing.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Replaces the cancellation token, e.g. to share one with a signal handler
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> CrawlState {
        self.state
    }

    fn transition(&mut self, next: CrawlState) -> Result<(), SumiError> {
        if !self.state.can_transition_to(next) {
            return Err(SumiError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        tracing::debug!("Crawl state {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Runs the crawl to completion or cancellation
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The crawl reached `Done` or `Cancelled`
    /// * `Err(SumiError)` - Every worker died before the crawl could finish
    pub async fn run(mut self) -> Result<CrawlReport, SumiError> {
        let started_at = Utc::now();
        let start = Instant::now();

        let tracker = Arc::new(CompletionTracker::new());
        let frontier = Arc::new(Frontier::new(
            self.config.crawler.per_domain_parallelism,
            Arc::clone(&tracker),
        ));

        // Seeding
        self.transition(CrawlState::Seeding)?;
        let mut seeded = 0;
        for seed in std::mem::take(&mut self.seeds) {
            let url = seed.url.clone();
            if frontier.enqueue(seed) {
                seeded += 1;
            } else {
                tracing::debug!("Duplicate seed {} ignored", url);
            }
        }
        tracing::info!("Seeded frontier with {} URLs", seeded);

        // Running
        self.transition(CrawlState::Running)?;
        let settings = PoolSettings {
            workers: self.config.crawler.workers,
            max_depth: self.config.crawler.max_depth,
            fetch_timeout: self.config.crawler.fetch_timeout(),
            policy: DomainPolicy::from_scope(&self.config.scope),
        };
        let mut pool = FetcherPool::spawn(
            settings,
            Arc::clone(&frontier),
            self.capabilities.clone(),
            self.cancel.clone(),
        );

        let finished = loop {
            tokio::select! {
                _ = tracker.wait_for_completion() => break CrawlState::Draining,
                _ = self.cancel.cancelled() => break CrawlState::Cancelled,
                more = pool.join_next() => {
                    if more {
                        continue;
                    }
                    // every worker is gone; work out why
                    if tracker.is_complete() {
                        break CrawlState::Draining;
                    }
                    if self.cancel.is_cancelled() {
                        break CrawlState::Cancelled;
                    }
                    return Err(SumiError::Worker(format!(
                        "all workers exited with {} tasks still pending",
                        tracker.pending()
                    )));
                }
            }
        };

        match finished {
            CrawlState::Draining => {
                self.transition(CrawlState::Draining)?;
                tracing::info!("No pending work left, draining workers");
            }
            _ => {
                self.transition(CrawlState::Cancelled)?;
                tracing::info!(
                    "Crawl cancelled, waiting for {} workers to finish in-flight fetches",
                    pool.running()
                );
            }
        }

        let exit = pool.join_all().await;
        if exit.panicked > 0 {
            tracing::error!("{} workers panicked during the crawl", exit.panicked);
        }

        let abandoned = frontier.drain_pending();
        if self.state == CrawlState::Draining {
            self.transition(CrawlState::Done)?;
        }

        let report = CrawlReport::new(
            self.state,
            frontier.visited_count(),
            abandoned,
            tracker.snapshot(),
            frontier.requests_by_domain(),
            started_at,
            start.elapsed(),
        );

        tracing::info!(
            "Crawl {}: {} visited, {} succeeded, {} failed in {:?}",
            report.state,
            report.visited,
            report.successes,
            report.failures,
            report.elapsed
        );

        Ok(report)
    }
}
