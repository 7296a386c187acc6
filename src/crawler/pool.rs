//! Fetcher pool: a fixed set of workers pulling tasks from the shared frontier
//!
//! Each worker iteration:
//! 1. Waits for a dispatchable task (suspends, never busy-polls)
//! 2. Rejects tasks outside the domain policy without fetching
//! 3. Fetches under the configured timeout, rejecting pages served from an
//!    out-of-scope domain after a redirect
//! 4. Extracts and normalizes links from the page
//! 5. Enqueues links one hop deeper, if within max depth
//! 6. Hands the page to the result sink
//! 7. Resolves the task with its crawl result and releases the domain slot
//!
//! Per-task failures become failure results; a worker never stops because a
//! task failed.

use crate::crawler::fetcher::Fetcher;
use crate::crawler::frontier::{Dequeue, Frontier};
use crate::crawler::parser::LinkExtractor;
use crate::crawler::sink::ResultSink;
use crate::crawler::task::{CrawlResult, ErrorKind, UrlTask};
use crate::url::{extract_domain, normalize_url, DomainPolicy};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Log a progress line every this many resolved tasks
const PROGRESS_INTERVAL: u64 = 10;

/// Immutable settings shared by every worker
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub workers: usize,
    pub max_depth: u32,
    pub fetch_timeout: Duration,
    pub policy: DomainPolicy,
}

/// The external capabilities workers call into
#[derive(Clone)]
pub struct Capabilities {
    pub fetcher: Arc<dyn Fetcher>,
    pub extractor: Arc<dyn LinkExtractor>,
    pub sink: Arc<dyn ResultSink>,
}

/// How the pool's workers ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolExit {
    /// Tasks processed across all workers
    pub processed: u64,

    /// Workers that panicked instead of exiting normally
    pub panicked: usize,
}

struct Worker {
    id: usize,
    frontier: Arc<Frontier>,
    capabilities: Capabilities,
    settings: Arc<PoolSettings>,
    cancel: CancellationToken,
    started: Instant,
}

impl Worker {
    async fn run(self) -> u64 {
        tracing::debug!("Worker {} started", self.id);
        let mut processed = 0;

        while let Dequeue::Task(scheduled) = self.frontier.next(&self.cancel).await {
            let task = scheduled.task().clone();
            tracing::debug!("Worker {} processing {} (depth {})", self.id, task.url, task.depth);

            let result = self.process(&task).await;
            self.follow_up(&result);

            let resolved = scheduled.resolve(result);
            processed += 1;

            if resolved % PROGRESS_INTERVAL == 0 {
                let elapsed = self.started.elapsed().as_secs_f64();
                let rate = if elapsed > 0.0 {
                    resolved as f64 / elapsed
                } else {
                    0.0
                };
                tracing::info!(
                    "Progress: {} pages resolved, {} in frontier, {:.2} pages/sec",
                    resolved,
                    self.frontier.len(),
                    rate
                );
            }
        }

        tracing::debug!("Worker {} exiting after {} tasks", self.id, processed);
        processed
    }

    /// Produces the crawl result for one task
    async fn process(&self, task: &UrlTask) -> CrawlResult {
        if !self.settings.policy.is_allowed(&task.domain) {
            return CrawlResult::failure(
                task.clone(),
                ErrorKind::DisallowedDomain,
                format!("domain {} is outside the crawl scope", task.domain),
            );
        }

        let fetched = tokio::time::timeout(
            self.settings.fetch_timeout,
            self.capabilities.fetcher.fetch(&task.url),
        )
        .await;

        let page = match fetched {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => return CrawlResult::failure(task.clone(), e.kind, e.message),
            Err(_) => {
                return CrawlResult::failure(
                    task.clone(),
                    ErrorKind::Timeout,
                    format!("no response within {:?}", self.settings.fetch_timeout),
                )
            }
        };

        let served_from = extract_domain(&page.final_url).unwrap_or_default();
        if served_from != task.domain && !self.settings.policy.is_allowed(&served_from) {
            return CrawlResult::failure(
                task.clone(),
                ErrorKind::DisallowedDomain,
                format!("redirected to {} outside the crawl scope", page.final_url),
            );
        }

        let raw_links = match self.capabilities.extractor.extract_links(&page) {
            Ok(links) => links,
            Err(e) => return CrawlResult::failure(task.clone(), ErrorKind::Parse, e.to_string()),
        };

        let links = raw_links
            .iter()
            .filter_map(|raw| match normalize_url(raw) {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::trace!("Dropping link {} from {}: {}", raw, task.url, e);
                    None
                }
            })
            .collect();

        CrawlResult::Success {
            task: task.clone(),
            page,
            links,
        }
    }

    /// Enqueues discovered links and stores the page of a successful result
    ///
    /// Runs before the result is resolved, so new work is counted as pending
    /// before its parent stops being pending. Stops enqueuing as soon as
    /// cancellation is raised.
    fn follow_up(&self, result: &CrawlResult) {
        let CrawlResult::Success { task, page, links } = result else {
            return;
        };

        let child_depth = task.depth + 1;
        if child_depth <= self.settings.max_depth {
            let mut queued = 0;
            for link in links {
                if self.cancel.is_cancelled() {
                    tracing::debug!("Cancelled while enqueuing links from {}", task.url);
                    break;
                }
                match UrlTask::new(link.clone(), child_depth) {
                    Ok(child) => {
                        if self.frontier.enqueue(child) {
                            queued += 1;
                        }
                    }
                    Err(e) => tracing::trace!("Dropping link {}: {}", link, e),
                }
            }
            tracing::debug!(
                "{}: {} links, {} new at depth {}",
                task.url,
                links.len(),
                queued,
                child_depth
            );
        }

        self.capabilities.sink.store(&task.url, page);
    }
}

/// A running set of crawl workers
pub struct FetcherPool {
    workers: JoinSet<u64>,
    exit: PoolExit,
}

impl FetcherPool {
    /// Spawns `settings.workers` workers on the current tokio runtime
    pub fn spawn(
        settings: PoolSettings,
        frontier: Arc<Frontier>,
        capabilities: Capabilities,
        cancel: CancellationToken,
    ) -> Self {
        let settings = Arc::new(settings);
        let started = Instant::now();
        let mut workers = JoinSet::new();

        for id in 0..settings.workers {
            let worker = Worker {
                id,
                frontier: Arc::clone(&frontier),
                capabilities: capabilities.clone(),
                settings: Arc::clone(&settings),
                cancel: cancel.clone(),
                started,
            };
            workers.spawn(worker.run());
        }

        tracing::info!("Started {} workers", settings.workers);

        Self {
            workers,
            exit: PoolExit::default(),
        }
    }

    /// Waits for the next worker to exit
    ///
    /// Returns `false` once every worker has exited.
    pub async fn join_next(&mut self) -> bool {
        match self.workers.join_next().await {
            Some(Ok(processed)) => {
                self.exit.processed += processed;
                true
            }
            Some(Err(e)) => {
                tracing::error!("Worker task failed: {}", e);
                self.exit.panicked += 1;
                true
            }
            None => false,
        }
    }

    /// Waits for every remaining worker to exit
    pub async fn join_all(mut self) -> PoolExit {
        while self.join_next().await {}
        self.exit
    }

    /// Workers still running
    pub fn running(&self) -> usize {
        self.workers.len()
    }
}
