//! Completion tracking
//!
//! The tracker counts tasks that are enqueued but unresolved (`pending`) and
//! tasks a worker currently holds (`active`). The crawl is complete once both
//! reach zero. Both counters live behind one lock so the completion check sees
//! a consistent pair.
//!
//! Completion is stable: only a worker holding an active task can enqueue new
//! work, and workers enqueue a page's links before resolving the page itself,
//! so `pending` never touches zero while discovered work is still outstanding.

use crate::crawler::task::{CrawlResult, ErrorKind};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

#[derive(Debug, Default)]
struct TrackerInner {
    pending: usize,
    active: usize,
    resolved: u64,
    successes: u64,
    failures: BTreeMap<ErrorKind, u64>,
    links_discovered: u64,
    bytes_fetched: u64,
}

/// Aggregated results at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerSnapshot {
    pub pending: usize,
    pub active: usize,
    pub resolved: u64,
    pub successes: u64,
    pub failures_by_kind: BTreeMap<ErrorKind, u64>,
    pub links_discovered: u64,
    pub bytes_fetched: u64,
}

impl TrackerSnapshot {
    /// Total failures across all kinds
    pub fn failures(&self) -> u64 {
        self.failures_by_kind.values().sum()
    }
}

/// Detects whole-crawl completion and aggregates crawl results
#[derive(Debug)]
pub struct CompletionTracker {
    inner: Mutex<TrackerInner>,
    done_tx: watch::Sender<bool>,
}

impl CompletionTracker {
    pub fn new() -> Self {
        let (done_tx, _) = watch::channel(false);
        Self {
            inner: Mutex::new(TrackerInner::default()),
            done_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A task entered the frontier
    pub fn task_queued(&self) {
        self.lock().pending += 1;
    }

    /// A worker took a task out of the frontier
    pub fn task_started(&self) {
        self.lock().active += 1;
    }

    /// Consumes the result of one task
    ///
    /// Returns the number of results resolved so far.
    pub fn record(&self, result: CrawlResult) -> u64 {
        let mut inner = self.lock();
        debug_assert!(inner.pending > 0, "resolved a task that was never queued");
        inner.pending = inner.pending.saturating_sub(1);
        inner.resolved += 1;

        match result {
            CrawlResult::Success { task, page, links } => {
                tracing::debug!(
                    "Fetched {} (status {}, {} bytes, {} links)",
                    task.url,
                    page.status,
                    page.body.len(),
                    links.len()
                );
                inner.successes += 1;
                inner.bytes_fetched += page.body.len() as u64;
                inner.links_discovered += links.len() as u64;
            }
            CrawlResult::Failure {
                task,
                kind,
                message,
            } => {
                tracing::warn!("Failed {} [{}]: {}", task.url, kind, message);
                *inner.failures.entry(kind).or_insert(0) += 1;
            }
        }

        let resolved = inner.resolved;
        self.check_completion(&inner);
        resolved
    }

    /// A worker released its task (after recording its result)
    pub fn task_finished(&self) {
        let mut inner = self.lock();
        debug_assert!(inner.active > 0, "finished a task that was never started");
        inner.active = inner.active.saturating_sub(1);
        self.check_completion(&inner);
    }

    fn check_completion(&self, inner: &TrackerInner) {
        if inner.pending == 0 && inner.active == 0 {
            self.done_tx.send_replace(true);
        }
    }

    /// Returns true if no task is pending and no worker holds one
    pub fn is_complete(&self) -> bool {
        let inner = self.lock();
        inner.pending == 0 && inner.active == 0
    }

    /// Waits until the crawl is complete
    pub async fn wait_for_completion(&self) {
        let mut done_rx = self.done_tx.subscribe();
        loop {
            if self.is_complete() {
                return;
            }
            // The sender lives as long as `self`, so this never errors here
            if done_rx.changed().await.is_err() {
                return;
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.lock().pending
    }

    pub fn active(&self) -> usize {
        self.lock().active
    }

    /// Copies the current counters
    pub fn snapshot(&self) -> TrackerSnapshot {
        let inner = self.lock();
        TrackerSnapshot {
            pending: inner.pending,
            active: inner.active,
            resolved: inner.resolved,
            successes: inner.successes,
            failures_by_kind: inner.failures.clone(),
            links_discovered: inner.links_discovered,
            bytes_fetched: inner.bytes_fetched,
        }
    }
}

impl Default for CompletionTracker {
    fn default() -> Self {
        Self::new()
    }
}
