//! Frontier for managing pending URLs, deduplication and the domain limiter
//!
//! This module handles:
//! - The visited set, so every normalized URL is dispatched at most once
//! - A FIFO queue of tasks waiting to be fetched
//! - Per-domain parallelism caps, enforced at dequeue time
//! - Suspending workers until a task becomes dispatchable
//!
//! Visited set, queue and domain states sit behind a single lock, so the
//! dedup check-and-insert and the "pick a task whose domain has a free slot"
//! decision are each one atomic step.

use crate::crawler::task::{CrawlResult, ErrorKind, UrlTask};
use crate::crawler::tracker::CompletionTracker;
use crate::state::DomainState;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct FrontierInner {
    /// Normalized URLs ever enqueued
    visited: HashSet<String>,

    /// Tasks waiting to be dispatched, in discovery order
    queue: VecDeque<UrlTask>,

    /// Per-domain limiter state
    domains: HashMap<String, DomainState>,
}

/// What a worker gets back from [`Frontier::next`]
#[derive(Debug)]
pub enum Dequeue {
    /// A task with its domain slot reserved
    Task(ScheduledTask),

    /// The crawl is complete or cancelled; the worker should exit
    Finished,
}

/// A dispatched task holding one slot of its domain's limiter
///
/// The slot is released when this value is dropped. A task dropped without
/// [`ScheduledTask::resolve`] (for example while a worker unwinds) is recorded
/// as a `Cancelled` failure, so every dispatched task resolves exactly once.
#[derive(Debug)]
pub struct ScheduledTask {
    task: UrlTask,
    frontier: Arc<Frontier>,
    resolved: bool,
}

impl ScheduledTask {
    pub fn task(&self) -> &UrlTask {
        &self.task
    }

    /// Hands the task's result to the completion tracker and releases the slot
    ///
    /// Returns the number of results resolved so far.
    pub fn resolve(mut self, result: CrawlResult) -> u64 {
        self.resolved = true;
        self.frontier.tracker.record(result)
        // slot released by Drop
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        if !self.resolved {
            self.frontier.tracker.record(CrawlResult::failure(
                self.task.clone(),
                ErrorKind::Cancelled,
                "task dropped before it resolved",
            ));
        }
        self.frontier.release(&self.task.domain);
    }
}

/// Holds not-yet-dispatched URL tasks and hands them out to workers
#[derive(Debug)]
pub struct Frontier {
    inner: Mutex<FrontierInner>,
    notify: Notify,
    tracker: Arc<CompletionTracker>,
    per_domain_parallelism: usize,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// # Arguments
    ///
    /// * `per_domain_parallelism` - Maximum in-flight tasks per domain
    /// * `tracker` - Completion tracker notified of every enqueue and dispatch
    pub fn new(per_domain_parallelism: usize, tracker: Arc<CompletionTracker>) -> Self {
        Self {
            inner: Mutex::new(FrontierInner::default()),
            notify: Notify::new(),
            tracker,
            per_domain_parallelism: per_domain_parallelism.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FrontierInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a task unless its normalized URL was seen before
    ///
    /// Returns `true` if the task was queued, `false` if it was a duplicate.
    pub fn enqueue(&self, task: UrlTask) -> bool {
        {
            let mut inner = self.lock();
            if !inner.visited.insert(task.key().to_owned()) {
                tracing::trace!("Skipping already-seen URL {}", task.url);
                return false;
            }
            self.tracker.task_queued();
            tracing::trace!("Queued {} at depth {}", task.url, task.depth);
            inner.queue.push_back(task);
        }

        self.notify.notify_waiters();
        true
    }

    /// Removes and returns the first task whose domain has a free slot
    ///
    /// Tasks for domains at their cap are skipped and keep their position.
    /// Returns `None` when nothing is dispatchable right now, which does not
    /// mean the crawl is finished.
    pub fn try_dequeue(self: &Arc<Self>) -> Option<ScheduledTask> {
        let mut inner = self.lock();
        let FrontierInner { queue, domains, .. } = &mut *inner;

        let position = queue.iter().position(|task| {
            domains
                .get(&task.domain)
                .map_or(true, DomainState::can_request)
        })?;
        let task = queue.remove(position)?;

        let cap = self.per_domain_parallelism;
        let state = domains
            .entry(task.domain.clone())
            .or_insert_with(|| DomainState::new(cap));
        state.record_request();
        tracing::trace!(
            "Dispatching {} ({}/{} in flight for {})",
            task.url,
            state.in_flight,
            state.max_in_flight,
            task.domain
        );

        self.tracker.task_started();

        Some(ScheduledTask {
            task,
            frontier: Arc::clone(self),
            resolved: false,
        })
    }

    /// Waits for the next dispatchable task
    ///
    /// Suspends without polling until a task is enqueued, a domain slot frees
    /// up, the crawl completes, or `cancel` fires. Once cancellation has been
    /// raised this always returns [`Dequeue::Finished`].
    pub async fn next(self: &Arc<Self>, cancel: &CancellationToken) -> Dequeue {
        loop {
            // Register interest before checking, so a wakeup between the
            // check and the await is not lost.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if cancel.is_cancelled() {
                return Dequeue::Finished;
            }

            if let Some(scheduled) = self.try_dequeue() {
                return Dequeue::Task(scheduled);
            }

            if self.tracker.is_complete() {
                return Dequeue::Finished;
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = cancel.cancelled() => return Dequeue::Finished,
            }
        }
    }

    /// Frees one slot of a domain and wakes suspended workers
    fn release(&self, domain: &str) {
        {
            let mut inner = self.lock();
            if let Some(state) = inner.domains.get_mut(domain) {
                state.release();
            }
            self.tracker.task_finished();
        }

        self.notify.notify_waiters();
    }

    /// Number of tasks waiting to be dispatched
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    /// Number of distinct normalized URLs ever enqueued
    pub fn visited_count(&self) -> usize {
        self.lock().visited.len()
    }

    /// Returns true if the normalized URL has been enqueued before
    pub fn contains(&self, url: &str) -> bool {
        self.lock().visited.contains(url)
    }

    /// In-flight tasks for a domain
    pub fn in_flight(&self, domain: &str) -> usize {
        self.lock()
            .domains
            .get(domain)
            .map_or(0, |state| state.in_flight)
    }

    /// Total tasks dispatched per domain so far
    pub fn requests_by_domain(&self) -> HashMap<String, u64> {
        self.lock()
            .domains
            .iter()
            .map(|(domain, state)| (domain.clone(), state.request_count))
            .collect()
    }

    /// Drops every queued task, returning how many were abandoned
    ///
    /// Used after cancellation; abandoned tasks never produce a result.
    pub fn drain_pending(&self) -> usize {
        let mut inner = self.lock();
        let abandoned = inner.queue.len();
        inner.queue.clear();
        abandoned
    }
}
