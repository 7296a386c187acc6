//! Final crawl report
//!
//! Built by the coordinator once the pool has been torn down, and printed by
//! the binary.

use crate::crawler::{ErrorKind, TrackerSnapshot};
use crate::state::CrawlState;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Summary of one crawl run
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// Terminal state: `Done` or `Cancelled`
    pub state: CrawlState,

    /// Distinct normalized URLs enqueued during the run
    pub visited: usize,

    /// Tasks that resolved successfully
    pub successes: u64,

    /// Tasks that resolved with a failure
    pub failures: u64,

    /// Failure counts by kind
    pub failures_by_kind: BTreeMap<ErrorKind, u64>,

    /// Tasks still queued when the crawl was cancelled
    pub abandoned: usize,

    /// Normalized links found across all successful pages (before dedup)
    pub links_discovered: u64,

    /// Total body bytes fetched
    pub bytes_fetched: u64,

    /// Tasks dispatched per domain
    pub requests_by_domain: HashMap<String, u64>,

    /// Wall-clock start of the run
    pub started_at: DateTime<Utc>,

    /// Run duration
    pub elapsed: Duration,
}

impl CrawlReport {
    pub fn new(
        state: CrawlState,
        visited: usize,
        abandoned: usize,
        snapshot: TrackerSnapshot,
        requests_by_domain: HashMap<String, u64>,
        started_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> Self {
        Self {
            state,
            visited,
            successes: snapshot.successes,
            failures: snapshot.failures(),
            failures_by_kind: snapshot.failures_by_kind,
            abandoned,
            links_discovered: snapshot.links_discovered,
            bytes_fetched: snapshot.bytes_fetched,
            requests_by_domain,
            started_at,
            elapsed,
        }
    }

    /// Tasks that produced a result
    pub fn resolved(&self) -> u64 {
        self.successes + self.failures
    }

    /// Share of resolved tasks that succeeded, in percent
    pub fn success_rate(&self) -> f64 {
        let resolved = self.resolved();
        if resolved == 0 {
            0.0
        } else {
            (self.successes as f64 / resolved as f64) * 100.0
        }
    }

    /// Failure count for one kind
    pub fn failures_of(&self, kind: ErrorKind) -> u64 {
        self.failures_by_kind.get(&kind).copied().unwrap_or(0)
    }
}

/// Renders the report as the text printed at the end of a run
pub fn format_report(report: &CrawlReport) -> String {
    let mut out = String::new();

    out.push_str("=== Crawl Report ===\n\n");
    out.push_str(&format!("State: {}\n", report.state));
    out.push_str(&format!(
        "Started: {}\n",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!("Elapsed: {:.2}s\n\n", report.elapsed.as_secs_f64()));

    out.push_str("Overview:\n");
    out.push_str(&format!("  Visited URLs: {}\n", report.visited));
    out.push_str(&format!("  Successes: {}\n", report.successes));
    out.push_str(&format!("  Failures: {}\n", report.failures));
    if report.abandoned > 0 {
        out.push_str(&format!("  Abandoned (queued at cancel): {}\n", report.abandoned));
    }
    out.push_str(&format!("  Links discovered: {}\n", report.links_discovered));
    out.push_str(&format!("  Bytes fetched: {}\n", report.bytes_fetched));

    if !report.failures_by_kind.is_empty() {
        out.push_str("\nFailures by Kind:\n");
        let mut counts: Vec<_> = report.failures_by_kind.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        for (kind, count) in counts {
            out.push_str(&format!("  {}: {}\n", kind, count));
        }
    }

    if !report.requests_by_domain.is_empty() {
        out.push_str(&format!(
            "\nRequests by Domain ({}):\n",
            report.requests_by_domain.len()
        ));
        let mut domains: Vec<_> = report.requests_by_domain.iter().collect();
        domains.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        for (domain, count) in domains {
            out.push_str(&format!("  - {}: {}\n", domain, count));
        }
    }

    out.push_str(&format!(
        "\nSuccess Rate: {:.1}% ({} / {} resolved)\n",
        report.success_rate(),
        report.successes,
        report.resolved()
    ));

    out
}

/// Prints the report to stdout
pub fn print_report(report: &CrawlReport) {
    print!("{}", format_report(report));
}
