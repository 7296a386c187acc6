/// Crawl lifecycle state definitions
///
/// The coordinator walks `Idle -> Seeding -> Running -> Draining -> Done`,
/// or ends in `Cancelled` when the cancellation signal fires first.
use std::fmt;

/// Represents the current phase of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlState {
    // ===== Active States =====
    /// Coordinator constructed, nothing enqueued yet
    Idle,

    /// Seed URLs are being enqueued
    Seeding,

    /// Workers are active and the pending counter is above zero
    Running,

    /// Pending counter reached zero; waiting for workers to exit
    Draining,

    // ===== Terminal States =====
    /// No work remains and the pool has been torn down
    Done,

    /// Cancellation was requested; workers stopped dequeuing
    Cancelled,
}

impl CrawlState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }

    /// Returns true if the transition `self -> next` is legal
    pub fn can_transition_to(&self, next: CrawlState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Seeding)
                | (Self::Seeding, Self::Running)
                | (Self::Running, Self::Draining)
                | (Self::Draining, Self::Done)
                | (Self::Seeding, Self::Cancelled)
                | (Self::Running, Self::Cancelled)
                | (Self::Draining, Self::Cancelled)
        )
    }

    /// Short lowercase name used in logs and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Seeding => "seeding",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
