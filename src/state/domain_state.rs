/// Tracks the limiter state of a domain during crawling
///
/// One instance per domain lives inside the frontier and is only touched
/// while the frontier lock is held.
#[derive(Debug, Clone)]
pub struct DomainState {
    /// Requests to this domain currently in flight
    pub in_flight: usize,

    /// Maximum requests allowed in flight at once
    pub max_in_flight: usize,

    /// Total requests dispatched to this domain in the current crawl
    pub request_count: u64,
}

impl DomainState {
    /// Creates a new DomainState with the given parallelism cap
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            in_flight: 0,
            max_in_flight,
            request_count: 0,
        }
    }

    /// Checks if another request can be dispatched to this domain
    pub fn can_request(&self) -> bool {
        self.in_flight < self.max_in_flight
    }

    /// Records that a request was dispatched to this domain
    pub fn record_request(&mut self) {
        self.in_flight += 1;
        self.request_count += 1;
    }

    /// Releases one in-flight slot
    pub fn release(&mut self) {
        debug_assert!(self.in_flight > 0, "released a slot that was never taken");
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Returns the number of slots still free
    pub fn slots_remaining(&self) -> usize {
        self.max_in_flight.saturating_sub(self.in_flight)
    }
}
