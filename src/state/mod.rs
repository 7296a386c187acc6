//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlState`: lifecycle phase of a crawl run (idle, seeding, running, draining, done, cancelled)
//! - `DomainState`: per-domain in-flight counting for the domain limiter

mod crawl_state;
mod domain_state;

pub use crawl_state::CrawlState;
pub use domain_state::DomainState;
