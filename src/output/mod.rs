//! Output module for crawl reports
//!
//! This module handles:
//! - Building the final report from tracker and frontier state
//! - Formatting the report for the terminal

mod report;

pub use report::{format_report, print_report, CrawlReport};
