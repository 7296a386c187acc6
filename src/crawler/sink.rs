//! Result sink capability
//!
//! Successfully fetched pages are handed to a [`ResultSink`]. Storing is
//! fire-and-forget from the crawler's point of view: a sink handles its own
//! errors and never fails the task.

use crate::crawler::task::Page;
use std::sync::{Mutex, PoisonError};
use url::Url;

/// Receives every successfully fetched page
pub trait ResultSink: Send + Sync {
    fn store(&self, url: &Url, page: &Page);
}

/// Logs each stored page through tracing
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ResultSink for LogSink {
    fn store(&self, url: &Url, page: &Page) {
        tracing::info!(
            "Stored {} (status {}, {} bytes{})",
            url,
            page.status,
            page.body.len(),
            if page.final_url != *url {
                format!(", served from {}", page.final_url)
            } else {
                String::new()
            }
        );
    }
}

/// Keeps stored URLs and bodies in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pages: Mutex<Vec<(Url, Page)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// URLs stored so far, in store order
    pub fn urls(&self) -> Vec<String> {
        self.pages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(url, _)| url.to_string())
            .collect()
    }

    /// Takes every stored page out of the sink
    pub fn take(&self) -> Vec<(Url, Page)> {
        std::mem::take(&mut *self.pages.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.pages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultSink for MemorySink {
    fn store(&self, url: &Url, page: &Page) {
        self.pages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((url.clone(), page.clone()));
    }
}
