//! history.rs: bounded in-memory log of crawl cycle summaries for `/runs`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;

use crate::orchestrator::RunReport;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub sources_due: usize,
    pub sources_failed: usize,
    pub skipped_deadline: usize,
    pub items_created: usize,
    pub items_skipped: usize,
    pub keywords_linked: usize,
    pub error_count: usize,
    /// Set when the cycle aborted before crawling (store unavailable).
    pub fatal: Option<String>,
}

impl RunSummary {
    pub fn from_report(r: &RunReport) -> Self {
        Self {
            started_at: r.started_at,
            duration_ms: (r.finished_at - r.started_at).num_milliseconds(),
            sources_due: r.sources_due(),
            sources_failed: r.sources_failed(),
            skipped_deadline: r.skipped_deadline(),
            items_created: r.items_created(),
            items_skipped: r.items_skipped(),
            keywords_linked: r.keywords_linked(),
            error_count: r.error_count(),
            fatal: None,
        }
    }

    pub fn aborted(started_at: DateTime<Utc>, reason: impl Into<String>) -> Self {
        Self {
            started_at,
            duration_ms: (Utc::now() - started_at).num_milliseconds(),
            sources_due: 0,
            sources_failed: 0,
            skipped_deadline: 0,
            items_created: 0,
            items_skipped: 0,
            keywords_linked: 0,
            error_count: 1,
            fatal: Some(reason.into()),
        }
    }
}

#[derive(Debug)]
pub struct RunHistory {
    inner: Mutex<VecDeque<RunSummary>>,
    cap: usize,
}

impl RunHistory {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.clamp(1, 10_000);
        Self {
            inner: Mutex::new(VecDeque::with_capacity(cap)),
            cap,
        }
    }

    pub fn push(&self, summary: RunSummary) {
        let mut v = self.inner.lock();
        while v.len() >= self.cap {
            v.pop_front();
        }
        v.push_back(summary);
    }

    /// Most recent `n` summaries, oldest first.
    pub fn snapshot_last_n(&self, n: usize) -> Vec<RunSummary> {
        let v = self.inner.lock();
        let start = v.len().saturating_sub(n);
        v.iter().skip(start).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
