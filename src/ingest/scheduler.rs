// src/ingest/scheduler.rs
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::model::Source;
use crate::orchestrator::Orchestrator;

/// Decides which sources are due. Pure: callers record `last_crawled_at`
/// themselves as soon as they dispatch a crawl.
#[derive(Clone, Copy, Debug)]
pub struct SourceScheduler {
    pub disable_threshold: u32,
}

impl SourceScheduler {
    pub fn new(disable_threshold: u32) -> Self {
        Self { disable_threshold }
    }

    /// Health gate: inactive sources and sources past the failure threshold
    /// are never due.
    pub fn is_eligible(&self, source: &Source) -> bool {
        source.is_active && source.consecutive_failures <= self.disable_threshold
    }

    pub fn is_due(&self, source: &Source, now: DateTime<Utc>) -> bool {
        if !self.is_eligible(source) {
            return false;
        }
        let Some(last) = source.last_crawled_at else {
            return true;
        };
        // clock skew: a timestamp from the future would otherwise park the
        // source until the clock catches up
        if last > now {
            return true;
        }
        match source.next_due_at() {
            Some(due) => now >= due,
            None => true,
        }
    }

    /// Due sources, never-crawled first, then oldest `last_crawled_at` first.
    pub fn due_sources(&self, sources: &[Source], now: DateTime<Utc>) -> Vec<Source> {
        let mut due: Vec<Source> = sources
            .iter()
            .filter(|s| self.is_due(s, now))
            .cloned()
            .collect();
        // Option orders None before Some; id keeps ties stable
        due.sort_by_key(|s| (s.last_crawled_at, s.id));
        due
    }
}

/// Run a crawl cycle, then the maintenance pass, on every tick until the
/// task is aborted.
pub fn spawn_crawl_loop(orchestrator: Orchestrator, tick: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match orchestrator.run_cycle().await {
                Ok(report) => tracing::info!(
                    target: "ingest",
                    due = report.sources_due(),
                    created = report.items_created(),
                    failed = report.sources_failed(),
                    "crawl tick"
                ),
                Err(e) => {
                    tracing::error!(target: "ingest", error = %e, "crawl cycle aborted");
                    continue;
                }
            }
            if let Err(e) = orchestrator.run_maintenance().await {
                tracing::warn!(target: "ingest", error = %e, "maintenance pass failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceKind;
    use chrono::TimeDelta;

    fn source(id: i64, last: Option<DateTime<Utc>>) -> Source {
        let mut s = Source::new(
            id,
            SourceKind::Rss {
                feed_url: format!("https://example.test/{id}.xml"),
            },
            3600,
            Utc::now(),
        );
        s.last_crawled_at = last;
        s
    }

    #[test]
    fn hourly_source_due_only_after_interval() {
        let sched = SourceScheduler::new(5);
        let now = Utc::now();
        assert!(sched.is_due(&source(1, None), now));
        assert!(!sched.is_due(&source(1, Some(now - TimeDelta::minutes(30))), now));
        assert!(sched.is_due(&source(1, Some(now - TimeDelta::minutes(61))), now));
        assert!(sched.is_due(&source(1, Some(now - TimeDelta::minutes(60))), now));
    }

    #[test]
    fn failure_threshold_and_inactive_are_excluded() {
        let sched = SourceScheduler::new(5);
        let now = Utc::now();
        let mut s = source(1, None);
        s.consecutive_failures = 5;
        assert!(sched.is_due(&s, now));
        s.consecutive_failures = 6;
        assert!(!sched.is_due(&s, now));

        let mut off = source(2, None);
        off.is_active = false;
        assert!(!sched.is_due(&off, now));
    }

    #[test]
    fn odd_state_counts_as_due() {
        let sched = SourceScheduler::new(5);
        let now = Utc::now();
        assert!(sched.is_due(&source(1, Some(now + TimeDelta::hours(2))), now));

        let mut zero = source(2, Some(now));
        zero.crawl_interval_secs = 0;
        assert!(sched.is_due(&zero, now));
    }

    #[test]
    fn never_crawled_first_then_oldest() {
        let sched = SourceScheduler::new(5);
        let now = Utc::now();
        let sources = vec![
            source(1, Some(now - TimeDelta::hours(2))),
            source(2, Some(now - TimeDelta::hours(5))),
            source(3, None),
            source(4, Some(now - TimeDelta::minutes(5))),
        ];
        let ids: Vec<i64> = sched.due_sources(&sources, now).iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }
}
