// src/orchestrator.rs
//! Crawl orchestrator.
//!
//! One cycle: availability check, due set, then one isolated task per source
//! type. Inside a type, sources are dispatched in due order with the type's
//! concurrency limit and inter-dispatch delay. Once the run deadline passes no
//! new source is dispatched; crawls already in flight finish and persist.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use metrics::{counter, gauge};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::CrawlConfig;
use crate::error::PersistenceError;
use crate::history::{RunHistory, RunSummary};
use crate::ingest::dedup;
use crate::ingest::fetch::ContentFetcher;
use crate::ingest::normalize::normalize;
use crate::ingest::scheduler::SourceScheduler;
use crate::ingest::types::FetchOutcome;
use crate::keywords::{KeywordExtractor, KeywordLinker};
use crate::model::{Source, SourceId, SourceType};
use crate::sentiment::{analyze_pending, AnalysisReport, SentimentAnalyzer};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlStatus {
    Ok,
    NotModified,
    Failed,
}

/// Result of crawling one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    pub source_id: SourceId,
    pub key: String,
    pub status: CrawlStatus,
    pub items_created: usize,
    pub items_skipped: usize,
    pub items_dropped: usize,
    pub item_errors: usize,
    pub data_quality_warnings: usize,
    pub keywords_linked: usize,
    /// Source-scoped failure, e.g. `fetch: HTTP 500 from ...`.
    pub error: Option<String>,
}

impl SourceReport {
    fn new(source: &Source) -> Self {
        Self {
            source_id: source.id,
            key: source.key(),
            status: CrawlStatus::Ok,
            items_created: 0,
            items_skipped: 0,
            items_dropped: 0,
            item_errors: 0,
            data_quality_warnings: 0,
            keywords_linked: 0,
            error: None,
        }
    }
}

/// Aggregate for one source type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeReport {
    pub source_type: SourceType,
    pub sources_due: usize,
    pub sources_processed: usize,
    pub sources_failed: usize,
    pub sources_not_modified: usize,
    /// Due sources never dispatched because the run deadline passed.
    pub skipped_deadline: usize,
    pub items_created: usize,
    pub items_skipped: usize,
    pub items_dropped: usize,
    pub item_errors: usize,
    pub data_quality_warnings: usize,
    pub keywords_linked: usize,
    pub sources: Vec<SourceReport>,
    pub errors: Vec<String>,
}

impl TypeReport {
    fn empty(source_type: SourceType, sources_due: usize) -> Self {
        Self {
            source_type,
            sources_due,
            sources_processed: 0,
            sources_failed: 0,
            sources_not_modified: 0,
            skipped_deadline: 0,
            items_created: 0,
            items_skipped: 0,
            items_dropped: 0,
            item_errors: 0,
            data_quality_warnings: 0,
            keywords_linked: 0,
            sources: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn from_sources(source_type: SourceType, sources_due: usize, mut sources: Vec<SourceReport>) -> Self {
        sources.sort_by_key(|s| s.source_id);
        let mut r = Self::empty(source_type, sources_due);
        r.sources_processed = sources.len();
        r.skipped_deadline = sources_due.saturating_sub(sources.len());
        for s in &sources {
            match s.status {
                CrawlStatus::Failed => r.sources_failed += 1,
                CrawlStatus::NotModified => r.sources_not_modified += 1,
                CrawlStatus::Ok => {}
            }
            r.items_created += s.items_created;
            r.items_skipped += s.items_skipped;
            r.items_dropped += s.items_dropped;
            r.item_errors += s.item_errors;
            r.data_quality_warnings += s.data_quality_warnings;
            r.keywords_linked += s.keywords_linked;
            if let Some(e) = &s.error {
                r.errors.push(format!("{}: {e}", s.key));
            }
        }
        r.sources = sources;
        r
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub types: Vec<TypeReport>,
}

impl RunReport {
    pub fn for_type(&self, ty: SourceType) -> Option<&TypeReport> {
        self.types.iter().find(|t| t.source_type == ty)
    }

    fn sum(&self, f: impl Fn(&TypeReport) -> usize) -> usize {
        self.types.iter().map(f).sum()
    }

    pub fn sources_due(&self) -> usize {
        self.sum(|t| t.sources_due)
    }
    pub fn sources_failed(&self) -> usize {
        self.sum(|t| t.sources_failed)
    }
    pub fn skipped_deadline(&self) -> usize {
        self.sum(|t| t.skipped_deadline)
    }
    pub fn items_created(&self) -> usize {
        self.sum(|t| t.items_created)
    }
    pub fn items_skipped(&self) -> usize {
        self.sum(|t| t.items_skipped)
    }
    pub fn keywords_linked(&self) -> usize {
        self.sum(|t| t.keywords_linked)
    }
    pub fn error_count(&self) -> usize {
        self.sum(|t| t.errors.len())
    }
}

/// Post-cycle upkeep: sentiment pass and keyword cleanup.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MaintenanceReport {
    pub analysis: Option<AnalysisReport>,
    pub keywords_deactivated: usize,
}

#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn Store>,
    fetcher: Arc<dyn ContentFetcher>,
    analyzer: Option<Arc<dyn SentimentAnalyzer>>,
    linker: KeywordLinker,
    scheduler: SourceScheduler,
    history: Arc<RunHistory>,
    config: Arc<CrawlConfig>,
    /// Held for a whole cycle; shared by every clone (API and crawl loop).
    cycle: Arc<Mutex<()>>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn Store>, fetcher: Arc<dyn ContentFetcher>, config: CrawlConfig) -> Self {
        let linker = KeywordLinker::new(
            store.clone(),
            KeywordExtractor::new(config.max_keywords_per_item),
        );
        Self {
            store,
            fetcher,
            analyzer: None,
            linker,
            scheduler: SourceScheduler::new(config.disable_threshold),
            history: Arc::new(RunHistory::with_capacity(500)),
            config: Arc::new(config),
            cycle: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn SentimentAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn with_history(mut self, history: Arc<RunHistory>) -> Self {
        self.history = history;
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn history(&self) -> &Arc<RunHistory> {
        &self.history
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    pub fn linker(&self) -> &KeywordLinker {
        &self.linker
    }

    /// Crawl every due source once. Fails only when the store is unavailable
    /// at cycle start; everything after that lands in the report.
    ///
    /// Cycles never overlap: a call made while another cycle runs waits for
    /// it, then computes its own due set, so each source has one crawl owner.
    pub async fn run_cycle(&self) -> Result<RunReport, PersistenceError> {
        let _running = match self.cycle.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::info!(target: "orchestrator", "crawl cycle in progress; waiting");
                self.cycle.lock().await
            }
        };
        crate::ingest::ensure_metrics_described();
        let started_at = Utc::now();
        let deadline = Instant::now() + self.config.run_deadline();

        let sources = match self.preflight().await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(target: "orchestrator", error = %e, "store unavailable; cycle aborted");
                self.history.push(RunSummary::aborted(started_at, e.to_string()));
                return Err(e);
            }
        };

        let due = self.scheduler.due_sources(&sources, started_at);
        gauge!("crawl_sources_due").set(due.len() as f64);

        let mut by_type: BTreeMap<SourceType, Vec<Source>> =
            SourceType::ALL.iter().map(|t| (*t, Vec::new())).collect();
        for s in due {
            by_type.entry(s.source_type()).or_default().push(s);
        }

        let mut handles = Vec::new();
        for (ty, batch) in by_type {
            let due_count = batch.len();
            if batch.is_empty() {
                handles.push((ty, due_count, None));
                continue;
            }
            let this = self.clone();
            let handle = tokio::spawn(async move { this.crawl_type(ty, batch, deadline).await });
            handles.push((ty, due_count, Some(handle)));
        }

        let mut types = Vec::with_capacity(handles.len());
        for (ty, due_count, handle) in handles {
            let report = match handle {
                None => TypeReport::empty(ty, 0),
                Some(h) => match h.await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::error!(target: "orchestrator", source_type = %ty, error = %e, "source type task aborted");
                        let mut r = TypeReport::empty(ty, due_count);
                        r.errors.push(format!("{ty} task aborted: {e}"));
                        r
                    }
                },
            };
            types.push(report);
        }

        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            types,
        };

        counter!("crawl_cycles_total").increment(1);
        gauge!("crawl_cycle_last_run_ts").set(report.finished_at.timestamp() as f64);
        tracing::info!(
            target: "orchestrator",
            due = report.sources_due(),
            created = report.items_created(),
            skipped = report.items_skipped(),
            failed = report.sources_failed(),
            skipped_deadline = report.skipped_deadline(),
            "crawl cycle finished"
        );
        self.history.push(RunSummary::from_report(&report));
        Ok(report)
    }

    async fn preflight(&self) -> Result<Vec<Source>, PersistenceError> {
        self.store.ping().await?;
        self.store.list_sources().await
    }

    async fn crawl_type(&self, ty: SourceType, sources: Vec<Source>, deadline: Instant) -> TypeReport {
        let policy = self.config.policy(ty);
        let delay = policy.delay();
        let due = sources.len();

        let reports: Vec<SourceReport> = stream::iter(sources.into_iter().enumerate())
            .then(|(i, s)| async move {
                if i > 0 && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                s
            })
            .take_while(|_| {
                let open = Instant::now() < deadline;
                async move { open }
            })
            .map(|s| {
                let this = self.clone();
                async move { this.crawl_source(s).await }
            })
            .buffer_unordered(policy.concurrency.max(1))
            .collect()
            .await;

        let report = TypeReport::from_sources(ty, due, reports);
        if report.skipped_deadline > 0 {
            tracing::warn!(target: "orchestrator", source_type = %ty, skipped = report.skipped_deadline, "run deadline passed; sources left for next cycle");
        }
        report
    }

    /// Fetch, normalize, ingest and link one source, then persist its
    /// crawl state. Never fails: problems are recorded on the source and in
    /// the returned report.
    pub async fn crawl_source(&self, mut source: Source) -> SourceReport {
        let ty = source.source_type();
        let provider = ty.as_str();
        let mut report = SourceReport::new(&source);

        source.mark_dispatched(Utc::now());
        if let Err(e) = self.store.save_crawl_state(&source).await {
            tracing::warn!(target: "orchestrator", source = %source.key(), error = %e, "could not record dispatch");
        }

        match self.fetcher.fetch(&source).await {
            Err(e) => {
                counter!("ingest_fetch_errors_total", "provider" => provider).increment(1);
                tracing::warn!(target: "ingest", source = %source.key(), fetcher = self.fetcher.name(), error = %e, "fetch failed");
                source.record_failure(Utc::now(), "fetch", e.to_string());
                report.status = CrawlStatus::Failed;
                report.error = Some(format!("fetch: {e}"));
            }
            Ok(FetchOutcome::NotModified) => {
                counter!("ingest_not_modified_total", "provider" => provider).increment(1);
                source.record_success(Utc::now(), None, 0);
                report.status = CrawlStatus::NotModified;
            }
            Ok(FetchOutcome::Fetched(payload)) => match normalize(&payload.body, ty) {
                Err(e) => {
                    counter!("ingest_format_errors_total", "provider" => provider).increment(1);
                    tracing::warn!(target: "ingest", source = %source.key(), error = %e, "unparseable payload");
                    source.record_failure(Utc::now(), "format", e.to_string());
                    report.status = CrawlStatus::Failed;
                    report.error = Some(format!("format: {e}"));
                }
                Ok(normalized) => {
                    if !normalized.rejected.is_empty() {
                        counter!("ingest_items_dropped_total", "provider" => provider)
                            .increment(normalized.rejected.len() as u64);
                    }
                    report.items_dropped = normalized.rejected.len();

                    let outcome = dedup::ingest(self.store.as_ref(), &source, normalized.items, Utc::now()).await;
                    report.items_created = outcome.created.len();
                    report.items_skipped = outcome.skipped;
                    report.data_quality_warnings = outcome.quality_warnings;
                    report.item_errors = outcome.errors.len();

                    let now = Utc::now();
                    for err in &outcome.errors {
                        source.push_error(now, "persistence", format!("{}: {}", err.external_id, err.message));
                    }

                    for item in &outcome.created {
                        match self
                            .linker
                            .process(item.id, item.content_type, &item.body, &item.title, None)
                            .await
                        {
                            Ok(links) => report.keywords_linked += links.len(),
                            Err(e) => {
                                tracing::warn!(target: "keywords", content_id = item.id, error = %e, "keyword linking failed");
                                report.item_errors += 1;
                                source.push_error(now, "persistence", format!("keywords for {}: {e}", item.external_id));
                            }
                        }
                    }

                    source.record_success(Utc::now(), Some(payload.validators), outcome.created.len());
                    tracing::info!(
                        target: "ingest",
                        source = %source.key(),
                        format = normalized.format.as_str(),
                        created = report.items_created,
                        skipped = report.items_skipped,
                        dropped = report.items_dropped,
                        "source crawled"
                    );
                }
            },
        }

        if let Err(e) = self.store.save_crawl_state(&source).await {
            tracing::error!(target: "orchestrator", source = %source.key(), error = %e, "crawl state not persisted");
            report.error.get_or_insert_with(|| format!("persistence: {e}"));
        }
        report
    }

    /// Sentiment pass over unanalyzed content (when an analyzer is set) and
    /// keyword cleanup below the configured floor.
    pub async fn run_maintenance(&self) -> Result<MaintenanceReport, PersistenceError> {
        let analysis = match &self.analyzer {
            Some(a) => Some(
                analyze_pending(self.store.as_ref(), a.as_ref(), self.config.analysis_batch).await?,
            ),
            None => None,
        };
        let keywords_deactivated = self.linker.cleanup_keywords(self.config.keyword_floor).await?;
        Ok(MaintenanceReport {
            analysis,
            keywords_deactivated,
        })
    }
}
