// tests/sentiment_pass.rs
//
// Maintenance pass: lexicon scores flow into items, links, keywords and the
// source's rolling average; analyzer failures leave items pending.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::{body, ScriptedFetcher, RSS};
use sentiment_ingest::model::SourceType;
use sentiment_ingest::sentiment::{LexiconAnalyzer, SentimentAnalyzer, SentimentResult};
use sentiment_ingest::model::MAX_ANALYSIS_FAILURES;
use sentiment_ingest::{CrawlConfig, InMemoryStore, Orchestrator, Store};

async fn crawled(analyzer: Arc<dyn SentimentAnalyzer>) -> (Orchestrator, Arc<InMemoryStore>, i64) {
    crawled_with(analyzer, common::fast_config()).await
}

async fn crawled_with(
    analyzer: Arc<dyn SentimentAnalyzer>,
    cfg: CrawlConfig,
) -> (Orchestrator, Arc<InMemoryStore>, i64) {
    let store = Arc::new(InMemoryStore::new());
    let fetcher = ScriptedFetcher::new();
    let src = common::add_source(&store, common::rss("https://coinnews.example.test/feed"), 0).await;
    fetcher.set(&src.key(), body(RSS));

    let orch = Orchestrator::new(store.clone(), fetcher, cfg).with_analyzer(analyzer);
    let report = orch.run_cycle().await.unwrap();
    assert_eq!(report.items_created(), 3);
    (orch, store, src.id)
}

#[tokio::test]
async fn scores_propagate_to_links_keywords_and_source() {
    let (orch, store, source_id) = crawled(Arc::new(LexiconAnalyzer::new())).await;
    let pending = store.unanalyzed_content(100).await.unwrap();
    assert_eq!(pending.len(), 3);

    let m = orch.run_maintenance().await.unwrap();
    let analysis = m.analysis.expect("analyzer configured");
    assert_eq!(analysis.analyzed, 3);
    assert_eq!(analysis.failed, 0);
    assert!(analysis.links_updated > 0);

    for item in &pending {
        let row = store.get_content(item.id).await.unwrap().unwrap();
        assert!(row.is_analyzed);
        let score = row.sentiment_score.expect("scored");
        assert!((-1.0..=1.0).contains(&score));
        for link in store.links_for_content(SourceType::Rss, item.id).await.unwrap() {
            assert_eq!(link.sentiment_score, Some(score));
        }
    }

    // "rallies" and "strong" are positive lexicon entries
    let bitcoin = store.find_keyword("bitcoin").await.unwrap().unwrap();
    assert!(bitcoin.average_sentiment.unwrap() > 0.0);

    let source = store.get_source(source_id).await.unwrap().unwrap();
    assert!(source.average_sentiment.is_some());

    let again = orch.run_maintenance().await.unwrap();
    assert_eq!(again.analysis.unwrap().analyzed, 0);
}

struct BrokenAnalyzer;

#[async_trait]
impl SentimentAnalyzer for BrokenAnalyzer {
    async fn analyze(&self, _text: &str) -> anyhow::Result<SentimentResult> {
        anyhow::bail!("model offline")
    }

    fn name(&self) -> &'static str {
        "broken"
    }
}

#[tokio::test]
async fn analyzer_failures_leave_items_pending() {
    let (orch, store, _) = crawled(Arc::new(BrokenAnalyzer)).await;
    let m = orch.run_maintenance().await.unwrap();
    let analysis = m.analysis.unwrap();
    assert_eq!(analysis.analyzed, 0);
    assert_eq!(analysis.failed, 3);
    assert_eq!(store.unanalyzed_content(100).await.unwrap().len(), 3);
}

#[tokio::test]
async fn maintenance_without_analyzer_only_cleans_keywords() {
    let store = Arc::new(InMemoryStore::new());
    let orch = Orchestrator::new(store.clone(), ScriptedFetcher::new(), common::fast_config());
    let m = orch.run_maintenance().await.unwrap();
    assert!(m.analysis.is_none());
    assert_eq!(m.keywords_deactivated, 0);
}

/// Fails on any text mentioning `needle`, scores the rest with the lexicon.
struct PickyAnalyzer {
    needle: &'static str,
}

#[async_trait]
impl SentimentAnalyzer for PickyAnalyzer {
    async fn analyze(&self, text: &str) -> anyhow::Result<SentimentResult> {
        if text.contains(self.needle) {
            anyhow::bail!("cannot score this item");
        }
        Ok(LexiconAnalyzer::new().score(text))
    }

    fn name(&self) -> &'static str {
        "picky"
    }
}

#[tokio::test]
async fn failing_item_does_not_block_later_ones() {
    let mut cfg = common::fast_config();
    cfg.analysis_batch = 1;
    let (orch, store, _) = crawled_with(Arc::new(PickyAnalyzer { needle: "ETF" }), cfg).await;

    let mut analyzed = 0;
    let mut failed = 0;
    for _ in 0..6 {
        let a = orch.run_maintenance().await.unwrap().analysis.unwrap();
        analyzed += a.analyzed;
        failed += a.failed;
    }
    assert_eq!(analyzed, 2, "both healthy items were reached");
    assert_eq!(failed as u32, MAX_ANALYSIS_FAILURES);

    let pending = store.unanalyzed_content(100).await.unwrap();
    assert!(pending.is_empty(), "given-up items are no longer offered");
}
