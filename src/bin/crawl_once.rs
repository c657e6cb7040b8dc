//! Run one crawl cycle over the seeded sources and print the report as JSON.
//!
//! Usage: `cargo run --bin crawl_once` (honours CRAWL_CONFIG_PATH,
//! CRAWL_SOURCES_PATH and RUST_LOG / LOG_FORMAT).

use anyhow::Context;
use std::sync::Arc;

use sentiment_ingest::ingest::config::load_sources_default;
use sentiment_ingest::ingest::fetch::HttpFetcher;
use sentiment_ingest::sentiment::LexiconAnalyzer;
use sentiment_ingest::{CrawlConfig, InMemoryStore, Orchestrator, SourceRegistry, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    sentiment_ingest::init_tracing();

    let cfg = CrawlConfig::load_default().context("loading crawl config")?;
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());

    let registry = SourceRegistry::new(store.clone(), cfg.default_crawl_interval_secs);
    let seeds = load_sources_default().context("loading source seeds")?;
    if seeds.is_empty() {
        anyhow::bail!("no sources configured (set CRAWL_SOURCES_PATH or add config/sources.toml)");
    }
    registry.seed_from(seeds).await.context("seeding sources")?;

    let fetcher = Arc::new(HttpFetcher::from_config(&cfg)?);
    let orchestrator = Orchestrator::new(store, fetcher, cfg)
        .with_analyzer(Arc::new(LexiconAnalyzer::new()));

    let report = orchestrator.run_cycle().await.context("crawl cycle")?;
    let maintenance = orchestrator.run_maintenance().await.context("maintenance pass")?;

    let out = serde_json::json!({ "run": report, "maintenance": maintenance });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
