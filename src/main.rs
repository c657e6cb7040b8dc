//! Ingestion service binary entrypoint.
//! Boots the admin router and the background crawl loop over seeded sources.

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use std::sync::Arc;

use sentiment_ingest::ingest::config::load_sources_default;
use sentiment_ingest::ingest::fetch::HttpFetcher;
use sentiment_ingest::ingest::scheduler::spawn_crawl_loop;
use sentiment_ingest::metrics::Metrics;
use sentiment_ingest::sentiment::LexiconAnalyzer;
use sentiment_ingest::{router, AppState, CrawlConfig, InMemoryStore, Orchestrator, Store};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    sentiment_ingest::init_tracing();

    let cfg = CrawlConfig::load_default().context("loading crawl config")?;

    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let fetcher = Arc::new(HttpFetcher::from_config(&cfg)?);
    let orchestrator = Orchestrator::new(store, fetcher, cfg.clone())
        .with_analyzer(Arc::new(LexiconAnalyzer::new()));
    let state = AppState::new(orchestrator.clone());

    let seeds = load_sources_default().context("loading source seeds")?;
    let seeded = state
        .registry
        .seed_from(seeds)
        .await
        .context("seeding sources")?;
    tracing::info!(target: "registry", seeded, "sources seeded");

    let mut app = router(state);
    match Metrics::init(&cfg) {
        Ok(m) => app = app.merge(m.router()),
        Err(e) => tracing::warn!(error = ?e, "metrics disabled"),
    }

    spawn_crawl_loop(orchestrator, cfg.tick());

    Ok(app.into())
}
