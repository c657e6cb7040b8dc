// src/ingest/dedup.rs
//! Deduplicating ingestor.
//!
//! Items are written in normalizer order. Each one is looked up by
//! (content type, external id) and, when absent, created through the store's
//! insert-if-absent, so two crawls racing on the same id both end up with a
//! single row and the loser counts it as skipped.

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;

use crate::error::PersistenceError;
use crate::ingest::types::CanonicalItem;
use crate::ingest::word_count;
use crate::model::{ContentCategory, ContentItem, NewContent, Source};
use crate::store::{InsertOutcome, Store};

/// One item that could not be persisted. The rest of the batch continues.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemError {
    pub external_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct IngestOutcome {
    /// Newly created rows, in normalizer order. Only these go on to keyword
    /// extraction.
    pub created: Vec<ContentItem>,
    pub skipped: usize,
    pub errors: Vec<ItemError>,
    /// Items stored with a synthesized id or an estimated publish date.
    pub quality_warnings: usize,
}

pub async fn ingest(
    store: &dyn Store,
    source: &Source,
    items: Vec<CanonicalItem>,
    now: DateTime<Utc>,
) -> IngestOutcome {
    super::ensure_metrics_described();
    let provider = source.source_type().as_str();
    let content_type = source.source_type();
    let mut out = IngestOutcome::default();

    for item in items {
        let external_id = item.external_id.clone();

        match store.find_content(content_type, &external_id).await {
            Ok(Some(_)) => {
                out.skipped += 1;
                counter!("ingest_items_skipped_total", "provider" => provider).increment(1);
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                record_item_error(&mut out, source, external_id, e);
                continue;
            }
        }

        let warned = item.has_quality_warning();
        let new = to_new_content(source, item);
        match store.insert_content(new, now).await {
            Ok(InsertOutcome::Created(row)) => {
                if warned {
                    out.quality_warnings += 1;
                    counter!("ingest_data_quality_warnings_total", "provider" => provider)
                        .increment(1);
                }
                counter!("ingest_items_created_total", "provider" => provider).increment(1);
                out.created.push(row);
            }
            Ok(InsertOutcome::Existing(id)) => {
                tracing::debug!(target: "ingest", source = %source.key(), external_id = %external_id, existing = id, "lost insert race; skipping");
                out.skipped += 1;
                counter!("ingest_items_skipped_total", "provider" => provider).increment(1);
            }
            Err(e) => record_item_error(&mut out, source, external_id, e),
        }
    }

    tracing::debug!(
        target: "ingest",
        source = %source.key(),
        created = out.created.len(),
        skipped = out.skipped,
        errors = out.errors.len(),
        "ingested batch"
    );
    out
}

fn record_item_error(out: &mut IngestOutcome, source: &Source, external_id: String, e: PersistenceError) {
    tracing::warn!(target: "ingest", source = %source.key(), external_id = %external_id, error = %e, "item not persisted");
    counter!("ingest_item_errors_total", "provider" => source.source_type().as_str()).increment(1);
    out.errors.push(ItemError {
        external_id,
        message: e.to_string(),
    });
}

fn to_new_content(source: &Source, item: CanonicalItem) -> NewContent {
    let category = categorize_content(&item.title, &item.body);
    let words = word_count(&item.title) + word_count(&item.body);
    NewContent {
        content_type: source.source_type(),
        external_id: item.external_id,
        source_id: source.id,
        title: item.title,
        body: item.body,
        url: item.url,
        author: item.author,
        tags: item.tags,
        published_at: item.published_at,
        published_estimated: item.published_estimated,
        id_synthesized: item.id_synthesized,
        word_count: words,
        category,
    }
}

const MARKET_WORDS: &[&str] = &[
    "price", "prices", "market", "markets", "trading", "trader", "traders", "chart", "analysis",
    "bull", "bullish", "bear", "bearish", "rally", "resistance", "support", "volatility",
];
const REGULATION_WORDS: &[&str] = &[
    "regulation", "regulations", "regulatory", "regulator", "regulators", "legal", "law",
    "lawsuit", "government", "sec", "cftc", "compliance", "ban", "court", "tax",
];
const TECHNOLOGY_WORDS: &[&str] = &[
    "technology", "blockchain", "protocol", "upgrade", "fork", "layer", "scaling", "developer",
    "developers", "mainnet", "testnet", "consensus",
];
const ADOPTION_WORDS: &[&str] = &[
    "adoption", "partnership", "partners", "integration", "integrates", "accepts", "payments",
    "merchant", "merchants", "institutional",
];
const SECURITY_WORDS: &[&str] = &[
    "hack", "hacked", "hacker", "exploit", "exploited", "scam", "scammer", "breach",
    "vulnerability", "stolen", "phishing", "rugpull",
];

/// Coarse label by keyword presence. The category with the most vocabulary
/// hits wins; ties go to the earlier category; no hits means `General`.
pub fn categorize_content(title: &str, body: &str) -> ContentCategory {
    let text = format!("{title} {body}").to_lowercase();
    let words: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let table: [(ContentCategory, &[&str]); 5] = [
        (ContentCategory::MarketAnalysis, MARKET_WORDS),
        (ContentCategory::Regulation, REGULATION_WORDS),
        (ContentCategory::Technology, TECHNOLOGY_WORDS),
        (ContentCategory::Adoption, ADOPTION_WORDS),
        (ContentCategory::Security, SECURITY_WORDS),
    ];

    let mut best = (ContentCategory::General, 0usize);
    for (category, vocab) in table {
        let hits = words.iter().filter(|w| vocab.contains(w)).count();
        if hits > best.1 {
            best = (category, hits);
        }
    }
    best.0
}
