// src/keywords/linker.rs
//! Writes extracted keywords and their content links through the store.

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;

use crate::error::PersistenceError;
use crate::keywords::KeywordExtractor;
use crate::model::{ContentId, ContentType, Keyword, KeywordContentLink, LinkUpsert};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkedKeyword {
    pub keyword: Keyword,
    pub link: KeywordContentLink,
}

#[derive(Clone)]
pub struct KeywordLinker {
    store: Arc<dyn Store>,
    extractor: KeywordExtractor,
}

impl KeywordLinker {
    pub fn new(store: Arc<dyn Store>, extractor: KeywordExtractor) -> Self {
        Self { store, extractor }
    }

    /// Extract keywords from `title` + `text` and upsert keyword rows and
    /// links for one content item. With a `sentiment_hint`, the keyword's
    /// rolling sentiment is blended and the link carries the score.
    pub async fn process(
        &self,
        content_id: ContentId,
        content_type: ContentType,
        text: &str,
        title: &str,
        sentiment_hint: Option<f32>,
    ) -> Result<Vec<LinkedKeyword>, PersistenceError> {
        self.process_at(content_id, content_type, text, title, sentiment_hint, Utc::now())
            .await
    }

    pub async fn process_at(
        &self,
        content_id: ContentId,
        content_type: ContentType,
        text: &str,
        title: &str,
        sentiment_hint: Option<f32>,
        now: DateTime<Utc>,
    ) -> Result<Vec<LinkedKeyword>, PersistenceError> {
        let extracted = self.extractor.extract(title, text);
        let mut out = Vec::with_capacity(extracted.len());

        for kw in extracted {
            let mut keyword = self
                .store
                .upsert_keyword(&kw.term, kw.category, kw.relevance, now)
                .await?;
            if let Some(score) = sentiment_hint {
                keyword = self.store.blend_keyword_sentiment(keyword.id, score).await?;
            }
            let link = self
                .store
                .upsert_link(LinkUpsert {
                    keyword_id: keyword.id,
                    content_id,
                    content_type,
                    frequency: kw.frequency,
                    relevance_score: kw.relevance,
                    sentiment_score: sentiment_hint,
                    context: kw.context,
                })
                .await?;
            counter!("keyword_links_total", "content_type" => content_type.as_str()).increment(1);
            out.push(LinkedKeyword { keyword, link });
        }

        tracing::debug!(target: "keywords", content_id, content_type = %content_type, links = out.len(), "linked keywords");
        Ok(out)
    }

    /// Deactivate keywords seen fewer than `floor` times. Returns how many.
    pub async fn cleanup_keywords(&self, floor: u64) -> Result<usize, PersistenceError> {
        let n = self.store.deactivate_keywords_below(floor).await?;
        if n > 0 {
            tracing::info!(target: "keywords", deactivated = n, floor, "keyword cleanup");
        }
        Ok(n)
    }
}
