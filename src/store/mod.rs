// src/store/mod.rs
//! Persistence boundary.
//!
//! Every write that two crawls may race on is a single store call with
//! insert-on-conflict semantics: `insert_content` (unique on content type +
//! external id), `upsert_keyword` (unique on term) and `upsert_link` (unique on
//! keyword + content + content type). Callers never check-then-insert.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::PersistenceError;
use crate::model::{
    ContentId, ContentItem, ContentType, Keyword, KeywordCategory, KeywordContentLink, KeywordId,
    LinkUpsert, NewContent, NewSource, Source, SourceId,
};

pub use memory::InMemoryStore;

pub type StoreResult<T> = std::result::Result<T, PersistenceError>;

/// Outcome of an insert-if-absent on content.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Created(ContentItem),
    /// Another row already holds this external id.
    Existing(ContentId),
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Availability check run at the start of every crawl cycle.
    async fn ping(&self) -> StoreResult<()>;

    // --- sources ---

    /// Fails with `Conflict` when a source with the same key exists.
    async fn insert_source(
        &self,
        new: NewSource,
        default_interval_secs: u64,
        now: DateTime<Utc>,
    ) -> StoreResult<Source>;
    async fn get_source(&self, id: SourceId) -> StoreResult<Option<Source>>;
    async fn find_source_by_key(&self, key: &str) -> StoreResult<Option<Source>>;
    async fn list_sources(&self) -> StoreResult<Vec<Source>>;
    /// Persists the crawl-owned fields of a source: schedule timestamps,
    /// failure counter, item total, cache validators and the error ring.
    /// `is_active` and `average_sentiment` are left untouched.
    async fn save_crawl_state(&self, source: &Source) -> StoreResult<()>;
    async fn set_source_active(&self, id: SourceId, active: bool) -> StoreResult<Source>;
    /// Clears the failure counter, e.g. when an operator re-enables a source.
    async fn reset_source_failures(&self, id: SourceId) -> StoreResult<Source>;
    async fn blend_source_sentiment(&self, id: SourceId, incoming: f32) -> StoreResult<()>;

    // --- content ---

    async fn find_content(
        &self,
        content_type: ContentType,
        external_id: &str,
    ) -> StoreResult<Option<ContentItem>>;
    async fn insert_content(&self, new: NewContent, now: DateTime<Utc>) -> StoreResult<InsertOutcome>;
    async fn get_content(&self, id: ContentId) -> StoreResult<Option<ContentItem>>;
    /// Unanalyzed items below `MAX_ANALYSIS_FAILURES`, fewest failures first,
    /// then oldest id. Items that keep failing sink behind fresh ones.
    async fn unanalyzed_content(&self, limit: usize) -> StoreResult<Vec<ContentItem>>;
    async fn record_analysis_failure(&self, id: ContentId) -> StoreResult<ContentItem>;
    async fn record_content_sentiment(
        &self,
        id: ContentId,
        score: f32,
        label: &str,
        confidence: f32,
    ) -> StoreResult<ContentItem>;
    async fn count_content(&self) -> StoreResult<usize>;

    // --- keywords ---

    /// Insert the term with frequency 1, or bump the existing row's frequency
    /// by one. `relevance` raises the stored relevance if higher.
    async fn upsert_keyword(
        &self,
        term: &str,
        category: KeywordCategory,
        relevance: f32,
        now: DateTime<Utc>,
    ) -> StoreResult<Keyword>;
    async fn find_keyword(&self, term: &str) -> StoreResult<Option<Keyword>>;
    async fn blend_keyword_sentiment(&self, id: KeywordId, incoming: f32) -> StoreResult<Keyword>;
    async fn top_keywords(&self, limit: usize) -> StoreResult<Vec<Keyword>>;
    /// Deactivates active keywords with `frequency < floor`; returns how many.
    async fn deactivate_keywords_below(&self, floor: u64) -> StoreResult<usize>;

    // --- links ---

    /// Insert the link, or add `frequency` to the existing row and refresh its
    /// relevance, sentiment and context.
    async fn upsert_link(&self, link: LinkUpsert) -> StoreResult<KeywordContentLink>;
    async fn links_for_content(
        &self,
        content_type: ContentType,
        content_id: ContentId,
    ) -> StoreResult<Vec<KeywordContentLink>>;
    async fn set_link_sentiment(
        &self,
        content_type: ContentType,
        content_id: ContentId,
        score: f32,
    ) -> StoreResult<usize>;
}
