// src/store/memory.rs
//! In-process store. One mutex guards all tables, so each trait call is atomic
//! and the unique constraints hold under concurrent crawls.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use super::{InsertOutcome, Store, StoreResult};
use crate::error::PersistenceError;
use crate::model::{
    ema, ContentId, ContentItem, ContentType, Keyword, KeywordCategory, KeywordContentLink,
    KeywordId, LinkUpsert, NewContent, NewSource, Source, SourceId, MAX_ANALYSIS_FAILURES,
};

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    sources: BTreeMap<SourceId, Source>,
    source_keys: HashMap<String, SourceId>,
    content: BTreeMap<ContentId, ContentItem>,
    content_keys: HashMap<(ContentType, String), ContentId>,
    keywords: BTreeMap<KeywordId, Keyword>,
    keyword_terms: HashMap<String, KeywordId>,
    links: HashMap<(KeywordId, ContentId, ContentType), KeywordContentLink>,
    /// External ids whose insert is refused (fault injection).
    rejected_external_ids: HashSet<String>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    available: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage: every call fails with `Unavailable` while false.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make inserts of this external id fail with a persistence error.
    pub fn reject_external_id(&self, external_id: impl Into<String>) {
        self.tables.lock().rejected_external_ids.insert(external_id.into());
    }

    pub fn link_count(&self) -> usize {
        self.tables.lock().links.len()
    }

    fn check(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(PersistenceError::Unavailable("in-memory store switched off".into()))
        }
    }
}

fn missing(what: &str, id: i64) -> PersistenceError {
    PersistenceError::NotFound(format!("{what} {id}"))
}

#[async_trait]
impl Store for InMemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.check()
    }

    async fn insert_source(
        &self,
        new: NewSource,
        default_interval_secs: u64,
        now: DateTime<Utc>,
    ) -> StoreResult<Source> {
        self.check()?;
        let kind = new.kind.canonical();
        let key = kind.key();
        let mut t = self.tables.lock();
        if t.source_keys.contains_key(&key) {
            return Err(PersistenceError::Conflict(format!("source {key}")));
        }
        let id = t.next_id();
        let mut source = Source::new(
            id,
            kind,
            new.crawl_interval_secs.unwrap_or(default_interval_secs),
            now,
        );
        source.name = new.name;
        t.source_keys.insert(key, id);
        t.sources.insert(id, source.clone());
        Ok(source)
    }

    async fn get_source(&self, id: SourceId) -> StoreResult<Option<Source>> {
        self.check()?;
        Ok(self.tables.lock().sources.get(&id).cloned())
    }

    async fn find_source_by_key(&self, key: &str) -> StoreResult<Option<Source>> {
        self.check()?;
        let t = self.tables.lock();
        Ok(t.source_keys.get(key).and_then(|id| t.sources.get(id)).cloned())
    }

    async fn list_sources(&self) -> StoreResult<Vec<Source>> {
        self.check()?;
        Ok(self.tables.lock().sources.values().cloned().collect())
    }

    async fn save_crawl_state(&self, source: &Source) -> StoreResult<()> {
        self.check()?;
        let mut t = self.tables.lock();
        let row = t
            .sources
            .get_mut(&source.id)
            .ok_or_else(|| missing("source", source.id))?;
        row.last_crawled_at = source.last_crawled_at;
        row.last_successful_crawl_at = source.last_successful_crawl_at;
        row.consecutive_failures = source.consecutive_failures;
        row.total_items_crawled = source.total_items_crawled;
        row.validators = source.validators.clone();
        row.recent_errors = source.recent_errors.clone();
        Ok(())
    }

    async fn set_source_active(&self, id: SourceId, active: bool) -> StoreResult<Source> {
        self.check()?;
        let mut t = self.tables.lock();
        let row = t.sources.get_mut(&id).ok_or_else(|| missing("source", id))?;
        row.is_active = active;
        Ok(row.clone())
    }

    async fn reset_source_failures(&self, id: SourceId) -> StoreResult<Source> {
        self.check()?;
        let mut t = self.tables.lock();
        let row = t.sources.get_mut(&id).ok_or_else(|| missing("source", id))?;
        row.consecutive_failures = 0;
        Ok(row.clone())
    }

    async fn blend_source_sentiment(&self, id: SourceId, incoming: f32) -> StoreResult<()> {
        self.check()?;
        let mut t = self.tables.lock();
        let row = t.sources.get_mut(&id).ok_or_else(|| missing("source", id))?;
        row.blend_sentiment(incoming);
        Ok(())
    }

    async fn find_content(
        &self,
        content_type: ContentType,
        external_id: &str,
    ) -> StoreResult<Option<ContentItem>> {
        self.check()?;
        let t = self.tables.lock();
        Ok(t
            .content_keys
            .get(&(content_type, external_id.to_string()))
            .and_then(|id| t.content.get(id))
            .cloned())
    }

    async fn insert_content(&self, new: NewContent, now: DateTime<Utc>) -> StoreResult<InsertOutcome> {
        self.check()?;
        let mut t = self.tables.lock();
        if t.rejected_external_ids.contains(&new.external_id) {
            return Err(PersistenceError::Unavailable(format!(
                "write rejected for {}",
                new.external_id
            )));
        }
        let key = (new.content_type, new.external_id.clone());
        if let Some(&existing) = t.content_keys.get(&key) {
            return Ok(InsertOutcome::Existing(existing));
        }
        let id = t.next_id();
        let item = ContentItem::from_new(id, new, now);
        t.content_keys.insert(key, id);
        t.content.insert(id, item.clone());
        Ok(InsertOutcome::Created(item))
    }

    async fn get_content(&self, id: ContentId) -> StoreResult<Option<ContentItem>> {
        self.check()?;
        Ok(self.tables.lock().content.get(&id).cloned())
    }

    async fn unanalyzed_content(&self, limit: usize) -> StoreResult<Vec<ContentItem>> {
        self.check()?;
        let t = self.tables.lock();
        let mut pending: Vec<&ContentItem> = t
            .content
            .values()
            .filter(|c| !c.is_analyzed && c.analysis_failures < MAX_ANALYSIS_FAILURES)
            .collect();
        pending.sort_by_key(|c| (c.analysis_failures, c.id));
        Ok(pending.into_iter().take(limit).cloned().collect())
    }

    async fn record_analysis_failure(&self, id: ContentId) -> StoreResult<ContentItem> {
        self.check()?;
        let mut t = self.tables.lock();
        let row = t.content.get_mut(&id).ok_or_else(|| missing("content", id))?;
        row.analysis_failures = row.analysis_failures.saturating_add(1);
        Ok(row.clone())
    }

    async fn record_content_sentiment(
        &self,
        id: ContentId,
        score: f32,
        label: &str,
        confidence: f32,
    ) -> StoreResult<ContentItem> {
        self.check()?;
        let mut t = self.tables.lock();
        let row = t.content.get_mut(&id).ok_or_else(|| missing("content", id))?;
        row.sentiment_score = Some(score);
        row.sentiment_label = Some(label.to_string());
        row.sentiment_confidence = Some(confidence);
        row.is_analyzed = true;
        Ok(row.clone())
    }

    async fn count_content(&self) -> StoreResult<usize> {
        self.check()?;
        Ok(self.tables.lock().content.len())
    }

    async fn upsert_keyword(
        &self,
        term: &str,
        category: KeywordCategory,
        relevance: f32,
        now: DateTime<Utc>,
    ) -> StoreResult<Keyword> {
        self.check()?;
        let mut t = self.tables.lock();
        if let Some(&id) = t.keyword_terms.get(term) {
            let row = t.keywords.get_mut(&id).ok_or_else(|| missing("keyword", id))?;
            row.frequency = row.frequency.saturating_add(1);
            row.relevance_score = row.relevance_score.max(relevance);
            row.last_seen_at = now;
            row.is_active = true;
            return Ok(row.clone());
        }
        let id = t.next_id();
        let kw = Keyword {
            id,
            term: term.to_string(),
            category,
            frequency: 1,
            average_sentiment: None,
            relevance_score: relevance,
            is_active: true,
            first_seen_at: now,
            last_seen_at: now,
        };
        t.keyword_terms.insert(term.to_string(), id);
        t.keywords.insert(id, kw.clone());
        Ok(kw)
    }

    async fn find_keyword(&self, term: &str) -> StoreResult<Option<Keyword>> {
        self.check()?;
        let t = self.tables.lock();
        Ok(t.keyword_terms.get(term).and_then(|id| t.keywords.get(id)).cloned())
    }

    async fn blend_keyword_sentiment(&self, id: KeywordId, incoming: f32) -> StoreResult<Keyword> {
        self.check()?;
        let mut t = self.tables.lock();
        let row = t.keywords.get_mut(&id).ok_or_else(|| missing("keyword", id))?;
        row.average_sentiment = Some(ema(row.average_sentiment, incoming));
        Ok(row.clone())
    }

    async fn top_keywords(&self, limit: usize) -> StoreResult<Vec<Keyword>> {
        self.check()?;
        let mut v: Vec<Keyword> = self
            .tables
            .lock()
            .keywords
            .values()
            .filter(|k| k.is_active)
            .cloned()
            .collect();
        v.sort_by(|a, b| b.frequency.cmp(&a.frequency).then_with(|| a.term.cmp(&b.term)));
        v.truncate(limit);
        Ok(v)
    }

    async fn deactivate_keywords_below(&self, floor: u64) -> StoreResult<usize> {
        self.check()?;
        let mut t = self.tables.lock();
        let mut n = 0usize;
        for kw in t.keywords.values_mut() {
            if kw.is_active && kw.frequency < floor {
                kw.is_active = false;
                n += 1;
            }
        }
        Ok(n)
    }

    async fn upsert_link(&self, link: LinkUpsert) -> StoreResult<KeywordContentLink> {
        self.check()?;
        let mut t = self.tables.lock();
        let key = (link.keyword_id, link.content_id, link.content_type);
        let row = t
            .links
            .entry(key)
            .and_modify(|row| {
                row.frequency = row.frequency.saturating_add(link.frequency);
                row.relevance_score = link.relevance_score;
                if link.sentiment_score.is_some() {
                    row.sentiment_score = link.sentiment_score;
                }
                row.context = link.context.clone();
            })
            .or_insert_with(|| KeywordContentLink {
                keyword_id: link.keyword_id,
                content_id: link.content_id,
                content_type: link.content_type,
                frequency: link.frequency,
                relevance_score: link.relevance_score,
                sentiment_score: link.sentiment_score,
                context: link.context.clone(),
            });
        Ok(row.clone())
    }

    async fn links_for_content(
        &self,
        content_type: ContentType,
        content_id: ContentId,
    ) -> StoreResult<Vec<KeywordContentLink>> {
        self.check()?;
        let mut v: Vec<KeywordContentLink> = self
            .tables
            .lock()
            .links
            .values()
            .filter(|l| l.content_id == content_id && l.content_type == content_type)
            .cloned()
            .collect();
        v.sort_by_key(|l| l.keyword_id);
        Ok(v)
    }

    async fn set_link_sentiment(
        &self,
        content_type: ContentType,
        content_id: ContentId,
        score: f32,
    ) -> StoreResult<usize> {
        self.check()?;
        let mut t = self.tables.lock();
        let mut n = 0usize;
        for l in t.links.values_mut() {
            if l.content_id == content_id && l.content_type == content_type {
                l.sentiment_score = Some(score);
                n += 1;
            }
        }
        Ok(n)
    }
}
