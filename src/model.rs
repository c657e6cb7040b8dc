// src/model.rs
//! Shared content model: sources, content items, keywords and keyword links.
//!
//! `Source` owns its health transitions (`mark_dispatched`, `record_success`,
//! `record_failure`) so every caller applies the same rules:
//! - `consecutive_failures` only resets on a successful fetch (304 included);
//! - the error ring never grows past `ERROR_RING_CAPACITY`;
//! - `total_items_crawled` only counts newly created content.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

pub type SourceId = i64;
pub type ContentId = i64;
pub type KeywordId = i64;

/// Max error records kept per source.
pub const ERROR_RING_CAPACITY: usize = 10;

/// Failed analysis attempts after which an item is left unanalyzed.
pub const MAX_ANALYSIS_FAILURES: u32 = 3;

/// Weight of the previous value in the sentiment moving average.
pub const SENTIMENT_EMA_DECAY: f32 = 0.9;

/// Provider family. Doubles as the content type in keyword links, since each
/// provider writes into its own content namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Reddit,
    #[serde(rename = "wordpress")]
    WordPress,
    Rss,
}

pub type ContentType = SourceType;

impl SourceType {
    pub const ALL: [SourceType; 3] = [SourceType::Reddit, SourceType::WordPress, SourceType::Rss];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Reddit => "reddit",
            SourceType::WordPress => "wordpress",
            SourceType::Rss => "rss",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-specific identity of a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceKind {
    Reddit {
        subreddit: String,
    },
    #[serde(rename = "wordpress")]
    WordPress {
        site_url: String,
    },
    Rss {
        feed_url: String,
    },
}

impl SourceKind {
    pub fn source_type(&self) -> SourceType {
        match self {
            SourceKind::Reddit { .. } => SourceType::Reddit,
            SourceKind::WordPress { .. } => SourceType::WordPress,
            SourceKind::Rss { .. } => SourceType::Rss,
        }
    }

    /// Canonical form: trimmed, `r/` prefix dropped and lowercased for
    /// subreddits, trailing slash dropped for WordPress sites.
    pub fn canonical(self) -> Self {
        match self {
            SourceKind::Reddit { subreddit } => {
                let s = subreddit.trim();
                let s = s
                    .strip_prefix("/r/")
                    .or_else(|| s.strip_prefix("r/"))
                    .unwrap_or(s);
                SourceKind::Reddit {
                    subreddit: s.trim_matches('/').to_ascii_lowercase(),
                }
            }
            SourceKind::WordPress { site_url } => SourceKind::WordPress {
                site_url: site_url.trim().trim_end_matches('/').to_string(),
            },
            SourceKind::Rss { feed_url } => SourceKind::Rss {
                feed_url: feed_url.trim().to_string(),
            },
        }
    }

    /// Unique key across all sources, e.g. `reddit:bitcoin`.
    pub fn key(&self) -> String {
        match self {
            SourceKind::Reddit { subreddit } => format!("reddit:{subreddit}"),
            SourceKind::WordPress { site_url } => format!("wordpress:{site_url}"),
            SourceKind::Rss { feed_url } => format!("rss:{feed_url}"),
        }
    }

    /// Raw locator string (subreddit name or URL). Empty means unresolvable.
    pub fn locator(&self) -> &str {
        match self {
            SourceKind::Reddit { subreddit } => subreddit,
            SourceKind::WordPress { site_url } => site_url,
            SourceKind::Rss { feed_url } => feed_url,
        }
    }
}

/// HTTP cache validators captured from the last successful fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheValidators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl CacheValidators {
    pub fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub at: DateTime<Utc>,
    /// "fetch" | "format" | "persistence"
    pub kind: String,
    pub message: String,
}

/// Registration payload for a new source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSource {
    #[serde(flatten)]
    pub kind: SourceKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub crawl_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub kind: SourceKind,
    pub name: Option<String>,
    pub is_active: bool,
    pub crawl_interval_secs: u64,
    pub last_crawled_at: Option<DateTime<Utc>>,
    pub last_successful_crawl_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub total_items_crawled: u64,
    pub average_sentiment: Option<f32>,
    pub validators: CacheValidators,
    pub recent_errors: VecDeque<ErrorRecord>,
    pub created_at: DateTime<Utc>,
}

impl Source {
    pub fn new(id: SourceId, kind: SourceKind, crawl_interval_secs: u64, now: DateTime<Utc>) -> Self {
        Self {
            id,
            kind,
            name: None,
            is_active: true,
            crawl_interval_secs,
            last_crawled_at: None,
            last_successful_crawl_at: None,
            consecutive_failures: 0,
            total_items_crawled: 0,
            average_sentiment: None,
            validators: CacheValidators::default(),
            recent_errors: VecDeque::with_capacity(ERROR_RING_CAPACITY),
            created_at: now,
        }
    }

    pub fn key(&self) -> String {
        self.kind.key()
    }

    pub fn source_type(&self) -> SourceType {
        self.kind.source_type()
    }

    pub fn crawl_interval(&self) -> TimeDelta {
        i64::try_from(self.crawl_interval_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }

    /// `None` when never crawled or when the sum overflows.
    pub fn next_due_at(&self) -> Option<DateTime<Utc>> {
        self.last_crawled_at
            .and_then(|t| t.checked_add_signed(self.crawl_interval()))
    }

    /// Recorded as soon as a crawl is handed out so the scheduler won't pick
    /// the source again mid-flight.
    pub fn mark_dispatched(&mut self, now: DateTime<Utc>) {
        self.last_crawled_at = Some(now);
    }

    /// Successful fetch (including "not modified"). `validators` replaces the
    /// stored ones when present.
    pub fn record_success(
        &mut self,
        now: DateTime<Utc>,
        validators: Option<CacheValidators>,
        created: usize,
    ) {
        self.consecutive_failures = 0;
        self.last_crawled_at = Some(now);
        self.last_successful_crawl_at = Some(now);
        self.total_items_crawled = self.total_items_crawled.saturating_add(created as u64);
        if let Some(v) = validators {
            if !v.is_empty() {
                self.validators = v;
            }
        }
    }

    /// Failed fetch or unparseable payload.
    pub fn record_failure(&mut self, now: DateTime<Utc>, kind: &str, message: impl Into<String>) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_crawled_at = Some(now);
        self.push_error(now, kind, message);
    }

    /// Append to the bounded error ring without touching the failure counter.
    pub fn push_error(&mut self, now: DateTime<Utc>, kind: &str, message: impl Into<String>) {
        while self.recent_errors.len() >= ERROR_RING_CAPACITY {
            self.recent_errors.pop_front();
        }
        self.recent_errors.push_back(ErrorRecord {
            at: now,
            kind: kind.to_string(),
            message: message.into(),
        });
    }

    /// Folds an analyzed item's score into the rolling source average.
    pub fn blend_sentiment(&mut self, incoming: f32) {
        self.average_sentiment = Some(ema(self.average_sentiment, incoming));
    }
}

/// Coarse content label from a small keyword vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentCategory {
    MarketAnalysis,
    Regulation,
    Technology,
    Adoption,
    Security,
    General,
}

impl ContentCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentCategory::MarketAnalysis => "market-analysis",
            ContentCategory::Regulation => "regulation",
            ContentCategory::Technology => "technology",
            ContentCategory::Adoption => "adoption",
            ContentCategory::Security => "security",
            ContentCategory::General => "general",
        }
    }
}

/// Content ready to be persisted (no id, no sentiment yet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewContent {
    pub content_type: ContentType,
    pub external_id: String,
    pub source_id: SourceId,
    pub title: String,
    pub body: String,
    pub url: Option<String>,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub published_at: DateTime<Utc>,
    pub published_estimated: bool,
    pub id_synthesized: bool,
    pub word_count: usize,
    pub category: ContentCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ContentId,
    pub content_type: ContentType,
    pub external_id: String,
    pub source_id: SourceId,
    pub title: String,
    pub body: String,
    pub url: Option<String>,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub published_at: DateTime<Utc>,
    pub published_estimated: bool,
    pub id_synthesized: bool,
    pub word_count: usize,
    pub category: ContentCategory,
    pub sentiment_score: Option<f32>,
    pub sentiment_label: Option<String>,
    pub sentiment_confidence: Option<f32>,
    pub is_analyzed: bool,
    /// Failed sentiment attempts. Items at `MAX_ANALYSIS_FAILURES` are no
    /// longer offered for analysis.
    #[serde(default)]
    pub analysis_failures: u32,
    pub ingested_at: DateTime<Utc>,
}

impl ContentItem {
    pub fn from_new(id: ContentId, new: NewContent, now: DateTime<Utc>) -> Self {
        Self {
            id,
            content_type: new.content_type,
            external_id: new.external_id,
            source_id: new.source_id,
            title: new.title,
            body: new.body,
            url: new.url,
            author: new.author,
            tags: new.tags,
            published_at: new.published_at,
            published_estimated: new.published_estimated,
            id_synthesized: new.id_synthesized,
            word_count: new.word_count,
            category: new.category,
            sentiment_score: None,
            sentiment_label: None,
            sentiment_confidence: None,
            is_analyzed: false,
            analysis_failures: 0,
            ingested_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordCategory {
    Crypto,
    Market,
    Technology,
    Regulation,
    General,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: KeywordId,
    /// Lowercase, punctuation-stripped. Unique.
    pub term: String,
    pub category: KeywordCategory,
    /// Number of content items the term was kept for. Never decreases.
    pub frequency: u64,
    pub average_sentiment: Option<f32>,
    /// Highest content-local relevance seen so far.
    pub relevance_score: f32,
    pub is_active: bool,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Link between a keyword and one content item. Unique on
/// `(keyword_id, content_id, content_type)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordContentLink {
    pub keyword_id: KeywordId,
    pub content_id: ContentId,
    pub content_type: ContentType,
    pub frequency: u32,
    pub relevance_score: f32,
    pub sentiment_score: Option<f32>,
    pub context: String,
}

/// Link write request; on conflict the store adds `frequency` to the row.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkUpsert {
    pub keyword_id: KeywordId,
    pub content_id: ContentId,
    pub content_type: ContentType,
    pub frequency: u32,
    pub relevance_score: f32,
    pub sentiment_score: Option<f32>,
    pub context: String,
}

/// `new = 0.9 * old + 0.1 * incoming`; the first sample seeds the average.
pub fn ema(old: Option<f32>, incoming: f32) -> f32 {
    match old {
        Some(prev) => SENTIMENT_EMA_DECAY * prev + (1.0 - SENTIMENT_EMA_DECAY) * incoming,
        None => incoming,
    }
}
