// tests/common/mod.rs
//
// Shared helpers: a scripted fetcher keyed by source key, and source seeding.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sentiment_ingest::error::FetchError;
use sentiment_ingest::ingest::fetch::ContentFetcher;
use sentiment_ingest::ingest::types::{FetchOutcome, FetchedPayload};
use sentiment_ingest::model::{CacheValidators, NewSource, Source, SourceKind};
use sentiment_ingest::{CrawlConfig, InMemoryStore, SourceRegistry};

pub const RSS: &str = include_str!("../fixtures/coin_news_rss.xml");
pub const ATOM: &str = include_str!("../fixtures/chain_dev_atom.xml");
pub const REDDIT: &str = include_str!("../fixtures/reddit_listing.json");
pub const WORDPRESS: &str = include_str!("../fixtures/wordpress_posts.json");

#[derive(Clone)]
pub enum Reply {
    Fetched(FetchedPayload),
    NotModified,
    Fail(FetchError),
    Panic,
    Slow(Duration, FetchedPayload),
}

pub fn body(s: &str) -> Reply {
    Reply::Fetched(payload(s, None))
}

pub fn body_with_etag(s: &str, etag: &str) -> Reply {
    Reply::Fetched(payload(s, Some(etag)))
}

pub fn payload(s: &str, etag: Option<&str>) -> FetchedPayload {
    FetchedPayload {
        body: s.to_string(),
        validators: CacheValidators {
            etag: etag.map(str::to_string),
            last_modified: None,
        },
        content_type: None,
    }
}

#[derive(Default)]
pub struct ScriptedFetcher {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, key: &str, reply: Reply) {
        self.replies.lock().unwrap().insert(key.to_string(), reply);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentFetcher for ScriptedFetcher {
    async fn fetch(&self, source: &Source) -> Result<FetchOutcome, FetchError> {
        let key = source.key();
        self.calls.lock().unwrap().push(key.clone());
        let reply = self.replies.lock().unwrap().get(&key).cloned();
        match reply {
            Some(Reply::Fetched(p)) => Ok(FetchOutcome::Fetched(p)),
            Some(Reply::NotModified) => Ok(FetchOutcome::NotModified),
            Some(Reply::Fail(e)) => Err(e),
            Some(Reply::Panic) => panic!("scripted panic for {key}"),
            Some(Reply::Slow(d, p)) => {
                tokio::time::sleep(d).await;
                Ok(FetchOutcome::Fetched(p))
            }
            None => Err(FetchError::Transport(format!("no script for {key}"))),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

pub fn rss(url: &str) -> SourceKind {
    SourceKind::Rss {
        feed_url: url.to_string(),
    }
}

pub fn subreddit(name: &str) -> SourceKind {
    SourceKind::Reddit {
        subreddit: name.to_string(),
    }
}

pub fn wordpress(site: &str) -> SourceKind {
    SourceKind::WordPress {
        site_url: site.to_string(),
    }
}

/// Register a source; `interval` of 0 keeps it due on every cycle.
pub async fn add_source(store: &Arc<InMemoryStore>, kind: SourceKind, interval: u64) -> Source {
    SourceRegistry::new(store.clone(), 3600)
        .register(NewSource {
            kind,
            name: None,
            crawl_interval_secs: Some(interval),
        })
        .await
        .expect("register source")
}

/// Defaults with no inter-source delay, so real-time tests stay fast.
pub fn fast_config() -> CrawlConfig {
    let mut cfg = CrawlConfig::default();
    cfg.reddit.delay_ms = 0;
    cfg.wordpress.delay_ms = 0;
    cfg
}
