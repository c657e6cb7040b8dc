// src/registry.rs
//! Source registry: admin-facing lifecycle of sources.
//!
//! Sources are never deleted. Deactivation is a soft flag; reactivation also
//! clears the failure counter so the scheduler picks the source up again.

use chrono::Utc;
use std::sync::Arc;

use crate::error::{PersistenceError, Result, ValidationError};
use crate::ingest::discover::discover_feed_urls;
use crate::model::{NewSource, Source, SourceId, SourceKind};
use crate::store::Store;

#[derive(Clone)]
pub struct SourceRegistry {
    store: Arc<dyn Store>,
    default_interval_secs: u64,
}

impl SourceRegistry {
    pub fn new(store: Arc<dyn Store>, default_interval_secs: u64) -> Self {
        Self {
            store,
            default_interval_secs,
        }
    }

    /// Register a new source. Duplicate keys fail with `Conflict`.
    pub async fn register(&self, new: NewSource) -> Result<Source> {
        let new = NewSource {
            kind: new.kind.canonical(),
            ..new
        };
        if new.kind.locator().is_empty() {
            return Err(ValidationError::EmptyLocator(new.kind.source_type().to_string()).into());
        }
        let source = self
            .store
            .insert_source(new, self.default_interval_secs, Utc::now())
            .await?;
        tracing::info!(target: "registry", id = source.id, source = %source.key(), "source registered");
        Ok(source)
    }

    /// Register every feed advertised by a page. Feeds already known are
    /// left alone; returns only the newly created sources.
    pub async fn discover_and_register(&self, html: &str, page_url: &str) -> Result<Vec<Source>> {
        let mut created = Vec::new();
        for feed_url in discover_feed_urls(html, page_url) {
            let new = NewSource {
                kind: SourceKind::Rss { feed_url },
                name: None,
                crawl_interval_secs: None,
            };
            match self.register(new).await {
                Ok(s) => created.push(s),
                Err(crate::error::IngestError::Persistence(PersistenceError::Conflict(key))) => {
                    tracing::debug!(target: "registry", %key, "discovered feed already registered");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(created)
    }

    /// Register seeds at startup, skipping ones that already exist.
    pub async fn seed_from(&self, seeds: Vec<NewSource>) -> Result<usize> {
        let mut n = 0;
        for seed in seeds {
            let key = seed.kind.clone().canonical().key();
            if self.store.find_source_by_key(&key).await?.is_some() {
                continue;
            }
            self.register(seed).await?;
            n += 1;
        }
        Ok(n)
    }

    pub async fn deactivate(&self, id: SourceId) -> Result<Source> {
        let s = self.store.set_source_active(id, false).await?;
        tracing::info!(target: "registry", id, source = %s.key(), "source deactivated");
        Ok(s)
    }

    pub async fn reactivate(&self, id: SourceId) -> Result<Source> {
        self.store.set_source_active(id, true).await?;
        let s = self.store.reset_source_failures(id).await?;
        tracing::info!(target: "registry", id, source = %s.key(), "source reactivated");
        Ok(s)
    }

    pub async fn get(&self, id: SourceId) -> Result<Option<Source>> {
        Ok(self.store.get_source(id).await?)
    }

    pub async fn list(&self) -> Result<Vec<Source>> {
        Ok(self.store.list_sources().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestError;
    use crate::store::InMemoryStore;

    fn registry() -> SourceRegistry {
        SourceRegistry::new(Arc::new(InMemoryStore::new()), 3600)
    }

    fn subreddit(name: &str) -> NewSource {
        NewSource {
            kind: SourceKind::Reddit {
                subreddit: name.into(),
            },
            name: None,
            crawl_interval_secs: None,
        }
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let reg = registry();
        let s = reg.register(subreddit("Bitcoin")).await.unwrap();
        assert_eq!(s.crawl_interval_secs, 3600);
        let err = reg.register(subreddit("r/bitcoin")).await.unwrap_err();
        assert!(matches!(
            err,
            IngestError::Persistence(PersistenceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn empty_locator_is_rejected() {
        let err = registry().register(subreddit("  ")).await.unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[tokio::test]
    async fn reactivate_clears_failures() {
        let store = Arc::new(InMemoryStore::new());
        let reg = SourceRegistry::new(store.clone(), 3600);
        let mut s = reg.register(subreddit("ethereum")).await.unwrap();
        for _ in 0..7 {
            s.record_failure(Utc::now(), "fetch", "timeout");
        }
        store.save_crawl_state(&s).await.unwrap();
        reg.deactivate(s.id).await.unwrap();

        let s = reg.reactivate(s.id).await.unwrap();
        assert!(s.is_active);
        assert_eq!(s.consecutive_failures, 0);
        assert_eq!(s.recent_errors.len(), 7);
    }

    #[tokio::test]
    async fn discovery_skips_known_feeds() {
        let reg = registry();
        let html = r#"<link rel="alternate" type="application/rss+xml" href="/feed">"#;
        let first = reg
            .discover_and_register(html, "https://news.example.test/")
            .await
            .unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].key(), "rss:https://news.example.test/feed");

        let again = reg
            .discover_and_register(html, "https://news.example.test/")
            .await
            .unwrap();
        assert!(again.is_empty());
        assert_eq!(reg.list().await.unwrap().len(), 1);
    }
}
