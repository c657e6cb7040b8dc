// src/ingest/fetch.rs
//! Conditional fetcher.
//!
//! One GET per call. Stored validators are sent as `If-None-Match` /
//! `If-Modified-Since` when the provider honours them; `304` maps to
//! `FetchOutcome::NotModified`. No retries: a failed source simply waits for
//! its next due time.

use anyhow::Context;
use async_trait::async_trait;
use metrics::histogram;
use reqwest::header::{HeaderMap, CONTENT_TYPE, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::StatusCode;
use std::time::{Duration, Instant};

use crate::config::CrawlConfig;
use crate::error::FetchError;
use crate::ingest::providers::{request_url, supports_conditional, PageLimits};
use crate::ingest::types::{FetchOutcome, FetchedPayload};
use crate::model::{CacheValidators, Source};

#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, source: &Source) -> Result<FetchOutcome, FetchError>;
    fn name(&self) -> &'static str;
}

/// reqwest-backed fetcher shared by all providers.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    limits: PageLimits,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn from_config(cfg: &CrawlConfig) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(cfg.http_timeout_secs);
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .connect_timeout(Duration::from_secs(cfg.http_timeout_secs.min(10)))
            .timeout(timeout)
            .build()
            .context("building reqwest client")?;
        Ok(Self {
            client,
            limits: PageLimits {
                reddit: cfg.reddit_page_size,
                wordpress: cfg.wordpress_page_size,
            },
            timeout,
        })
    }

    pub fn with_client(client: reqwest::Client, limits: PageLimits, timeout: Duration) -> Self {
        Self {
            client,
            limits,
            timeout,
        }
    }

    fn classify(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

fn header_string(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, source: &Source) -> Result<FetchOutcome, FetchError> {
        let url = request_url(&source.kind, self.limits)
            .ok_or_else(|| FetchError::MissingLocator(source.key()))?;

        let mut req = self.client.get(&url);
        if supports_conditional(&source.kind) {
            if let Some(etag) = source.validators.etag.as_deref() {
                req = req.header(IF_NONE_MATCH, etag);
            }
            if let Some(modified) = source.validators.last_modified.as_deref() {
                req = req.header(IF_MODIFIED_SINCE, modified);
            }
        }

        let t0 = Instant::now();
        let resp = req.send().await.map_err(|e| self.classify(e))?;
        let status = resp.status();

        if status == StatusCode::NOT_MODIFIED {
            tracing::debug!(target: "ingest", source = %source.key(), "not modified");
            return Ok(FetchOutcome::NotModified);
        }
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                url,
            });
        }

        let headers = resp.headers();
        let validators = CacheValidators {
            etag: header_string(headers, ETAG),
            last_modified: header_string(headers, LAST_MODIFIED),
        };
        let content_type = header_string(headers, CONTENT_TYPE);

        let body = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout)
            } else {
                FetchError::Body(e.to_string())
            }
        })?;

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_fetch_ms", "provider" => source.source_type().as_str()).record(ms);

        Ok(FetchOutcome::Fetched(FetchedPayload {
            body,
            validators,
            content_type,
        }))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
