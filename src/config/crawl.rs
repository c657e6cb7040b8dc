// src/config/crawl.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::model::SourceType;

// --- env names & defaults ---
pub const ENV_CRAWL_CONFIG_PATH: &str = "CRAWL_CONFIG_PATH";
pub const ENV_DISABLE_THRESHOLD: &str = "CRAWL_DISABLE_THRESHOLD";
pub const ENV_RUN_DEADLINE_SECS: &str = "CRAWL_RUN_DEADLINE_SECS";
pub const ENV_TICK_SECS: &str = "CRAWL_TICK_SECS";
pub const DEFAULT_CRAWL_CONFIG_PATH: &str = "config/crawl.toml";

fn default_disable_threshold() -> u32 {
    5
}
fn default_crawl_interval_secs() -> u64 {
    3600
}
fn default_run_deadline_secs() -> u64 {
    15 * 60
}
fn default_tick_secs() -> u64 {
    300
}
fn default_http_timeout_secs() -> u64 {
    20
}
fn default_user_agent() -> String {
    "sentiment-ingest/0.1 (+https://github.com/sentiment-ingest)".to_string()
}
fn default_page_size() -> u32 {
    25
}
fn default_wordpress_page_size() -> u32 {
    20
}
fn default_keyword_floor() -> u64 {
    2
}
fn default_max_keywords() -> usize {
    20
}
fn default_analysis_batch() -> usize {
    100
}

/// Per-provider fan-out policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderPolicy {
    /// Max sources of this provider crawled at once.
    pub concurrency: usize,
    /// Pause between consecutive source dispatches, in milliseconds.
    #[serde(default)]
    pub delay_ms: u64,
}

impl ProviderPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

fn default_rss_policy() -> ProviderPolicy {
    ProviderPolicy {
        concurrency: 3,
        delay_ms: 0,
    }
}
fn default_reddit_policy() -> ProviderPolicy {
    ProviderPolicy {
        concurrency: 1,
        delay_ms: 2_000,
    }
}
fn default_wordpress_policy() -> ProviderPolicy {
    ProviderPolicy {
        concurrency: 1,
        delay_ms: 1_500,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Sources with more consecutive failures than this are not scheduled.
    #[serde(default = "default_disable_threshold")]
    pub disable_threshold: u32,
    /// Interval for sources registered without one.
    #[serde(default = "default_crawl_interval_secs")]
    pub default_crawl_interval_secs: u64,
    /// After this, undispatched sources are skipped for the cycle.
    #[serde(default = "default_run_deadline_secs")]
    pub run_deadline_secs: u64,
    /// Period of the background crawl loop.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_page_size")]
    pub reddit_page_size: u32,
    #[serde(default = "default_wordpress_page_size")]
    pub wordpress_page_size: u32,
    /// Keywords below this frequency are deactivated by cleanup.
    #[serde(default = "default_keyword_floor")]
    pub keyword_floor: u64,
    #[serde(default = "default_max_keywords")]
    pub max_keywords_per_item: usize,
    /// Items analyzed per sentiment pass.
    #[serde(default = "default_analysis_batch")]
    pub analysis_batch: usize,
    #[serde(default = "default_rss_policy")]
    pub rss: ProviderPolicy,
    #[serde(default = "default_reddit_policy")]
    pub reddit: ProviderPolicy,
    #[serde(default = "default_wordpress_policy")]
    pub wordpress: ProviderPolicy,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            disable_threshold: default_disable_threshold(),
            default_crawl_interval_secs: default_crawl_interval_secs(),
            run_deadline_secs: default_run_deadline_secs(),
            tick_secs: default_tick_secs(),
            http_timeout_secs: default_http_timeout_secs(),
            user_agent: default_user_agent(),
            reddit_page_size: default_page_size(),
            wordpress_page_size: default_wordpress_page_size(),
            keyword_floor: default_keyword_floor(),
            max_keywords_per_item: default_max_keywords(),
            analysis_batch: default_analysis_batch(),
            rss: default_rss_policy(),
            reddit: default_reddit_policy(),
            wordpress: default_wordpress_policy(),
        }
    }
}

impl CrawlConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: CrawlConfig = toml::from_str(s).context("parsing crawl config toml")?;
        Ok(cfg.sanitized())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading crawl config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Resolve config:
    /// 1) $CRAWL_CONFIG_PATH (must exist)
    /// 2) config/crawl.toml
    /// 3) built-in defaults
    ///
    /// Env overrides are applied last.
    pub fn load_default() -> Result<Self> {
        let cfg = match std::env::var(ENV_CRAWL_CONFIG_PATH) {
            Ok(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    anyhow::bail!("{ENV_CRAWL_CONFIG_PATH} points to non-existent path");
                }
                Self::load_from(&pb)?
            }
            Err(_) => {
                let default_p = PathBuf::from(DEFAULT_CRAWL_CONFIG_PATH);
                if default_p.exists() {
                    Self::load_from(&default_p)?
                } else {
                    Self::default()
                }
            }
        };
        Ok(cfg.with_env_overrides())
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = parse_env::<u32>(ENV_DISABLE_THRESHOLD) {
            self.disable_threshold = v;
        }
        if let Some(v) = parse_env::<u64>(ENV_RUN_DEADLINE_SECS) {
            self.run_deadline_secs = v;
        }
        if let Some(v) = parse_env::<u64>(ENV_TICK_SECS) {
            self.tick_secs = v;
        }
        self.sanitized()
    }

    /// Clamp values that would stall or spin the crawler.
    fn sanitized(mut self) -> Self {
        for p in [&mut self.rss, &mut self.reddit, &mut self.wordpress] {
            p.concurrency = p.concurrency.clamp(1, 32);
        }
        self.run_deadline_secs = self.run_deadline_secs.max(1);
        self.tick_secs = self.tick_secs.max(1);
        self.http_timeout_secs = self.http_timeout_secs.clamp(1, 300);
        self.reddit_page_size = self.reddit_page_size.clamp(1, 100);
        self.wordpress_page_size = self.wordpress_page_size.clamp(1, 100);
        self.max_keywords_per_item = self.max_keywords_per_item.max(1);
        self.analysis_batch = self.analysis_batch.max(1);
        self
    }

    pub fn policy(&self, ty: SourceType) -> ProviderPolicy {
        match ty {
            SourceType::Reddit => self.reddit,
            SourceType::WordPress => self.wordpress,
            SourceType::Rss => self.rss,
        }
    }

    pub fn run_deadline(&self) -> Duration {
        Duration::from_secs(self.run_deadline_secs)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse::<T>().ok())
}
