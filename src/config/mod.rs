// src/config/mod.rs
pub mod crawl;

pub use crawl::{CrawlConfig, ProviderPolicy};
