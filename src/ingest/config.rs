// src/ingest/config.rs
//! Source seed list (TOML or JSON) used to populate the registry at startup.

use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::NewSource;

const ENV_PATH: &str = "CRAWL_SOURCES_PATH";
/// Tried in order when `CRAWL_SOURCES_PATH` is unset.
const DEFAULT_PATHS: [&str; 2] = ["config/sources.toml", "config/sources.json"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeedFormat {
    /// `[[sources]]` tables.
    Toml,
    /// A bare array of sources.
    Json,
}

impl SeedFormat {
    fn for_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "toml" => Some(SeedFormat::Toml),
            "json" => Some(SeedFormat::Json),
            _ => None,
        }
    }

    fn sniff(content: &str) -> Self {
        if content.trim_start().starts_with('[') && !content.contains("[[sources]]") {
            SeedFormat::Json
        } else {
            SeedFormat::Toml
        }
    }
}

#[derive(Deserialize)]
struct SeedTable {
    #[serde(default)]
    sources: Vec<NewSource>,
}

/// Load seeds from `path`; the extension picks the format, otherwise the
/// content is sniffed.
pub fn load_sources_from(path: &Path) -> Result<Vec<NewSource>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading source seeds from {}", path.display()))?;
    let format = SeedFormat::for_path(path).unwrap_or_else(|| SeedFormat::sniff(&content));
    parse_seeds(&content, format)
        .with_context(|| format!("parsing source seeds in {}", path.display()))
}

/// `$CRAWL_SOURCES_PATH` when set (it must exist), else the first existing
/// default path, else no seeds.
pub fn load_sources_default() -> Result<Vec<NewSource>> {
    if let Some(p) = std::env::var_os(ENV_PATH) {
        let path = PathBuf::from(p);
        ensure!(path.exists(), "{ENV_PATH} points to missing file {}", path.display());
        return load_sources_from(&path);
    }
    match DEFAULT_PATHS.iter().map(Path::new).find(|p| p.exists()) {
        Some(path) => load_sources_from(path),
        None => Ok(Vec::new()),
    }
}

fn parse_seeds(content: &str, format: SeedFormat) -> Result<Vec<NewSource>> {
    let seeds = match format {
        SeedFormat::Toml => toml::from_str::<SeedTable>(content)?.sources,
        SeedFormat::Json => serde_json::from_str::<Vec<NewSource>>(content)?,
    };
    Ok(clean_list(seeds))
}

/// Canonicalize, drop empty locators, keep the first entry per key.
fn clean_list(items: Vec<NewSource>) -> Vec<NewSource> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for mut it in items {
        it.kind = it.kind.canonical();
        if it.kind.locator().is_empty() {
            continue;
        }
        if seen.insert(it.kind.key()) {
            out.push(it);
        }
    }
    out
}
