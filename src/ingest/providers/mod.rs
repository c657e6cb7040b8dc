// src/ingest/providers/mod.rs
//! Provider-specific payload shapes and request locators.

pub mod atom;
pub mod reddit;
pub mod rss;
pub mod wordpress;

use serde::Deserialize;

use crate::model::SourceKind;

/// Element whose text we want regardless of its attributes
/// (`<guid isPermaLink="false">`, `<content type="html">`, ...).
#[derive(Debug, Default, Deserialize)]
pub(crate) struct TextNode {
    #[serde(rename = "$text", default)]
    pub value: String,
}

/// Page sizes for the REST providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub reddit: u32,
    pub wordpress: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            reddit: 25,
            wordpress: 20,
        }
    }
}

/// URL to GET for a source. `None` when the source has no usable locator.
pub fn request_url(kind: &SourceKind, limits: PageLimits) -> Option<String> {
    if kind.locator().trim().is_empty() {
        return None;
    }
    Some(match kind {
        SourceKind::Reddit { subreddit } => reddit::listing_url(subreddit, limits.reddit),
        SourceKind::WordPress { site_url } => wordpress::posts_url(site_url, limits.wordpress),
        SourceKind::Rss { feed_url } => feed_url.clone(),
    })
}

/// Whether the provider honours `If-None-Match` / `If-Modified-Since`.
pub fn supports_conditional(kind: &SourceKind) -> bool {
    !matches!(kind, SourceKind::Reddit { .. })
}

/// HTML named entities are not valid XML; quick-xml rejects them. Map the
/// common ones before parsing.
pub(crate) fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", "&#160;")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&hellip;", "...")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&copy;", "&#169;")
}
