// src/ingest/discover.rs
//! Feed auto-discovery from `<link rel="alternate" type="application/rss+xml">`
//! tags in a page's HTML.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static LINK_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<link[^>]+type\s*=\s*["']application/(rss|atom)\+xml["'][^>]*>"#)
        .expect("valid feed link regex")
});
static HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)href\s*=\s*["']([^"']+)["']"#).expect("valid href regex"));

/// Absolute feed URLs advertised by `html`, resolved against `base_url`,
/// in document order without duplicates.
pub fn discover_feed_urls(html: &str, base_url: &str) -> Vec<String> {
    let base = Url::parse(base_url).ok();
    let mut feeds: Vec<String> = Vec::new();

    for tag in LINK_TAG.find_iter(html) {
        let Some(href) = HREF.captures(tag.as_str()).and_then(|c| c.get(1)) else {
            continue;
        };
        let href = html_escape::decode_html_entities(href.as_str().trim()).to_string();
        let resolved = match Url::parse(&href) {
            Ok(u) => Some(u),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                base.as_ref().and_then(|b| b.join(&href).ok())
            }
            Err(_) => None,
        };
        let Some(u) = resolved.filter(|u| matches!(u.scheme(), "http" | "https")) else {
            continue;
        };
        let s = u.to_string();
        if !feeds.contains(&s) {
            feeds.push(s);
        }
    }
    feeds
}
