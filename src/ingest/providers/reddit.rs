// src/ingest/providers/reddit.rs
//! Reddit listing JSON (`/r/<name>/new.json`).

use chrono::DateTime;
use serde::Deserialize;

use crate::error::FormatError;
use crate::ingest::normalize::RawEntry;

pub const REDDIT_BASE: &str = "https://www.reddit.com";

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    /// Fullname, e.g. `t3_abc123`.
    name: Option<String>,
    id: Option<String>,
    title: Option<String>,
    selftext: Option<String>,
    selftext_html: Option<String>,
    author: Option<String>,
    permalink: Option<String>,
    url: Option<String>,
    created_utc: Option<f64>,
    link_flair_text: Option<String>,
}

/// Listing URL for the newest posts of a subreddit.
pub fn listing_url(subreddit: &str, limit: u32) -> String {
    format!("{REDDIT_BASE}/r/{subreddit}/new.json?limit={limit}&raw_json=1")
}

pub(crate) fn parse(raw: &str) -> Result<Vec<RawEntry>, FormatError> {
    let listing: Listing = serde_json::from_str(raw).map_err(|e| FormatError::Malformed {
        format: "reddit",
        reason: e.to_string(),
    })?;

    Ok(listing
        .data
        .children
        .into_iter()
        .map(|c| {
            let p = c.data;
            let link = p
                .permalink
                .map(|pl| format!("{REDDIT_BASE}{pl}"))
                .or(p.url);
            RawEntry {
                explicit_id: p.name.or(p.id.map(|id| format!("t3_{id}"))),
                link,
                title: p.title,
                bodies: vec![p.selftext_html, p.selftext],
                author: p.author.filter(|a| a != "[deleted]"),
                tags: p.link_flair_text.into_iter().collect(),
                published: p
                    .created_utc
                    .filter(|ts| ts.is_finite() && *ts > 0.0)
                    .and_then(|ts| DateTime::from_timestamp(ts as i64, 0)),
            }
        })
        .collect())
}
