// src/ingest/providers/rss.rs
//! RSS 2.0 `<rss><channel><item>` payloads.

use quick_xml::de::from_str;
use serde::Deserialize;

use super::{scrub_html_entities_for_xml, TextNode};
use crate::error::FormatError;
use crate::ingest::normalize::{parse_timestamp, RawEntry};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<TextNode>,
    description: Option<String>,
    // quick-xml matches on the local name: <content:encoded>, <dc:creator>
    // and <dc:date> arrive as `encoded`, `creator` and `date`
    #[serde(rename = "encoded")]
    content_encoded: Option<String>,
    creator: Option<String>,
    author: Option<String>,
    #[serde(rename = "category", default)]
    categories: Vec<TextNode>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "date")]
    dc_date: Option<String>,
}

pub(crate) fn parse(raw: &str) -> Result<Vec<RawEntry>, FormatError> {
    let xml_clean = scrub_html_entities_for_xml(raw);
    let rss: Rss = from_str(&xml_clean).map_err(|e| FormatError::Malformed {
        format: "rss",
        reason: e.to_string(),
    })?;

    Ok(rss
        .channel
        .items
        .into_iter()
        .map(|it| RawEntry {
            explicit_id: it.guid.map(|g| g.value),
            link: it.link,
            title: it.title,
            bodies: vec![it.content_encoded, it.description],
            author: it.creator.or(it.author),
            tags: it.categories.into_iter().map(|c| c.value).collect(),
            published: it
                .pub_date
                .or(it.dc_date)
                .as_deref()
                .and_then(parse_timestamp),
        })
        .collect())
}
