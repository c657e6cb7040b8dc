// src/ingest/providers/atom.rs
//! Atom `<feed><entry>` payloads.

use quick_xml::de::from_str;
use serde::Deserialize;

use super::{scrub_html_entities_for_xml, TextNode};
use crate::error::FormatError;
use crate::ingest::normalize::{parse_timestamp, RawEntry};

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    id: Option<String>,
    title: Option<TextNode>,
    #[serde(rename = "link", default)]
    links: Vec<Link>,
    content: Option<TextNode>,
    summary: Option<TextNode>,
    #[serde(rename = "author", default)]
    authors: Vec<Person>,
    #[serde(rename = "category", default)]
    categories: Vec<Category>,
    published: Option<String>,
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Person {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Category {
    #[serde(rename = "@term")]
    term: Option<String>,
    #[serde(rename = "@label")]
    label: Option<String>,
}

/// `rel="alternate"` wins; a link without `rel` is alternate by definition.
fn alternate_link(links: Vec<Link>) -> Option<String> {
    let mut first = None;
    for l in links {
        let Some(href) = l.href else { continue };
        match l.rel.as_deref() {
            None | Some("alternate") => return Some(href),
            _ => {
                if first.is_none() {
                    first = Some(href);
                }
            }
        }
    }
    first
}

pub(crate) fn parse(raw: &str) -> Result<Vec<RawEntry>, FormatError> {
    let xml_clean = scrub_html_entities_for_xml(raw);
    let feed: Feed = from_str(&xml_clean).map_err(|e| FormatError::Malformed {
        format: "atom",
        reason: e.to_string(),
    })?;

    Ok(feed
        .entries
        .into_iter()
        .map(|en| RawEntry {
            explicit_id: en.id,
            link: alternate_link(en.links),
            title: en.title.map(|t| t.value),
            bodies: vec![en.content.map(|c| c.value), en.summary.map(|s| s.value)],
            author: en.authors.into_iter().find_map(|a| a.name),
            tags: en
                .categories
                .into_iter()
                .filter_map(|c| c.label.or(c.term))
                .collect(),
            published: en
                .published
                .or(en.updated)
                .as_deref()
                .and_then(parse_timestamp),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_alternate_link_and_content() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Ledger Notes</title>
  <entry>
    <title type="html">Ethereum &amp;amp; staking</title>
    <link rel="self" href="https://ledger.example.test/e1.atom"/>
    <id>tag:ledger.example.test,2024:e1</id>
    <link rel="alternate" href="https://ledger.example.test/e1"/>
    <updated>2024-01-02T10:00:00Z</updated>
    <summary>short</summary>
    <content type="html">&lt;p&gt;long form&lt;/p&gt;</content>
    <author><name>Vitalik</name></author>
    <category term="eth"/>
  </entry>
</feed>"#;
        let entries = parse(xml).unwrap();
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!(e.explicit_id.as_deref(), Some("tag:ledger.example.test,2024:e1"));
        assert_eq!(e.link.as_deref(), Some("https://ledger.example.test/e1"));
        assert_eq!(e.bodies[0].as_deref(), Some("<p>long form</p>"));
        assert_eq!(e.author.as_deref(), Some("Vitalik"));
        assert_eq!(e.tags, vec!["eth".to_string()]);
        assert!(e.published.is_some());
    }
}
