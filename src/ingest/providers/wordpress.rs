// src/ingest/providers/wordpress.rs
//! WordPress REST API posts (`/wp-json/wp/v2/posts`).

use serde::Deserialize;

use crate::error::FormatError;
use crate::ingest::normalize::{parse_timestamp, RawEntry};

#[derive(Debug, Deserialize)]
struct Post {
    id: Option<u64>,
    guid: Option<Rendered>,
    link: Option<String>,
    title: Option<Rendered>,
    content: Option<Rendered>,
    excerpt: Option<Rendered>,
    date_gmt: Option<String>,
    date: Option<String>,
    #[serde(rename = "_embedded")]
    embedded: Option<Embedded>,
}

#[derive(Debug, Deserialize)]
struct Rendered {
    #[serde(default)]
    rendered: String,
}

#[derive(Debug, Deserialize)]
struct Embedded {
    #[serde(default)]
    author: Vec<Author>,
    #[serde(rename = "wp:term", default)]
    terms: Vec<Vec<Term>>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Term {
    name: Option<String>,
}

/// Posts endpoint for a site root, with embedded authors and terms.
pub fn posts_url(site_url: &str, per_page: u32) -> String {
    format!(
        "{}/wp-json/wp/v2/posts?per_page={per_page}&_embed=author,wp:term",
        site_url.trim_end_matches('/')
    )
}

pub(crate) fn parse(raw: &str) -> Result<Vec<RawEntry>, FormatError> {
    let posts: Vec<Post> = serde_json::from_str(raw).map_err(|e| FormatError::Malformed {
        format: "wordpress",
        reason: e.to_string(),
    })?;

    Ok(posts
        .into_iter()
        .map(|p| {
            // guid.rendered is a site-qualified URL; the bare numeric id is not
            // unique across sites, so it is only used when there is no link.
            let guid = p.guid.map(|g| g.rendered).filter(|g| !g.trim().is_empty());
            let explicit_id = match guid {
                Some(g) => Some(g),
                None if p.link.is_none() => p.id.map(|id| format!("wp-post-{id}")),
                None => None,
            };
            let (author, tags) = match p.embedded {
                Some(e) => (
                    e.author.into_iter().find_map(|a| a.name),
                    e.terms
                        .into_iter()
                        .flatten()
                        .filter_map(|t| t.name)
                        .collect(),
                ),
                None => (None, Vec::new()),
            };
            RawEntry {
                explicit_id,
                link: p.link,
                title: p.title.map(|t| t.rendered),
                bodies: vec![p.content.map(|c| c.rendered), p.excerpt.map(|e| e.rendered)],
                author,
                tags,
                published: p
                    .date_gmt
                    .as_deref()
                    .and_then(parse_timestamp)
                    .or_else(|| p.date.as_deref().and_then(parse_timestamp)),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_rendered_fields_and_embeds() {
        let json = r#"[{
            "id": 42,
            "date_gmt": "2024-01-02T10:00:00",
            "guid": {"rendered": "https://blog.example.test/?p=42"},
            "link": "https://blog.example.test/sec-approves",
            "title": {"rendered": "SEC approves &#8220;spot&#8221; ETF"},
            "content": {"rendered": "<p>The regulation saga ends.</p>"},
            "excerpt": {"rendered": "<p>short</p>"},
            "_embedded": {"author": [{"name": "Ana"}], "wp:term": [[{"name": "Regulation"}], [{"name": "ETF"}]]}
        }]"#;
        let entries = parse(json).unwrap();
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!(e.explicit_id.as_deref(), Some("https://blog.example.test/?p=42"));
        assert_eq!(e.author.as_deref(), Some("Ana"));
        assert_eq!(e.tags, vec!["Regulation".to_string(), "ETF".to_string()]);
        assert!(e.published.is_some());
    }

    #[test]
    fn posts_url_strips_trailing_slash() {
        assert_eq!(
            posts_url("https://blog.example.test/", 20),
            "https://blog.example.test/wp-json/wp/v2/posts?per_page=20&_embed=author,wp:term"
        );
    }
}
