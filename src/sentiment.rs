//! Sentiment analysis collaborator and the post-ingest analysis pass.
//!
//! Analysis runs off the ingestion path: crawls store content unanalyzed and
//! `analyze_pending` scores it later, fanning the score out to the item's
//! keyword links, the keywords' rolling averages and the source's average.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::error::PersistenceError;
use crate::store::Store;

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("../config/sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).expect("valid sentiment lexicon")
});

/// Largest absolute weight in the lexicon; used to scale scores into [-1, 1].
const MAX_WEIGHT: f32 = 3.0;
/// Lexicon hits needed for full confidence.
const CONFIDENT_HITS: f32 = 5.0;
const NEUTRAL_BAND: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    pub fn from_score(score: f32) -> Self {
        if score > NEUTRAL_BAND {
            SentimentLabel::Positive
        } else if score < -NEUTRAL_BAND {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentResult {
    /// In [-1, 1].
    pub score: f32,
    pub label: SentimentLabel,
    /// In [0, 1].
    pub confidence: f32,
    /// Words that moved the score.
    pub keywords: Vec<String>,
}

#[async_trait]
pub trait SentimentAnalyzer: Send + Sync {
    async fn analyze(&self, text: &str) -> anyhow::Result<SentimentResult>;
    fn name(&self) -> &'static str;
}

/// Word-list analyzer with three-token negation.
#[derive(Debug, Clone, Default)]
pub struct LexiconAnalyzer;

impl LexiconAnalyzer {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn word_score(&self, w: &str) -> i32 {
        *LEXICON.get(w).unwrap_or(&0)
    }

    /// Returns (raw score, lexicon hits in order).
    /// A negator within the previous 1..=3 tokens flips the sign of a hit.
    pub fn score_text(&self, text: &str) -> (i32, Vec<String>) {
        let tokens: Vec<String> = tokenize(text).collect();
        let mut score: i32 = 0;
        let mut hits = Vec::new();

        for i in 0..tokens.len() {
            let w = tokens[i].as_str();
            let base = self.word_score(w);
            if base == 0 {
                continue;
            }
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            score += if negated { -base } else { base };
            hits.push(tokens[i].clone());
        }

        (score, hits)
    }

    pub fn score(&self, text: &str) -> SentimentResult {
        let (raw, hits) = self.score_text(text);
        let n = hits.len() as f32;
        let score = if hits.is_empty() {
            0.0
        } else {
            (raw as f32 / (MAX_WEIGHT * n)).clamp(-1.0, 1.0)
        };
        let mut seen = HashSet::new();
        let keywords: Vec<String> = hits.into_iter().filter(|w| seen.insert(w.clone())).collect();
        SentimentResult {
            score,
            label: SentimentLabel::from_score(score),
            confidence: (n / CONFIDENT_HITS).min(1.0),
            keywords,
        }
    }
}

#[async_trait]
impl SentimentAnalyzer for LexiconAnalyzer {
    async fn analyze(&self, text: &str) -> anyhow::Result<SentimentResult> {
        Ok(self.score(text))
    }

    fn name(&self) -> &'static str {
        "lexicon"
    }
}

fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

/// Contractions arrive split (`isn't` -> `isn`, `t`), so match the stems.
fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "without"
            | "cannot"
            | "isn"
            | "wasn"
            | "aren"
            | "won"
            | "don"
            | "doesn"
            | "didn"
            | "cant"
    )
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub analyzed: usize,
    pub failed: usize,
    pub links_updated: usize,
    pub keywords_updated: usize,
}

/// Score up to `limit` unanalyzed items. Per-item failures are counted and
/// the pass continues; only the initial listing can fail the whole pass.
pub async fn analyze_pending(
    store: &dyn Store,
    analyzer: &dyn SentimentAnalyzer,
    limit: usize,
) -> Result<AnalysisReport, PersistenceError> {
    let items = store.unanalyzed_content(limit).await?;
    let mut report = AnalysisReport::default();

    for item in items {
        let text = format!("{} {}", item.title, item.body);
        let result = match analyzer.analyze(&text).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(target: "sentiment", content_id = item.id, analyzer = analyzer.name(), error = %e, "analysis failed");
                report.failed += 1;
                if let Err(e) = store.record_analysis_failure(item.id).await {
                    tracing::warn!(target: "sentiment", content_id = item.id, error = %e, "analysis failure not recorded");
                }
                continue;
            }
        };

        let applied = async {
            store
                .record_content_sentiment(item.id, result.score, result.label.as_str(), result.confidence)
                .await?;
            let links = store
                .set_link_sentiment(item.content_type, item.id, result.score)
                .await?;
            let mut keywords = 0;
            for link in store.links_for_content(item.content_type, item.id).await? {
                store.blend_keyword_sentiment(link.keyword_id, result.score).await?;
                keywords += 1;
            }
            store.blend_source_sentiment(item.source_id, result.score).await?;
            Ok::<_, PersistenceError>((links, keywords))
        }
        .await;

        match applied {
            Ok((links, keywords)) => {
                report.analyzed += 1;
                report.links_updated += links;
                report.keywords_updated += keywords;
            }
            Err(e) => {
                tracing::warn!(target: "sentiment", content_id = item.id, error = %e, "sentiment not persisted");
                report.failed += 1;
            }
        }
    }

    if report.analyzed > 0 || report.failed > 0 {
        tracing::info!(
            target: "sentiment",
            analyzed = report.analyzed,
            failed = report.failed,
            "analysis pass"
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negation_flips_the_hit() {
        let a = LexiconAnalyzer::new();
        assert!(a.score("Bitcoin rally looks strong").score > 0.5);
        let r = a.score("This is not a rally");
        assert!(r.score < 0.0);
        assert_eq!(r.label, SentimentLabel::Negative);
        let r = a.score("The exchange isn't hacked");
        assert!(r.score > 0.0);
    }

    #[test]
    fn no_hits_is_neutral_with_zero_confidence() {
        let r = LexiconAnalyzer::new().score("A quiet day for the chain");
        assert_eq!(r.score, 0.0);
        assert_eq!(r.label, SentimentLabel::Neutral);
        assert_eq!(r.confidence, 0.0);
    }

    #[test]
    fn scores_stay_in_range() {
        let r = LexiconAnalyzer::new().score("crash crash crash plunge panic");
        assert!(r.score >= -1.0 && r.score <= 1.0);
        assert_eq!(r.confidence, 1.0);
    }

    #[test]
    fn hit_words_are_listed_once() {
        let r = LexiconAnalyzer::new().score("rally crash rally crash rally");
        assert_eq!(r.keywords, vec!["rally".to_string(), "crash".to_string()]);
        assert_eq!(r.confidence, 1.0);
    }
}
