// src/keywords/mod.rs
//! Frequency-based keyword extraction.
//!
//! Pure text processing: no store access here. `linker` writes the results.

pub mod linker;

use std::collections::HashMap;

use serde::Serialize;

use crate::model::KeywordCategory;

pub use linker::{KeywordLinker, LinkedKeyword};

pub const DEFAULT_MAX_KEYWORDS: usize = 20;
/// Characters kept on each side of the first occurrence.
pub const CONTEXT_RADIUS: usize = 100;

const MIN_TOKEN_LEN: usize = 3;
const MIN_KEYWORD_LEN: usize = 4;
const MIN_FREQUENCY: u32 = 2;
const CRYPTO_BOOST: f32 = 0.3;

const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "aren", "as", "at", "be", "because", "been", "before", "being", "below", "between",
    "both", "but", "by", "can", "cannot", "could", "couldn", "did", "didn", "do", "does", "doesn",
    "doing", "don", "dont", "down", "during", "each", "even", "ever", "every", "few", "for",
    "from", "further", "get", "gets", "got", "had", "hadn", "has", "hasn", "have", "haven",
    "having", "he", "her", "here", "hers", "herself", "him", "himself", "his", "how", "however",
    "i", "if", "im", "in", "into", "is", "isn", "it", "its", "itself", "ive", "just", "know",
    "like", "made", "make", "many", "may", "me", "might", "more", "most", "much", "must", "my",
    "myself", "need", "new", "no", "nor", "not", "now", "of", "off", "on", "once", "one", "only",
    "or", "other", "our", "ours", "ourselves", "out", "over", "own", "people", "really", "said",
    "same", "say", "says", "see", "she", "should", "shouldn", "since", "so", "some", "still",
    "such", "than", "that", "thats", "the", "their", "theirs", "them", "themselves", "then",
    "there", "these", "they", "thing", "things", "think", "this", "those", "through", "to", "too",
    "under", "until", "up", "upon", "us", "very", "want", "was", "wasn", "way", "we", "well",
    "were", "weren", "what", "when", "where", "which", "while", "who", "whom", "why", "will",
    "with", "within", "without", "won", "would", "wouldn", "year", "years", "yet", "you",
    "youre", "your", "yours", "yourself", "yourselves", "http", "https", "www", "com",
];

/// Terms of four or more characters also match as substrings
/// (`bitcoins`, `cryptocurrency`); shorter ones must match exactly.
const CRYPTO_TERMS: &[&str] = &[
    "bitcoin", "btc", "ethereum", "eth", "crypto", "blockchain", "defi", "nft", "altcoin",
    "stablecoin", "solana", "cardano", "ripple", "xrp", "dogecoin", "doge", "litecoin", "ltc",
    "binance", "coinbase", "token", "mining", "miner", "wallet", "satoshi", "halving", "web3",
    "tether", "usdt", "usdc", "metamask", "onchain",
];

const MARKET_TERMS: &[&str] = &[
    "price", "market", "trading", "trader", "rally", "crash", "bull", "bullish", "bear",
    "bearish", "volume", "investor", "investment", "fund", "stock", "futures", "liquidity",
    "selloff", "inflation", "volatility", "exchange", "portfolio", "profit", "loss",
];

const TECHNOLOGY_TERMS: &[&str] = &[
    "technology", "protocol", "network", "upgrade", "layer", "scaling", "contract", "developer",
    "software", "node", "consensus", "mainnet", "testnet", "fork", "rollup", "bridge",
    "security", "privacy", "code", "release",
];

const REGULATION_TERMS: &[&str] = &[
    "regulation", "regulatory", "regulator", "legal", "lawsuit", "court", "government", "ban",
    "compliance", "policy", "congress", "senate", "bill", "cftc", "license", "sanction", "tax",
];

/// A term kept for one piece of content, with content-local statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedKeyword {
    pub term: String,
    pub category: KeywordCategory,
    /// Occurrences within this content.
    pub frequency: u32,
    pub relevance: f32,
    pub context: String,
}

#[derive(Debug, Clone, Copy)]
pub struct KeywordExtractor {
    max_keywords: usize,
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_KEYWORDS)
    }
}

impl KeywordExtractor {
    pub fn new(max_keywords: usize) -> Self {
        Self {
            max_keywords: max_keywords.max(1),
        }
    }

    /// Ranked keywords for `title` + `body`: frequency desc, then term asc.
    pub fn extract(&self, title: &str, body: &str) -> Vec<ExtractedKeyword> {
        let full = join_text(title, body);
        let chars: Vec<char> = full.chars().collect();

        // term -> (frequency, first token)
        let mut seen: HashMap<String, (u32, Token)> = HashMap::new();
        for tok in located_tokens(&chars) {
            seen.entry(tok.term.clone()).or_insert((0, tok)).0 += 1;
        }

        let mut kept: Vec<(u32, Token)> = seen
            .into_values()
            .filter(|(f, t)| *f >= MIN_FREQUENCY && t.term.chars().count() >= MIN_KEYWORD_LEN)
            .collect();
        kept.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.term.cmp(&b.1.term)));
        kept.truncate(self.max_keywords);

        kept.into_iter()
            .map(|(frequency, first)| {
                let crypto = is_crypto_term(&first.term);
                ExtractedKeyword {
                    relevance: relevance_score(
                        frequency,
                        position_score(first.start, chars.len()),
                        crypto,
                    ),
                    category: categorize_keyword(&first.term),
                    context: context_window(&chars, first.start, first.len),
                    term: first.term,
                    frequency,
                }
            })
            .collect()
    }
}

/// A candidate token and the span of its word in the original text, in chars.
#[derive(Debug, Clone)]
struct Token {
    term: String,
    start: usize,
    len: usize,
}

/// Whitespace-delimited words, lowercased with punctuation removed, that pass
/// the candidate filter. Spans run from the word's first to last alphanumeric
/// char, so positions refer to whole tokens rather than substrings.
fn located_tokens(chars: &[char]) -> Vec<Token> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_whitespace() {
            i += 1;
            continue;
        }
        let word_start = i;
        while i < chars.len() && !chars[i].is_whitespace() {
            i += 1;
        }
        let word = &chars[word_start..i];
        let (Some(first), Some(last)) = (
            word.iter().position(|c| c.is_alphanumeric()),
            word.iter().rposition(|c| c.is_alphanumeric()),
        ) else {
            continue;
        };
        let term: String = word
            .iter()
            .filter(|c| c.is_alphanumeric())
            .flat_map(|c| c.to_lowercase())
            .collect();
        if is_candidate(&term) {
            out.push(Token {
                term,
                start: word_start + first,
                len: last - first + 1,
            });
        }
    }
    out
}

fn is_candidate(term: &str) -> bool {
    term.chars().count() >= MIN_TOKEN_LEN
        && !term.chars().all(|c| c.is_numeric())
        && !is_stopword(term)
}

fn join_text(title: &str, body: &str) -> String {
    match (title.trim().is_empty(), body.trim().is_empty()) {
        (false, false) => format!("{} {}", title.trim(), body.trim()),
        (false, true) => title.trim().to_string(),
        _ => body.trim().to_string(),
    }
}

/// Candidate tokens of `text` in order: lowercased, punctuation removed,
/// at least three characters, not numeric, not a stopword.
pub fn tokenize(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    located_tokens(&chars).into_iter().map(|t| t.term).collect()
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

pub fn is_crypto_term(term: &str) -> bool {
    CRYPTO_TERMS.iter().any(|v| {
        if v.len() >= 4 {
            term.contains(v)
        } else {
            term == *v
        }
    })
}

fn in_vocab(term: &str, vocab: &[&str]) -> bool {
    vocab.contains(&term) || term.strip_suffix('s').is_some_and(|t| vocab.contains(&t))
}

pub fn categorize_keyword(term: &str) -> KeywordCategory {
    if is_crypto_term(term) {
        KeywordCategory::Crypto
    } else if in_vocab(term, REGULATION_TERMS) {
        KeywordCategory::Regulation
    } else if in_vocab(term, MARKET_TERMS) {
        KeywordCategory::Market
    } else if in_vocab(term, TECHNOLOGY_TERMS) {
        KeywordCategory::Technology
    } else {
        KeywordCategory::General
    }
}

/// `max(0, 1 - index/len)`; 0 for empty text.
pub fn position_score(index: usize, len: usize) -> f32 {
    if len == 0 {
        return 0.0;
    }
    (1.0 - index as f32 / len as f32).max(0.0)
}

/// `0.5 * min(freq/10, 1) + 0.2 * position + 0.3 * boost`.
pub fn relevance_score(frequency: u32, position: f32, crypto: bool) -> f32 {
    let freq = (frequency as f32 / 10.0).min(1.0);
    let boost = if crypto { CRYPTO_BOOST } else { 0.0 };
    0.5 * freq + 0.2 * position + 0.3 * boost
}

/// Up to `CONTEXT_RADIUS` chars either side of `[index, index + len)`,
/// with `...` where the text was cut.
pub fn context_window(text: &[char], index: usize, len: usize) -> String {
    let start = index.saturating_sub(CONTEXT_RADIUS);
    let end = index
        .saturating_add(len)
        .saturating_add(CONTEXT_RADIUS)
        .min(text.len());
    if start >= end {
        return String::new();
    }
    let mut out = String::new();
    if start > 0 {
        out.push_str("...");
    }
    out.extend(&text[start..end]);
    if end < text.len() {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitcoin_kept_the_dropped() {
        let body = format!("{} {}", "the ".repeat(20), "bitcoin ".repeat(5));
        let kws = KeywordExtractor::default().extract("", &body);
        assert_eq!(kws.len(), 1);
        let k = &kws[0];
        assert_eq!(k.term, "bitcoin");
        assert_eq!(k.frequency, 5);
        assert_eq!(k.category, KeywordCategory::Crypto);
        // 0.5*0.5 + 0.2*position + 0.3*0.3
        let expected = 0.25 + 0.2 * k_position(&body, "bitcoin") + 0.09;
        assert!((k.relevance - expected).abs() < 1e-4, "{} vs {}", k.relevance, expected);
    }

    fn k_position(text: &str, term: &str) -> f32 {
        let chars = text.trim().chars().count();
        let idx = text.trim().find(term).unwrap();
        position_score(idx, chars)
    }

    #[test]
    fn single_occurrences_and_short_terms_are_dropped() {
        let kws = KeywordExtractor::default().extract(
            "ETH ETH ETH",
            "Solana mentioned once. 2024 2024 2024. nft nft.",
        );
        // eth/nft are too short to keep, 2024 is numeric, solana is a singleton
        assert!(kws.is_empty(), "{kws:?}");
    }

    #[test]
    fn ranking_ties_break_on_term_and_cap_applies() {
        let text = "zeta zeta alpha alpha beta beta beta";
        let kws = KeywordExtractor::new(2).extract("", text);
        let terms: Vec<&str> = kws.iter().map(|k| k.term.as_str()).collect();
        assert_eq!(terms, vec!["beta", "alpha"]);
    }

    #[test]
    fn punctuation_is_stripped_before_counting() {
        let kws = KeywordExtractor::default().extract("Ethereum!", "ethereum, Ethereum's upgrade.");
        assert_eq!(kws[0].term, "ethereum");
        assert_eq!(kws[0].frequency, 2);
    }

    #[test]
    fn context_is_truncated_with_ellipses() {
        let text = format!("{} bitcoin bitcoin {}", "x ".repeat(150), "y ".repeat(150));
        let kws = KeywordExtractor::default().extract("", &text);
        let ctx = &kws[0].context;
        assert!(ctx.starts_with("..."));
        assert!(ctx.ends_with("..."));
        assert!(ctx.contains("bitcoin"));

        let short = context_window(&"bitcoin rises".chars().collect::<Vec<_>>(), 0, 7);
        assert_eq!(short, "bitcoin rises");
    }

    #[test]
    fn first_occurrence_is_a_whole_token() {
        let text = format!("bitcoin {}coin coin", "filler ".repeat(100));
        let kws = KeywordExtractor::default().extract("", &text);
        let coin = kws.iter().find(|k| k.term == "coin").expect("coin kept");

        let chars = text.chars().count();
        let at = text.rfind("coin coin").unwrap();
        let expected = relevance_score(2, position_score(at, chars), is_crypto_term("coin"));
        assert!((coin.relevance - expected).abs() < 1e-4, "{}", coin.relevance);
        assert!(coin.relevance < 0.15);
        assert!(coin.context.starts_with("..."));
        assert!(coin.context.ends_with("coin coin"));
        assert!(!coin.context.contains("bitcoin"));
    }

    #[test]
    fn tokenize_filters_and_normalizes() {
        assert_eq!(
            tokenize("The Rally's (rallying) 2024 ok ETH!"),
            vec!["rallys", "rallying", "eth"]
        );
    }

    #[test]
    fn vocabularies() {
        assert!(is_crypto_term("cryptocurrency"));
        assert!(is_crypto_term("btc"));
        assert!(!is_crypto_term("bethany"));
        assert_eq!(categorize_keyword("lawsuits"), KeywordCategory::Regulation);
        assert_eq!(categorize_keyword("traders"), KeywordCategory::Market);
        assert_eq!(categorize_keyword("mainnet"), KeywordCategory::Technology);
        assert_eq!(categorize_keyword("weather"), KeywordCategory::General);
    }
}
