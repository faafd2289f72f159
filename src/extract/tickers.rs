// src/extract/tickers.rs
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use super::universe::TickerUniverse;
use crate::config::ExtractionConfig;
use crate::document::truncate_chars;

/// High-frequency acronyms that collide with listed symbols.
pub const DEFAULT_EXCLUSIONS: &[&str] = &[
    "A", "I", "AT", "BE", "DO", "IT", "ARE", "FOR", "CEO", "API", "AI", "AM", "PM", "USA", "GDP",
    "IPO", "CFO", "CTO", "RSS", "ETF", "DIY", "FAQ", "ASAP", "EDIT", "ELI5",
];

/// English stopwords (lowercase).
static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "your", "yours",
        "yourself", "yourselves", "he", "him", "his", "himself", "she", "her", "hers", "herself",
        "it", "its", "itself", "they", "them", "their", "theirs", "themselves", "what", "which",
        "who", "whom", "this", "that", "these", "those", "am", "is", "are", "was", "were", "be",
        "been", "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an",
        "the", "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by",
        "for", "with", "about", "against", "between", "into", "through", "during", "before",
        "after", "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over",
        "under", "again", "further", "then", "once", "here", "there", "when", "where", "why",
        "how", "all", "any", "both", "each", "few", "more", "most", "other", "some", "such", "no",
        "nor", "not", "only", "own", "same", "so", "than", "too", "very", "s", "t", "can",
        "will", "just", "don", "should", "now", "d", "ll", "m", "o", "re", "ve", "y", "ain",
        "aren", "couldn", "didn", "doesn", "hadn", "hasn", "haven", "isn", "ma", "mightn",
        "mustn", "needn", "shan", "shouldn", "wasn", "weren", "won", "wouldn",
    ]
    .into_iter()
    .collect()
});

// Whole alphabetic runs, so a token is never glued to a neighbouring letter.
// `$` and digits are not letters and therefore act as boundaries.
static RE_ALPHA_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\p{Alphabetic}+").expect("alphabetic run regex"));

pub fn is_stopword(lower: &str) -> bool {
    STOPWORDS.contains(lower)
}

/// Finds ticker symbols in free text, validated against a [`TickerUniverse`].
#[derive(Debug, Clone)]
pub struct TickerExtractor {
    universe: TickerUniverse,
    exclusions: HashSet<String>,
    cfg: ExtractionConfig,
}

impl TickerExtractor {
    pub fn new(universe: TickerUniverse, cfg: ExtractionConfig) -> Self {
        let exclusions = DEFAULT_EXCLUSIONS
            .iter()
            .map(|s| s.to_string())
            .chain(cfg.extra_exclusions.iter().map(|s| s.trim().to_ascii_uppercase()))
            .collect();
        Self {
            universe,
            exclusions,
            cfg,
        }
    }

    pub fn universe(&self) -> &TickerUniverse {
        &self.universe
    }

    pub fn is_excluded(&self, upper: &str) -> bool {
        self.exclusions.contains(upper)
    }

    /// Distinct tickers in order of first appearance, capped at `max_tickers`.
    pub fn extract(&self, text: &str) -> Vec<String> {
        let text = truncate_chars(text, self.cfg.max_text_chars);
        let mut out: Vec<String> = Vec::new();
        if self.universe.is_empty() {
            return out;
        }

        for m in RE_ALPHA_RUN.find_iter(text) {
            let tok = m.as_str();
            // ASCII-only tokens, so byte length equals char count here.
            if !tok.is_ascii() || tok.len() < self.cfg.min_len || tok.len() > self.cfg.max_len {
                continue;
            }
            if self.cfg.uppercase_only && !tok.bytes().all(|b| b.is_ascii_uppercase()) {
                continue;
            }
            let upper = tok.to_ascii_uppercase();
            if is_stopword(&tok.to_ascii_lowercase())
                || self.is_excluded(&upper)
                || !self.universe.contains(&upper)
            {
                continue;
            }
            if !out.contains(&upper) {
                out.push(upper);
                if out.len() >= self.cfg.max_tickers {
                    break;
                }
            }
        }
        out
    }
}
