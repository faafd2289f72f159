// src/extract/signals.rs
//! Rule-based signal tagging.
//!
//! Keyword categories come from [`SignalConfig`] and are compiled once into
//! case-insensitive alternations. Only sentences that name the ticker are read.
//! Direction (BUY/SELL/HOLD) is decided per sentence with priority
//! BUY > SELL > HOLD; topic tags are independent.
//! At most one `PT:<value>` tag is emitted per call.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

use super::context::ticker_occurrences;
use crate::config::SignalConfig;
use crate::mention::Signal;

// Sentence ends: terminal punctuation followed by whitespace, or a line break.
// "$12.50" stays in one sentence.
static RE_SENTENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]+\s+|\n+").expect("sentence regex"));

/// Compiled keyword alternation. `None` when the list is empty.
fn keyword_regex(words: &[String]) -> Result<Option<Regex>> {
    let mut words: Vec<&str> = words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return Ok(None);
    }
    // Longest first so "to the moon" wins over "moon" inside one alternation.
    words.sort_by_key(|w| std::cmp::Reverse(w.chars().count()));

    let alts: Vec<String> = words
        .iter()
        .map(|w| {
            let is_word = |c: char| c.is_alphanumeric() || c == '_';
            let lead = if w.chars().next().is_some_and(is_word) { r"\b" } else { "" };
            let trail = if w.chars().last().is_some_and(is_word) { r"\b" } else { "" };
            let body = regex::escape(w).replace(' ', r"\s+");
            format!("{lead}{body}{trail}")
        })
        .collect();
    let pattern = format!("(?i)(?:{})", alts.join("|"));
    Regex::new(&pattern)
        .with_context(|| format!("compiling keyword pattern ({} words)", words.len()))
        .map(Some)
}

fn matches(re: &Option<Regex>, text: &str) -> bool {
    re.as_ref().is_some_and(|r| r.is_match(text))
}

#[derive(Debug, Clone)]
pub struct SignalExtractor {
    buy: Option<Regex>,
    sell: Option<Regex>,
    hold: Option<Regex>,
    topics: Vec<(Signal, Option<Regex>)>,
    target_strong: Regex,
    target_weak: Regex,
}

impl SignalExtractor {
    pub fn new(cfg: &SignalConfig) -> Result<Self> {
        let n = cfg.price_target_lookahead;
        let target_strong = Regex::new(&format!(
            r"(?is)^.{{0,{n}}}?\b(?:price\s+target|target\s+price|pt)\b\s*:?\s*\$?(\d+(?:\.\d+)?)"
        ))
        .context("compiling price target pattern")?;
        let target_weak = Regex::new(&format!(r"(?is)^.{{0,{n}}}?\bto\s+\$(\d+(?:\.\d+)?)"))
            .context("compiling implied target pattern")?;

        Ok(Self {
            buy: keyword_regex(&cfg.buy)?,
            sell: keyword_regex(&cfg.sell)?,
            hold: keyword_regex(&cfg.hold)?,
            topics: vec![
                (Signal::News, keyword_regex(&cfg.news)?),
                (Signal::Earnings, keyword_regex(&cfg.earnings)?),
                (Signal::Technical, keyword_regex(&cfg.technical)?),
                (Signal::Options, keyword_regex(&cfg.options)?),
            ],
            target_strong,
            target_weak,
        })
    }

    /// Tags for `ticker` in `text` (usually the context window around it).
    ///
    /// Only sentences naming `ticker` (or `$ticker`) are read, so a post that
    /// buys one symbol and sells another tags each mention with its own direction.
    pub fn extract(&self, text: &str, ticker: &str) -> BTreeSet<String> {
        let mut out: BTreeSet<String> = BTreeSet::new();
        if text.is_empty() {
            return out;
        }

        let sentences = RE_SENTENCE
            .split(text)
            .filter(|s| ticker_occurrences(s, ticker).next().is_some());
        for sentence in sentences {
            let direction = if matches(&self.buy, sentence) {
                Some(Signal::Buy)
            } else if matches(&self.sell, sentence) {
                Some(Signal::Sell)
            } else if matches(&self.hold, sentence) {
                Some(Signal::Hold)
            } else {
                None
            };
            if let Some(d) = direction {
                out.insert(d.as_tag());
            }
            for (sig, re) in &self.topics {
                if matches(re, sentence) {
                    out.insert(sig.as_tag());
                }
            }
        }

        if let Some(v) = self.price_target(text, ticker) {
            out.insert(Signal::PriceTarget(v).as_tag());
        }
        out
    }

    /// First price target stated after an occurrence of `ticker`.
    /// An explicit `price target`/`PT` phrase beats an implied `to $N` at the same occurrence.
    pub fn price_target(&self, text: &str, ticker: &str) -> Option<f64> {
        ticker_occurrences(text, ticker).find_map(|r| {
            let rest = &text[r.end..];
            self.target_strong
                .captures(rest)
                .or_else(|| self.target_weak.captures(rest))
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .filter(|v| v.is_finite())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ex() -> SignalExtractor {
        SignalExtractor::new(&SignalConfig::default()).unwrap()
    }

    fn tags(text: &str, ticker: &str) -> Vec<String> {
        ex().extract(text, ticker).into_iter().collect()
    }

    #[test]
    fn moon_post_is_buy_with_target() {
        let t = tags(
            "I think $AAPL is going to the moon! Buy more calls, PT $200",
            "AAPL",
        );
        assert!(t.contains(&"BUY".to_string()));
        assert!(t.contains(&"PT:200.0".to_string()));
        assert!(!t.contains(&"SELL".to_string()));
    }

    #[test]
    fn direction_is_exclusive_within_a_sentence() {
        assert_eq!(tags("bought AMD calls but might sell", "AMD"), vec!["BUY"]);
        assert_eq!(
            tags("Selling some AMD. Holding the rest of $AMD", "AMD"),
            vec!["HOLD", "SELL"]
        );
    }

    #[test]
    fn each_ticker_reads_its_own_sentences() {
        let text = "Buy AAPL now. Sell TSLA now. TSLA earnings next week";
        assert_eq!(tags(text, "AAPL"), vec!["BUY"]);
        assert_eq!(tags(text, "TSLA"), vec!["EARNINGS", "SELL"]);
        assert!(tags(text, "NVDA").is_empty());
    }

    #[test]
    fn keywords_need_word_boundaries() {
        // "sold" inside "soldier", "tank" inside "tanker".
        assert!(tags("the AMD soldier drove a tanker", "AMD").is_empty());
    }

    #[test]
    fn emoji_keywords_match_without_boundaries() {
        assert_eq!(tags("GME🚀🚀", "GME"), vec!["BUY"]);
    }

    #[test]
    fn topic_tags_are_independent() {
        let t = tags(
            "TSLA earnings beat, FDA unrelated, RSI oversold, strike 300",
            "TSLA",
        );
        for want in ["EARNINGS", "NEWS", "TECHNICAL", "OPTIONS"] {
            assert!(t.contains(&want.to_string()), "missing {want}");
        }
    }

    #[test]
    fn implied_target_and_lookahead_bound() {
        let e = ex();
        assert_eq!(e.price_target("NVDA going to $1200.50 soon", "NVDA"), Some(1200.5));
        let far = format!("NVDA {} price target 900", "z ".repeat(80));
        assert_eq!(e.price_target(&far, "NVDA"), None);
        assert_eq!(e.price_target("price target 900 for NVDA", "NVDA"), None);
    }

    #[test]
    fn first_target_wins() {
        let e = ex();
        assert_eq!(
            e.price_target("AMD PT 150, AMD target price 200", "AMD"),
            Some(150.0)
        );
        let t = e.extract("AMD PT 150, AMD target price 200", "AMD");
        assert_eq!(t.iter().filter(|s| s.starts_with("PT:")).count(), 1);
    }
}
