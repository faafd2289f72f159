// src/mention.rs
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

use crate::document::MessageType;

pub const PRICE_TARGET_PREFIX: &str = "PT:";

/// Tag taxonomy attached to a mention. `PriceTarget` renders as `PT:<value>`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
    News,
    Earnings,
    Technical,
    Options,
    PriceTarget(f64),
}

impl Signal {
    pub fn as_tag(&self) -> String {
        match self {
            Signal::Buy => "BUY".into(),
            Signal::Sell => "SELL".into(),
            Signal::Hold => "HOLD".into(),
            Signal::News => "NEWS".into(),
            Signal::Earnings => "EARNINGS".into(),
            Signal::Technical => "TECHNICAL".into(),
            Signal::Options => "OPTIONS".into(),
            Signal::PriceTarget(v) => format!("{PRICE_TARGET_PREFIX}{}", format_price(*v)),
        }
    }

    pub fn parse_tag(tag: &str) -> Option<Signal> {
        Some(match tag {
            "BUY" => Signal::Buy,
            "SELL" => Signal::Sell,
            "HOLD" => Signal::Hold,
            "NEWS" => Signal::News,
            "EARNINGS" => Signal::Earnings,
            "TECHNICAL" => Signal::Technical,
            "OPTIONS" => Signal::Options,
            other => {
                let v: f64 = other.strip_prefix(PRICE_TARGET_PREFIX)?.parse().ok()?;
                if !v.is_finite() {
                    return None;
                }
                Signal::PriceTarget(v)
            }
        })
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_tag())
    }
}

/// Price rendered with at least one decimal place: `200` -> `"200.0"`, `12.5` -> `"12.5"`.
/// Used both for `PT:` tags and as the key of the `price_targets` histogram.
pub fn format_price(v: f64) -> String {
    format!("{v:?}")
}

/// One (document, ticker) occurrence. Identified by `(message_id, ticker)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMention {
    pub message_id: String,
    pub ticker: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub subreddit: String,
    pub url: String,
    pub score: i64,
    pub message_type: MessageType,
    pub sentiment_compound: f64,
    pub sentiment_positive: f64,
    pub sentiment_negative: f64,
    pub sentiment_neutral: f64,
    pub signals: BTreeSet<String>,
    pub context: String,
    pub confidence: f64,
    pub etl_timestamp: DateTime<Utc>,
}

impl StockMention {
    pub fn key(&self) -> (&str, &str) {
        (&self.message_id, &self.ticker)
    }

    pub fn has_signal(&self, s: Signal) -> bool {
        self.signals.contains(&s.as_tag())
    }

    /// Numeric values of every `PT:` tag on this mention.
    pub fn price_targets(&self) -> impl Iterator<Item = f64> + '_ {
        self.signals.iter().filter_map(|t| match Signal::parse_tag(t) {
            Some(Signal::PriceTarget(v)) => Some(v),
            _ => None,
        })
    }

    pub fn to_record(&self) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("message_id".into(), self.message_id.clone().into());
        m.insert("ticker".into(), self.ticker.clone().into());
        m.insert("author".into(), self.author.clone().into());
        m.insert("created_at".into(), rfc3339(&self.created_at).into());
        m.insert("subreddit".into(), self.subreddit.clone().into());
        m.insert("url".into(), self.url.clone().into());
        m.insert("score".into(), self.score.into());
        m.insert("message_type".into(), self.message_type.as_str().into());
        m.insert("sentiment_compound".into(), self.sentiment_compound.into());
        m.insert("sentiment_positive".into(), self.sentiment_positive.into());
        m.insert("sentiment_negative".into(), self.sentiment_negative.into());
        m.insert("sentiment_neutral".into(), self.sentiment_neutral.into());
        m.insert(
            "signals".into(),
            Value::Array(self.signals.iter().cloned().map(Value::String).collect()),
        );
        m.insert("context".into(), self.context.clone().into());
        m.insert("confidence".into(), self.confidence.into());
        m.insert("etl_timestamp".into(), rfc3339(&self.etl_timestamp).into());
        m
    }
}

pub(crate) fn rfc3339(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}
