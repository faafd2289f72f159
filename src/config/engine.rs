// src/config/engine.rs
//! Engine configuration: extraction limits, keyword sets, batch sizing, merge policy.
//!
//! Every field has a default, so partial TOML/JSON files are fine. After parsing,
//! `sanitize()` repairs values that would break invariants (zero sizes, weights
//! whose sum exceeds one, inverted length bounds).

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::merge::MergePolicy;

pub const ENV_CONFIG_PATH: &str = "STOCK_MENTION_CONFIG";
pub const DEFAULT_TOML_PATH: &str = "config/engine.toml";
pub const DEFAULT_JSON_PATH: &str = "config/engine.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub extraction: ExtractionConfig,
    pub context: ContextConfig,
    pub signals: SignalConfig,
    pub confidence: ConfidenceConfig,
    pub aggregation: AggregationConfig,
    pub batch: BatchConfig,
    pub universe: UniverseConfig,
    pub sentiment: SentimentConfig,
    pub merge: MergeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Text is cut to this many chars before scanning.
    pub max_text_chars: usize,
    pub max_tickers: usize,
    pub min_len: usize,
    pub max_len: usize,
    /// Only accept tokens written in capitals (`AAPL`, not `aapl`).
    pub uppercase_only: bool,
    /// Added on top of the built-in false-positive acronyms.
    pub extra_exclusions: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_text_chars: 2000,
            max_tickers: 10,
            min_len: 2,
            max_len: 5,
            uppercase_only: false,
            extra_exclusions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub window_size: usize,
    pub max_occurrences: usize,
    pub separator: String,
    /// Length of the snippet kept on the mention record.
    pub stored_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            window_size: 150,
            max_occurrences: 3,
            separator: " ... ".to_string(),
            stored_chars: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub buy: Vec<String>,
    pub sell: Vec<String>,
    pub hold: Vec<String>,
    pub news: Vec<String>,
    pub earnings: Vec<String>,
    pub technical: Vec<String>,
    pub options: Vec<String>,
    /// Max chars between the ticker and a price-target phrase.
    pub price_target_lookahead: usize,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            buy: words(&[
                "buy", "bought", "buying", "long", "calls", "bullish", "moon", "rocket", "🚀",
                "💎", "🙌", "going up", "to the moon", "undervalued", "cheap", "discount",
            ]),
            sell: words(&[
                "sell", "selling", "sold", "short", "puts", "bearish", "crash", "dump", "tank",
                "dropping", "overvalued", "expensive", "bubble", "correction", "margin call",
            ]),
            hold: words(&[
                "hold", "holding", "hodl", "diamond hands", "patient", "patience", "long term",
                "longterm",
            ]),
            news: words(&[
                "news", "announcement", "released", "launched", "partnership", "acquisition",
                "merger", "FDA", "approval", "patent", "lawsuit",
            ]),
            earnings: words(&[
                "earnings", "revenue", "growth", "profit", "loss", "guidance", "forecast", "EPS",
                "P/E", "dividend",
            ]),
            technical: words(&[
                "resistance", "support", "trend", "breakout", "pattern", "cup", "handle", "head",
                "shoulders", "triangle", "wedge", "channel", "RSI", "MACD", "oversold",
                "overbought",
            ]),
            options: words(&[
                "option", "call", "put", "strike", "expiry", "contracts", "leaps", "covered",
                "naked", "straddle", "strangle", "iron condor", "spread",
            ]),
            price_target_lookahead: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    pub sentiment_weight: f64,
    pub engagement_weight: f64,
    /// `ln(|score| + 1) / divisor`, capped at 1.0.
    pub engagement_log_divisor: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            sentiment_weight: 0.7,
            engagement_weight: 0.3,
            engagement_log_divisor: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Mentions strictly above this feed `high_conf_sentiment`.
    pub high_confidence_threshold: f64,
    pub top_contexts: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            high_confidence_threshold: 0.7,
            top_contexts: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub batch_size: usize,
    /// Cores left free for the orchestrating process.
    pub reserve_cores: usize,
    pub max_workers: Option<usize>,
    /// Below this many documents everything runs on the calling thread.
    pub parallel_threshold: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            reserve_cores: 1,
            max_workers: None,
            parallel_threshold: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseConfig {
    /// Cap applied to the volume-ranked primary source.
    pub primary_limit: usize,
    pub builtin_fallback: bool,
    pub directory_urls: Vec<String>,
    pub http_timeout_secs: u64,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            primary_limit: 1000,
            builtin_fallback: true,
            directory_urls: vec![
                "https://www.nasdaqtrader.com/dynamic/SymDir/nasdaqlisted.txt".to_string(),
                "https://www.nasdaqtrader.com/dynamic/SymDir/otherlisted.txt".to_string(),
            ],
            http_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    /// Texts are cut to this many chars before classification.
    pub max_chars: usize,
    /// 0 disables the result cache.
    pub cache_capacity: usize,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            max_chars: 512,
            cache_capacity: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub daily: MergePolicy,
    pub hourly: MergePolicy,
    pub weekly: MergePolicy,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            daily: MergePolicy::Replace,
            hourly: MergePolicy::Additive,
            weekly: MergePolicy::Additive,
        }
    }
}

impl EngineConfig {
    /// Load from an explicit path. `.json` is parsed as JSON, anything else as TOML.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading engine config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg: EngineConfig = if ext == "json" {
            serde_json::from_str(&content)
                .with_context(|| format!("parsing JSON config {}", path.display()))?
        } else {
            toml::from_str(&content)
                .with_context(|| format!("parsing TOML config {}", path.display()))?
        };
        Ok(cfg.sanitize())
    }

    /// Resolve config using env var + fallbacks:
    /// 1) $STOCK_MENTION_CONFIG
    /// 2) config/engine.toml
    /// 3) config/engine.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        for candidate in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
            let pb = PathBuf::from(candidate);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        Ok(Self::default())
    }

    pub fn sanitize(mut self) -> Self {
        let ex = &mut self.extraction;
        ex.max_text_chars = ex.max_text_chars.max(1);
        ex.max_tickers = ex.max_tickers.max(1);
        ex.min_len = ex.min_len.max(1);
        if ex.min_len > ex.max_len {
            std::mem::swap(&mut ex.min_len, &mut ex.max_len);
        }

        let ctx = &mut self.context;
        ctx.window_size = ctx.window_size.max(1);
        ctx.max_occurrences = ctx.max_occurrences.max(1);
        ctx.stored_chars = ctx.stored_chars.max(1);

        let c = &mut self.confidence;
        c.sentiment_weight = clamp01(c.sentiment_weight);
        c.engagement_weight = clamp01(c.engagement_weight);
        let sum = c.sentiment_weight + c.engagement_weight;
        if sum > 1.0 {
            c.sentiment_weight /= sum;
            c.engagement_weight /= sum;
        }
        if !(c.engagement_log_divisor > 0.0) {
            c.engagement_log_divisor = ConfidenceConfig::default().engagement_log_divisor;
        }

        let a = &mut self.aggregation;
        a.high_confidence_threshold = clamp01(a.high_confidence_threshold);
        a.top_contexts = a.top_contexts.max(1);

        let b = &mut self.batch;
        b.batch_size = b.batch_size.max(1);
        if let Some(m) = b.max_workers {
            b.max_workers = Some(m.max(1));
        }

        self.sentiment.max_chars = self.sentiment.max_chars.max(1);
        self
    }
}

fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}
