// src/extract/universe.rs
//! Ticker universe: the set of symbols an extracted candidate must belong to.
//!
//! The universe is loaded once through a fallback chain and then shared as an
//! immutable value. Every analyzer (and every worker) holds its own cheap clone.

use anyhow::{anyhow, Context, Result};
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::config::UniverseConfig;

/// Symbols tracked regardless of what the external feeds return.
pub const CORE_TICKERS: &[&str] = &[
    "AAPL", "MSFT", "GOOGL", "GOOG", "AMZN", "META", "TSLA", "NVDA", "AMD", "INTC", "GME", "AMC",
    "PLTR", "TLRY", "BB", "NOK", "SPY", "QQQ", "ARKK", "BABA", "NIO", "COIN", "HOOD", "SOFI",
    "LCID", "RIVN", "SNAP", "ABNB", "RBLX", "UBER",
];

pub const INDEX_TICKERS: &[&str] = &["SPY", "QQQ", "DIA", "IWM", "VTI"];

static RE_SYMBOL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{1,5}$").expect("symbol regex"));

pub fn is_valid_symbol(s: &str) -> bool {
    RE_SYMBOL.is_match(s)
}

/// Immutable set of valid symbols. Cloning shares the underlying set.
#[derive(Debug, Clone, Default)]
pub struct TickerUniverse {
    symbols: Arc<HashSet<String>>,
}

impl TickerUniverse {
    /// Keeps only 1-5 letter uppercase symbols (input is trimmed and uppercased first).
    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = symbols
            .into_iter()
            .map(|s| s.as_ref().trim().to_ascii_uppercase())
            .filter(|s| is_valid_symbol(s))
            .collect();
        Self {
            symbols: Arc::new(set),
        }
    }

    pub fn builtin() -> Self {
        Self::from_symbols(CORE_TICKERS.iter().chain(INDEX_TICKERS.iter()))
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains(symbol)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(String::as_str)
    }
}

/// External provider of ticker symbols, e.g. a volume-ranked warehouse query.
#[async_trait::async_trait]
pub trait UniverseSource: Send + Sync {
    /// Symbols in ranked order (most relevant first).
    async fn fetch(&self) -> Result<Vec<String>>;
    fn name(&self) -> &'static str;
}

/// Fixed list, useful for tests and for callers that already hold a symbol list.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    pub symbols: Vec<String>,
}

impl StaticSource {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            symbols: symbols.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait::async_trait]
impl UniverseSource for StaticSource {
    async fn fetch(&self) -> Result<Vec<String>> {
        Ok(self.symbols.clone())
    }
    fn name(&self) -> &'static str {
        "static"
    }
}

/// Exchange symbol directories (pipe-delimited `nasdaqlisted.txt` / `otherlisted.txt`).
pub struct SymbolDirectorySource {
    http: reqwest::Client,
    urls: Vec<String>,
}

impl SymbolDirectorySource {
    pub fn new(urls: Vec<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("stock-mention-engine/0.1")
            .timeout(timeout)
            .build()
            .context("building symbol directory http client")?;
        Ok(Self { http, urls })
    }

    pub fn from_config(cfg: &UniverseConfig) -> Result<Self> {
        Self::new(
            cfg.directory_urls.clone(),
            Duration::from_secs(cfg.http_timeout_secs),
        )
    }

    async fn fetch_one(&self, url: &str) -> Result<Vec<String>> {
        let body = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("status from {url}"))?
            .text()
            .await
            .with_context(|| format!("reading body of {url}"))?;
        Ok(parse_symbol_directory(&body))
    }
}

#[async_trait::async_trait]
impl UniverseSource for SymbolDirectorySource {
    async fn fetch(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for url in &self.urls {
            match self.fetch_one(url).await {
                Ok(mut v) => out.append(&mut v),
                Err(e) => tracing::warn!(target: "universe", error = ?e, url = %url, "symbol directory fetch failed"),
            }
        }
        if out.is_empty() {
            return Err(anyhow!("no symbols from any symbol directory"));
        }
        Ok(out)
    }
    fn name(&self) -> &'static str {
        "symbol_directory"
    }
}

/// Parse a pipe-delimited symbol directory: header row, data rows, `File Creation Time` footer.
/// Test issues and symbols outside `^[A-Z]{1,5}$` are dropped.
pub fn parse_symbol_directory(body: &str) -> Vec<String> {
    let mut lines = body.lines();
    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let test_col = header
        .split('|')
        .position(|h| h.trim().eq_ignore_ascii_case("Test Issue"));

    lines
        .filter(|l| !l.starts_with("File Creation Time") && !l.trim().is_empty())
        .filter_map(|l| {
            let cols: Vec<&str> = l.split('|').collect();
            if let Some(i) = test_col {
                if cols.get(i).map(|v| v.trim() == "Y").unwrap_or(false) {
                    return None;
                }
            }
            let sym = cols.first()?.trim();
            is_valid_symbol(sym).then(|| sym.to_string())
        })
        .collect()
}

/// Loads the universe: primary source (capped), then secondary sources in order,
/// then the built-in core set. Each step that fails or yields nothing is logged
/// and the next one is tried.
pub struct UniverseLoader {
    primary: Option<Box<dyn UniverseSource>>,
    fallbacks: Vec<Box<dyn UniverseSource>>,
    primary_limit: usize,
    builtin_fallback: bool,
}

impl UniverseLoader {
    pub fn new(cfg: &UniverseConfig) -> Self {
        Self {
            primary: None,
            fallbacks: Vec::new(),
            primary_limit: cfg.primary_limit.max(1),
            builtin_fallback: cfg.builtin_fallback,
        }
    }

    pub fn with_primary(mut self, src: Box<dyn UniverseSource>) -> Self {
        self.primary = Some(src);
        self
    }

    pub fn with_fallback(mut self, src: Box<dyn UniverseSource>) -> Self {
        self.fallbacks.push(src);
        self
    }

    /// Never fails; total exhaustion yields an empty universe and a warning.
    pub async fn load(&self) -> TickerUniverse {
        if let Some(p) = &self.primary {
            match p.fetch().await {
                Ok(v) => {
                    let u = TickerUniverse::from_symbols(v.into_iter().take(self.primary_limit));
                    if !u.is_empty() {
                        tracing::info!(target: "universe", source = p.name(), symbols = u.len(), "ticker universe loaded");
                        return u;
                    }
                    tracing::warn!(target: "universe", source = p.name(), "primary source returned no valid symbols");
                }
                Err(e) => {
                    tracing::warn!(target: "universe", error = ?e, source = p.name(), "primary universe source failed");
                }
            }
            counter!("mention_universe_fallbacks_total").increment(1);
        }

        for src in &self.fallbacks {
            match src.fetch().await {
                Ok(v) => {
                    let u = TickerUniverse::from_symbols(v);
                    if !u.is_empty() {
                        tracing::info!(target: "universe", source = src.name(), symbols = u.len(), "ticker universe loaded from fallback");
                        return u;
                    }
                    tracing::warn!(target: "universe", source = src.name(), "fallback source returned no valid symbols");
                }
                Err(e) => {
                    tracing::warn!(target: "universe", error = ?e, source = src.name(), "fallback universe source failed");
                }
            }
            counter!("mention_universe_fallbacks_total").increment(1);
        }

        if self.builtin_fallback {
            let u = TickerUniverse::builtin();
            tracing::info!(target: "universe", symbols = u.len(), "using built-in core tickers");
            return u;
        }

        tracing::warn!(target: "universe", "ticker universe is empty; no mentions will be extracted");
        TickerUniverse::empty()
    }
}
