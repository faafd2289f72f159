//! Demo: run the engine over a JSON-lines file of documents in two increments.
//! The first run sees the older half; the second sees only documents newer than
//! the first run's watermark and merges against the summaries it persisted.
//!
//! Usage: `mention_demo [path/to/documents.jsonl]` (default `demos/documents.jsonl`).
//! Env: `LOG_FORMAT=json`, `RUST_LOG`, `PRINT_METRICS=1`, `MENTION_FETCH_DIRECTORY=1`,
//! `STOCK_MENTION_CONFIG`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stock_mention_engine::extract::SymbolDirectorySource;
use stock_mention_engine::sentiment::DynClassifier;
use stock_mention_engine::{
    CachingClassifier, DailySummary, EngineConfig, HourlySummary, LexiconClassifier,
    MemorySource, MemoryStore, Pipeline, RawDocument, Stores, Summary, UniverseLoader,
    WeeklySummary,
};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(true))
            .init();
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| v == "1")
}

fn read_documents(path: &str) -> Result<Vec<RawDocument>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let mut docs = Vec::new();
    for (i, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RawDocument>(line) {
            Ok(d) => docs.push(d),
            Err(e) => tracing::warn!(line = i + 1, error = %e, "skipping malformed document line"),
        }
    }
    Ok(docs)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let prom = if env_flag("PRINT_METRICS") {
        Some(stock_mention_engine::metrics::install_prometheus()?)
    } else {
        None
    };

    let cfg = EngineConfig::load_default()?;
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "demos/documents.jsonl".to_string());
    let mut docs = read_documents(&path)?;
    docs.sort_by_key(|d| d.created_at);
    // Everything up to the median timestamp counts as already processed.
    let watermark = docs.len().checked_sub(1).map(|last| docs[last / 2].created_at);
    let earlier = MemorySource::new(
        docs.iter()
            .filter(|d| watermark.is_some_and(|w| d.created_at <= w))
            .cloned()
            .collect(),
    );

    let mut loader = UniverseLoader::new(&cfg.universe);
    if env_flag("MENTION_FETCH_DIRECTORY") {
        loader = loader.with_fallback(Box::new(SymbolDirectorySource::from_config(&cfg.universe)?));
    }
    let classifier: DynClassifier = Arc::new(CachingClassifier::new(
        LexiconClassifier::new(),
        cfg.sentiment.cache_capacity,
    ));
    let pipeline = Pipeline::bootstrap(cfg, &loader, classifier).await?;

    let daily = MemoryStore::<DailySummary>::new();
    let hourly = MemoryStore::<HourlySummary>::new();
    let weekly = MemoryStore::<WeeklySummary>::new();
    let everything = MemorySource::new(docs);

    let runs: [(&MemorySource, Option<DateTime<Utc>>); 2] =
        [(&earlier, None), (&everything, watermark)];
    for (run, (source, since)) in runs.into_iter().enumerate() {
        let stores = Stores {
            daily: &daily,
            hourly: &hourly,
            weekly: &weekly,
        };
        let out = pipeline.run_once(source, &stores, since).await?;
        println!("run {}: {}", run + 1, serde_json::to_string(&out.report)?);

        // Persisting is the caller's job; upsert by key.
        daily.upsert(out.daily).await;
        hourly.upsert(out.hourly).await;
        weekly.upsert(out.weekly).await;
    }

    for s in weekly.all().await {
        println!("{}", serde_json::Value::Object(s.to_record()));
    }

    if let Some(h) = prom {
        println!("{}", h.render());
    }
    println!("mention-demo done");
    Ok(())
}
