// tests/metrics_exposition.rs
#![cfg(feature = "strict-metrics")]
use chrono::{TimeZone, Utc};
use std::sync::Arc;

use stock_mention_engine::metrics::install_prometheus;
use stock_mention_engine::pipeline::MemoryStore;
use stock_mention_engine::{
    DailySummary, EngineConfig, HourlySummary, LexiconClassifier, MemorySource, MentionBuilder,
    MessageType, Pipeline, RawDocument, Stores, TickerUniverse, WeeklySummary,
};

#[tokio::test]
async fn metrics_exposed_after_run() {
    let handle = install_prometheus().expect("recorder");

    let builder = MentionBuilder::new(
        &EngineConfig::default(),
        TickerUniverse::builtin(),
        Arc::new(LexiconClassifier::new()),
    )
    .unwrap();
    let pipeline = Pipeline::new(EngineConfig::default(), builder);
    let source = MemorySource::new(vec![RawDocument {
        message_id: "c1".into(),
        content: Some("NVDA calls printing, bullish".into()),
        title: None,
        author: "a".into(),
        created_at: Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap(),
        subreddit: "options".into(),
        url: String::new(),
        score: 12,
        message_type: MessageType::RedditComment,
    }]);
    let daily = MemoryStore::<DailySummary>::new();
    let hourly = MemoryStore::<HourlySummary>::new();
    let weekly = MemoryStore::<WeeklySummary>::new();
    let stores = Stores {
        daily: &daily,
        hourly: &hourly,
        weekly: &weekly,
    };
    pipeline.run_once(&source, &stores, None).await.unwrap();

    let out = handle.render();
    for needle in [
        "mention_documents_total",
        "mention_extracted_total",
        "summary_generated_total",
        "mention_batch_ms",
    ] {
        assert!(out.contains(needle), "missing {needle} in:\n{out}");
    }
}
