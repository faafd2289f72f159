// tests/extraction_properties.rs
use rand::seq::IndexedRandom;
use rand::Rng;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use stock_mention_engine::config::ExtractionConfig;
use stock_mention_engine::extract::tickers::{is_stopword, DEFAULT_EXCLUSIONS};
use stock_mention_engine::{
    DailyAggregator, EngineConfig, LexiconClassifier, MentionBuilder, MessageType, RawDocument,
    TickerExtractor, TickerUniverse,
};

fn universe() -> TickerUniverse {
    TickerUniverse::from_symbols([
        "AAPL", "MSFT", "TSLA", "GME", "AMC", "NVDA", "AMD", "PLTR", "SOFI", "COIN", "HOOD", "NIO",
        "SNAP", "UBER", "RBLX", "IT", "ALL", "ARE", "CEO",
    ])
}

#[test]
fn random_texts_respect_cap_and_filters() {
    let ex = TickerExtractor::new(universe(), ExtractionConfig::default());
    let vocab = [
        "AAPL", "$MSFT", "tsla", "GME", "AMC!", "NVDA,", "AMD", "PLTR", "SOFI", "COIN", "HOOD",
        "NIO", "SNAP", "UBER", "RBLX", "ZZZZ", "QQQQ", "IT", "ALL", "ARE", "CEO", "moon", "the",
        "🚀", "calls", "xAAPL", "AAPLx", "\n",
    ];
    let mut rng = rand::rng();
    for _ in 0..500 {
        let n = rng.random_range(0..60);
        let text: Vec<&str> = (0..n)
            .map(|_| *vocab.choose(&mut rng).unwrap_or(&"x"))
            .collect();
        let out = ex.extract(&text.join(" "));
        assert!(out.len() <= 10, "cap exceeded: {out:?}");
        for t in &out {
            assert!(ex.universe().contains(t), "{t} not in universe");
            assert!(!DEFAULT_EXCLUSIONS.contains(&t.as_str()), "{t} is excluded");
            assert!(!is_stopword(&t.to_ascii_lowercase()), "{t} is a stopword");
        }
        let mut dedup = out.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(dedup.len(), out.len());
    }
}

#[test]
fn shape_alone_is_not_enough() {
    let ex = TickerExtractor::new(universe(), ExtractionConfig::default());
    assert!(ex.extract("ZZZZ ZZZZ $ZZZZ").is_empty());
}

#[test]
fn text_beyond_scan_limit_is_ignored() {
    let ex = TickerExtractor::new(universe(), ExtractionConfig::default());
    let text = format!("{} NVDA", "a".repeat(2100));
    assert!(ex.extract(&text).is_empty());
}

#[test]
fn moon_post_end_to_end() {
    let builder = MentionBuilder::new(
        &EngineConfig::default(),
        universe(),
        Arc::new(LexiconClassifier::new()),
    )
    .unwrap();
    let doc = RawDocument {
        message_id: "t3_x".into(),
        content: Some("I think $AAPL is going to the moon! Buy more calls, PT $200".into()),
        title: None,
        author: "op".into(),
        created_at: Utc.with_ymd_and_hms(2024, 2, 1, 15, 0, 0).unwrap(),
        subreddit: "wallstreetbets".into(),
        url: String::new(),
        score: 100,
        message_type: MessageType::RedditPost,
    };
    let mentions = builder.build(&doc);
    let tickers: Vec<&str> = mentions.iter().map(|m| m.ticker.as_str()).collect();
    assert_eq!(tickers, vec!["AAPL"]);
    assert!(mentions[0].signals.contains("BUY"));

    let daily = DailyAggregator::new(EngineConfig::default().aggregation).aggregate(&mentions);
    assert_eq!(daily.len(), 1);
    assert_eq!(daily[0].categories.price_targets.get("200.0"), Some(&1));
}
