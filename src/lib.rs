// src/lib.rs
// Public library surface for the binary, integration tests and orchestrators.

pub mod aggregate;
pub mod analyzer;
pub mod batch;
pub mod config;
pub mod document;
pub mod extract;
pub mod mention;
pub mod merge;
pub mod metrics;
pub mod pipeline;
pub mod sentiment;

// ---- Re-exports for a stable public API ----
pub use aggregate::{
    aggregate_all, AllSummaries, DailyAggregator, DailySummary, Granularity, HourlyAggregator,
    HourlySummary, Summary, WeeklyAggregator, WeeklySummary,
};
pub use analyzer::{BatchOutput, MentionBuilder};
pub use batch::BatchAnalyzer;
pub use config::EngineConfig;
pub use document::{MessageType, RawDocument};
pub use extract::{TickerExtractor, TickerUniverse, UniverseLoader, UniverseSource};
pub use mention::{Signal, StockMention};
pub use merge::{IncrementalMerger, MergePolicy};
pub use pipeline::{
    DocumentSource, MemorySource, MemoryStore, Pipeline, RunOutput, RunReport, Stores,
    SummaryStore,
};
pub use sentiment::{
    CachingClassifier, Classification, Label, LexiconClassifier, NeutralClassifier,
    SentimentAdapter, SentimentClassifier,
};
