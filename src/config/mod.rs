// src/config/mod.rs
pub mod engine;

pub use engine::{
    AggregationConfig, BatchConfig, ConfidenceConfig, ContextConfig, EngineConfig,
    ExtractionConfig, MergeConfig, SentimentConfig, SignalConfig, UniverseConfig,
};
