// src/extract/mod.rs
//! Leaf extractors: tickers, signals, context windows and confidence.

pub mod confidence;
pub mod context;
pub mod signals;
pub mod tickers;
pub mod universe;

pub use confidence::{ConfidenceScorer, ScoreInputs};
pub use context::extract_context;
pub use signals::SignalExtractor;
pub use tickers::TickerExtractor;
pub use universe::{SymbolDirectorySource, TickerUniverse, UniverseLoader, UniverseSource};
