// src/analyzer.rs
//! MentionBuilder: documents in, stock mentions out.
//!
//! Per document: combined text -> tickers -> context window per ticker. All
//! contexts of a batch go through the sentiment classifier in one call, then
//! signals and confidence are attached per (document, ticker).

use anyhow::Result;
use chrono::Utc;
use metrics::counter;

use crate::config::{ContextConfig, EngineConfig};
use crate::document::{truncate_chars, RawDocument};
use crate::extract::{
    extract_context, ConfidenceScorer, ScoreInputs, SignalExtractor, TickerExtractor,
    TickerUniverse,
};
use crate::mention::StockMention;
use crate::sentiment::{DynClassifier, SentimentAdapter};

/// Mentions produced from one batch plus document accounting.
#[derive(Debug, Clone, Default)]
pub struct BatchOutput {
    pub mentions: Vec<StockMention>,
    pub documents: usize,
    pub skipped: usize,
}

impl BatchOutput {
    pub fn extend(&mut self, other: BatchOutput) {
        self.mentions.extend(other.mentions);
        self.documents += other.documents;
        self.skipped += other.skipped;
    }
}

struct Pending<'a> {
    doc: &'a RawDocument,
    ticker: String,
    /// Text fed to the classifier and the signal rules.
    segment: String,
}

/// Owns everything needed to analyze a batch. Cloning is cheap: the universe and
/// classifier are shared, the compiled patterns are reference-counted by `regex`.
#[derive(Clone)]
pub struct MentionBuilder {
    tickers: TickerExtractor,
    signals: SignalExtractor,
    scorer: ConfidenceScorer,
    sentiment: SentimentAdapter,
    context: ContextConfig,
}

impl MentionBuilder {
    pub fn new(
        cfg: &EngineConfig,
        universe: TickerUniverse,
        classifier: DynClassifier,
    ) -> Result<Self> {
        if universe.is_empty() {
            tracing::warn!(target: "extract", "analyzer built with an empty ticker universe");
        }
        Ok(Self {
            tickers: TickerExtractor::new(universe, cfg.extraction.clone()),
            signals: SignalExtractor::new(&cfg.signals)?,
            scorer: ConfidenceScorer::new(cfg.confidence),
            sentiment: SentimentAdapter::new(classifier, cfg.sentiment.max_chars),
            context: cfg.context.clone(),
        })
    }

    pub fn analyze(&self, docs: &[RawDocument]) -> BatchOutput {
        let etl_timestamp = Utc::now();
        let mut skipped = 0usize;
        let mut pending: Vec<Pending<'_>> = Vec::new();

        for doc in docs {
            let text = doc.combined_text();
            if text.is_empty() {
                skipped += 1;
                tracing::debug!(target: "extract", message_id = %doc.message_id, "skipping document without text");
                continue;
            }
            for ticker in self.tickers.extract(&text) {
                let ctx = extract_context(&text, &ticker, &self.context);
                let segment = if ctx.is_empty() {
                    truncate_chars(&text, self.context.stored_chars).to_string()
                } else {
                    ctx
                };
                pending.push(Pending {
                    doc,
                    ticker,
                    segment,
                });
            }
        }

        let segments: Vec<&str> = pending.iter().map(|p| p.segment.as_str()).collect();
        let scores = self.sentiment.score_batch(&segments);

        let mentions: Vec<StockMention> = pending
            .iter()
            .zip(scores)
            .map(|(p, s)| {
                let signals = self.signals.extract(&p.segment, &p.ticker);
                let confidence = self
                    .scorer
                    .score(&ScoreInputs::new(s.compound, p.doc.score));
                StockMention {
                    message_id: p.doc.message_id.clone(),
                    ticker: p.ticker.clone(),
                    author: p.doc.author.clone(),
                    created_at: p.doc.created_at,
                    subreddit: p.doc.subreddit.clone(),
                    url: p.doc.url.clone(),
                    score: p.doc.score,
                    message_type: p.doc.message_type,
                    sentiment_compound: s.compound,
                    sentiment_positive: s.positive,
                    sentiment_negative: s.negative,
                    sentiment_neutral: s.neutral,
                    signals,
                    context: truncate_chars(&p.segment, self.context.stored_chars).to_string(),
                    confidence,
                    etl_timestamp,
                }
            })
            .collect();

        counter!("mention_documents_total").increment(docs.len() as u64);
        counter!("mention_documents_skipped_total").increment(skipped as u64);
        counter!("mention_extracted_total").increment(mentions.len() as u64);

        BatchOutput {
            mentions,
            documents: docs.len(),
            skipped,
        }
    }

    /// Mentions for a single document.
    pub fn build(&self, doc: &RawDocument) -> Vec<StockMention> {
        self.analyze(std::slice::from_ref(doc)).mentions
    }
}
