// src/aggregate/mod.rs
//! Group-by aggregation of mentions into per-ticker time-bucket summaries.
//!
//! One generic [`Aggregator`] is parameterized by a [`BucketStrategy`]
//! (day, hour or week). Shared statistics live in [`SummaryCore`]; daily and
//! weekly summaries add [`CategoryCounts`] and top contexts.

pub mod bucket;
pub mod daily;
pub mod hourly;
pub mod weekly;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::marker::PhantomData;

use crate::config::AggregationConfig;
use crate::mention::{format_price, Signal, StockMention};
use crate::merge::MergePolicy;

pub use daily::{ByDay, DailySummary};
pub use hourly::{ByHour, HourlySummary};
pub use weekly::{ByWeek, WeeklySummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Daily,
    Hourly,
    Weekly,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Daily => "daily",
            Granularity::Hourly => "hourly",
            Granularity::Weekly => "weekly",
        }
    }
}

/// Per-key histogram (subreddit -> count, price -> count, ...).
pub type Histogram = BTreeMap<String, u64>;

pub fn merge_histograms<K: Ord + Clone>(into: &mut BTreeMap<K, u64>, from: &BTreeMap<K, u64>) {
    for (k, v) in from {
        *into.entry(k.clone()).or_insert(0) += v;
    }
}

/// Statistics every granularity carries.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SummaryCore {
    pub mention_count: u64,
    pub avg_sentiment: f64,
    /// Confidence-weighted mean sentiment; equals `avg_sentiment` when all confidences are 0.
    pub weighted_sentiment: f64,
    pub buy_signals: u64,
    pub sell_signals: u64,
    pub hold_signals: u64,
    pub avg_confidence: f64,
    /// Mean sentiment of mentions above the high-confidence threshold.
    pub high_conf_sentiment: Option<f64>,
    pub subreddits: Histogram,
}

impl SummaryCore {
    /// `group` must not be empty.
    pub fn from_group(group: &[&StockMention], cfg: &AggregationConfig) -> Self {
        let n = group.len() as f64;
        let sum_sent: f64 = group.iter().map(|m| m.sentiment_compound).sum();
        let sum_conf: f64 = group.iter().map(|m| m.confidence).sum();
        let sum_weighted: f64 = group
            .iter()
            .map(|m| m.confidence * m.sentiment_compound)
            .sum();
        let avg_sentiment = sum_sent / n;
        let weighted_sentiment = if sum_conf > 0.0 {
            sum_weighted / sum_conf
        } else {
            avg_sentiment
        };

        let high: Vec<f64> = group
            .iter()
            .filter(|m| m.confidence > cfg.high_confidence_threshold)
            .map(|m| m.sentiment_compound)
            .collect();
        let high_conf_sentiment =
            (!high.is_empty()).then(|| high.iter().sum::<f64>() / high.len() as f64);

        let mut subreddits = Histogram::new();
        for m in group {
            *subreddits.entry(m.subreddit.clone()).or_insert(0) += 1;
        }

        Self {
            mention_count: group.len() as u64,
            avg_sentiment,
            weighted_sentiment,
            buy_signals: count_signal(group, Signal::Buy),
            sell_signals: count_signal(group, Signal::Sell),
            hold_signals: count_signal(group, Signal::Hold),
            avg_confidence: sum_conf / n,
            high_conf_sentiment,
            subreddits,
        }
    }

    /// Fold a previously persisted core into this (fresh) one.
    ///
    /// Counters and histograms are summed. With `reweight`, the averaged fields are
    /// recomputed over both populations; otherwise they keep the fresh values.
    pub fn absorb(&mut self, prior: &SummaryCore, reweight: bool) {
        if reweight {
            let n_new = self.mention_count as f64;
            let n_old = prior.mention_count as f64;
            let n = n_new + n_old;
            if n > 0.0 {
                let conf_new = self.avg_confidence * n_new;
                let conf_old = prior.avg_confidence * n_old;
                let conf = conf_new + conf_old;
                self.avg_sentiment =
                    (self.avg_sentiment * n_new + prior.avg_sentiment * n_old) / n;
                self.avg_confidence = conf / n;
                self.weighted_sentiment = if conf > 0.0 {
                    (self.weighted_sentiment * conf_new + prior.weighted_sentiment * conf_old)
                        / conf
                } else {
                    self.avg_sentiment
                };
            }
            if self.high_conf_sentiment.is_none() {
                self.high_conf_sentiment = prior.high_conf_sentiment;
            }
        }

        self.mention_count += prior.mention_count;
        self.buy_signals += prior.buy_signals;
        self.sell_signals += prior.sell_signals;
        self.hold_signals += prior.hold_signals;
        merge_histograms(&mut self.subreddits, &prior.subreddits);
    }
}

fn count_signal(group: &[&StockMention], s: Signal) -> u64 {
    let tag = s.as_tag();
    group.iter().filter(|m| m.signals.contains(&tag)).count() as u64
}

/// Topic tallies and the price-target histogram (daily and weekly only).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub news_signals: u64,
    pub earnings_signals: u64,
    pub technical_signals: u64,
    pub options_signals: u64,
    /// Stringified price (`"200.0"`) -> number of mentions carrying it.
    pub price_targets: Histogram,
}

impl CategoryCounts {
    pub fn from_group(group: &[&StockMention]) -> Self {
        let mut price_targets = Histogram::new();
        for m in group {
            for v in m.price_targets() {
                *price_targets.entry(format_price(v)).or_insert(0) += 1;
            }
        }
        Self {
            news_signals: count_signal(group, Signal::News),
            earnings_signals: count_signal(group, Signal::Earnings),
            technical_signals: count_signal(group, Signal::Technical),
            options_signals: count_signal(group, Signal::Options),
            price_targets,
        }
    }

    pub fn absorb(&mut self, prior: &CategoryCounts) {
        self.news_signals += prior.news_signals;
        self.earnings_signals += prior.earnings_signals;
        self.technical_signals += prior.technical_signals;
        self.options_signals += prior.options_signals;
        merge_histograms(&mut self.price_targets, &prior.price_targets);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopContext {
    pub context: String,
    pub confidence: f64,
    pub sentiment: f64,
}

/// The `n` highest-confidence mentions. Ties keep input order.
pub fn top_contexts(group: &[&StockMention], n: usize) -> Vec<TopContext> {
    let mut ranked: Vec<&StockMention> = group.to_vec();
    ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    ranked
        .into_iter()
        .take(n)
        .map(|m| TopContext {
            context: m.context.clone(),
            confidence: m.confidence,
            sentiment: m.sentiment_compound,
        })
        .collect()
}

/// Re-rank two context lists together.
pub fn merge_top_contexts(fresh: &[TopContext], prior: &[TopContext], n: usize) -> Vec<TopContext> {
    let mut all: Vec<TopContext> = fresh.iter().chain(prior.iter()).cloned().collect();
    all.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    all.truncate(n);
    all
}

/// A persisted-shape summary that can be merged with its predecessor.
pub trait Summary: Clone + Debug + Send + Sync {
    type Key: Ord + Clone + Debug + Send + Sync;
    const GRANULARITY: Granularity;

    fn key(&self) -> Self::Key;
    fn core(&self) -> &SummaryCore;
    fn core_mut(&mut self) -> &mut SummaryCore;

    /// Fold granularity-specific fields (topic tallies, histograms, contexts) from `prior`.
    fn absorb_details(&mut self, _prior: &Self, _policy: MergePolicy, _top_n: usize) {}

    fn to_record(&self) -> Map<String, Value>;
}

pub(crate) fn record_of<T: Serialize>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(m)) => m,
        _ => Map::new(),
    }
}

/// Time-bucket function plus the summary it produces.
pub trait BucketStrategy {
    type Bucket: Ord + Clone;
    type Output: Summary;

    fn bucket(ts: &DateTime<Utc>) -> Self::Bucket;
    fn summarize(
        ticker: &str,
        bucket: &Self::Bucket,
        group: &[&StockMention],
        cfg: &AggregationConfig,
        etl_timestamp: DateTime<Utc>,
    ) -> Self::Output;
}

pub struct Aggregator<S: BucketStrategy> {
    cfg: AggregationConfig,
    _strategy: PhantomData<S>,
}

pub type DailyAggregator = Aggregator<ByDay>;
pub type HourlyAggregator = Aggregator<ByHour>;
pub type WeeklyAggregator = Aggregator<ByWeek>;

impl<S: BucketStrategy> Aggregator<S> {
    pub fn new(cfg: AggregationConfig) -> Self {
        Self {
            cfg,
            _strategy: PhantomData,
        }
    }

    /// One summary per (ticker, bucket), ordered by ticker then bucket.
    pub fn aggregate(&self, mentions: &[StockMention]) -> Vec<S::Output> {
        if mentions.is_empty() {
            return Vec::new();
        }
        let etl_timestamp = Utc::now();
        let mut groups: BTreeMap<(String, S::Bucket), Vec<&StockMention>> = BTreeMap::new();
        for m in mentions {
            groups
                .entry((m.ticker.clone(), S::bucket(&m.created_at)))
                .or_default()
                .push(m);
        }

        let out: Vec<S::Output> = groups
            .iter()
            .map(|((ticker, bucket), group)| {
                S::summarize(ticker, bucket, group, &self.cfg, etl_timestamp)
            })
            .collect();

        let granularity = <S::Output as Summary>::GRANULARITY.as_str();
        counter!("summary_generated_total", "granularity" => granularity)
            .increment(out.len() as u64);
        tracing::debug!(
            target: "aggregate",
            granularity,
            mentions = mentions.len(),
            summaries = out.len(),
            "aggregated"
        );
        out
    }
}

/// Output of all three granularities over the same mention list.
#[derive(Debug, Clone, Default)]
pub struct AllSummaries {
    pub daily: Vec<DailySummary>,
    pub hourly: Vec<HourlySummary>,
    pub weekly: Vec<WeeklySummary>,
}

/// Runs the three aggregators concurrently; they only read `mentions`.
pub fn aggregate_all(mentions: &[StockMention], cfg: &AggregationConfig) -> AllSummaries {
    let (daily, (hourly, weekly)) = rayon::join(
        || DailyAggregator::new(*cfg).aggregate(mentions),
        || {
            rayon::join(
                || HourlyAggregator::new(*cfg).aggregate(mentions),
                || WeeklyAggregator::new(*cfg).aggregate(mentions),
            )
        },
    );
    AllSummaries {
        daily,
        hourly,
        weekly,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::document::MessageType;
    use crate::mention::StockMention;
    use chrono::{DateTime, Utc};
    use std::collections::BTreeSet;

    pub fn mention(
        ticker: &str,
        at: DateTime<Utc>,
        sentiment: f64,
        confidence: f64,
        tags: &[&str],
    ) -> StockMention {
        StockMention {
            message_id: format!("{ticker}-{}-{sentiment}-{confidence}", at.timestamp()),
            ticker: ticker.into(),
            author: "a".into(),
            created_at: at,
            subreddit: "stocks".into(),
            url: String::new(),
            score: 10,
            message_type: MessageType::RedditComment,
            sentiment_compound: sentiment,
            sentiment_positive: sentiment.max(0.0),
            sentiment_negative: (-sentiment).max(0.0),
            sentiment_neutral: 0.0,
            signals: tags.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            context: format!("ctx {confidence}"),
            confidence,
            etl_timestamp: at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::mention;
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn weighted_sentiment_uses_confidence() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
        let ms = [
            mention("AAPL", at, 0.8, 0.9, &[]),
            mention("AAPL", at, -0.2, 0.5, &[]),
            mention("AAPL", at, 0.1, 0.3, &[]),
        ];
        let refs: Vec<&StockMention> = ms.iter().collect();
        let core = SummaryCore::from_group(&refs, &AggregationConfig::default());
        assert_eq!(core.mention_count, 3);
        assert!((core.weighted_sentiment - 0.382).abs() < 0.001);
        assert!((core.avg_sentiment - 0.2333).abs() < 0.001);
        assert_eq!(core.high_conf_sentiment, Some(0.8));
    }

    #[test]
    fn zero_confidence_falls_back_to_mean() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
        let ms = [mention("X", at, 0.4, 0.0, &[]), mention("X", at, 0.0, 0.0, &[])];
        let refs: Vec<&StockMention> = ms.iter().collect();
        let core = SummaryCore::from_group(&refs, &AggregationConfig::default());
        assert_eq!(core.weighted_sentiment, core.avg_sentiment);
        assert_eq!(core.high_conf_sentiment, None);
    }

    #[test]
    fn signal_and_price_tallies() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
        let ms = [
            mention("X", at, 0.1, 0.2, &["BUY", "PT:200.0", "OPTIONS"]),
            mention("X", at, 0.1, 0.2, &["BUY", "PT:200.0"]),
            mention("X", at, 0.1, 0.2, &["SELL", "PT:150.5", "NEWS"]),
        ];
        let refs: Vec<&StockMention> = ms.iter().collect();
        let core = SummaryCore::from_group(&refs, &AggregationConfig::default());
        let cats = CategoryCounts::from_group(&refs);
        assert_eq!((core.buy_signals, core.sell_signals, core.hold_signals), (2, 1, 0));
        assert_eq!((cats.options_signals, cats.news_signals), (1, 1));
        assert_eq!(cats.price_targets.get("200.0"), Some(&2));
        assert_eq!(cats.price_targets.get("150.5"), Some(&1));
    }

    #[test]
    fn top_contexts_ranked_by_confidence() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
        let ms: Vec<StockMention> = [0.2, 0.9, 0.5, 0.7]
            .iter()
            .map(|&c| mention("X", at, 0.0, c, &[]))
            .collect();
        let refs: Vec<&StockMention> = ms.iter().collect();
        let top = top_contexts(&refs, 3);
        let confs: Vec<f64> = top.iter().map(|t| t.confidence).collect();
        assert_eq!(confs, vec![0.9, 0.7, 0.5]);
    }

    #[test]
    fn reweighted_absorb_recombines_populations() {
        let mut fresh = SummaryCore {
            mention_count: 2,
            avg_sentiment: 0.5,
            weighted_sentiment: 0.6,
            avg_confidence: 0.5,
            ..SummaryCore::default()
        };
        let prior = SummaryCore {
            mention_count: 2,
            avg_sentiment: -0.5,
            weighted_sentiment: -0.4,
            avg_confidence: 0.5,
            high_conf_sentiment: Some(0.3),
            ..SummaryCore::default()
        };
        fresh.absorb(&prior, true);
        assert_eq!(fresh.mention_count, 4);
        assert!(fresh.avg_sentiment.abs() < 1e-12);
        assert!((fresh.weighted_sentiment - 0.1).abs() < 1e-12);
        assert_eq!(fresh.high_conf_sentiment, Some(0.3));
    }
}
