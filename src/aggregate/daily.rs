// src/aggregate/daily.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::bucket::day_of;
use super::{
    merge_top_contexts, record_of, top_contexts, BucketStrategy, CategoryCounts, Granularity,
    Summary, SummaryCore, TopContext,
};
use crate::config::AggregationConfig;
use crate::mention::StockMention;
use crate::merge::MergePolicy;

/// Per-ticker summary for one UTC calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub ticker: String,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub core: SummaryCore,
    #[serde(flatten)]
    pub categories: CategoryCounts,
    pub top_contexts: Vec<TopContext>,
    pub etl_timestamp: DateTime<Utc>,
}

impl Summary for DailySummary {
    type Key = (String, NaiveDate);
    const GRANULARITY: Granularity = Granularity::Daily;

    fn key(&self) -> Self::Key {
        (self.ticker.clone(), self.date)
    }
    fn core(&self) -> &SummaryCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut SummaryCore {
        &mut self.core
    }

    fn absorb_details(&mut self, prior: &Self, policy: MergePolicy, top_n: usize) {
        self.categories.absorb(&prior.categories);
        if policy == MergePolicy::Reweighted {
            self.top_contexts = merge_top_contexts(&self.top_contexts, &prior.top_contexts, top_n);
        }
    }

    fn to_record(&self) -> Map<String, Value> {
        record_of(self)
    }
}

pub struct ByDay;

impl BucketStrategy for ByDay {
    type Bucket = NaiveDate;
    type Output = DailySummary;

    fn bucket(ts: &DateTime<Utc>) -> NaiveDate {
        day_of(ts)
    }

    fn summarize(
        ticker: &str,
        bucket: &NaiveDate,
        group: &[&StockMention],
        cfg: &AggregationConfig,
        etl_timestamp: DateTime<Utc>,
    ) -> DailySummary {
        DailySummary {
            ticker: ticker.to_string(),
            date: *bucket,
            core: SummaryCore::from_group(group, cfg),
            categories: CategoryCounts::from_group(group),
            top_contexts: top_contexts(group, cfg.top_contexts),
            etl_timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::mention;
    use super::super::DailyAggregator;
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn groups_by_ticker_and_utc_date() {
        let ms = vec![
            mention("AAPL", Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap(), 0.5, 0.8, &["BUY"]),
            mention("AAPL", Utc.with_ymd_and_hms(2024, 1, 1, 23, 55, 0).unwrap(), 0.1, 0.4, &[]),
            mention("AAPL", Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(), 0.3, 0.2, &[]),
            mention("TSLA", Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(), -0.3, 0.6, &["SELL"]),
        ];
        let out = DailyAggregator::new(AggregationConfig::default()).aggregate(&ms);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].ticker, "AAPL");
        assert_eq!(out[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(out[0].core.mention_count, 2);
        assert_eq!(out[0].core.buy_signals, 1);
        assert_eq!(out[0].top_contexts.len(), 2);
        assert_eq!(out[2].ticker, "TSLA");
    }

    #[test]
    fn record_is_flat_with_iso_date() {
        let ms = vec![mention(
            "NVDA",
            Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap(),
            0.4,
            0.9,
            &["PT:1000.0"],
        )];
        let out = DailyAggregator::new(AggregationConfig::default()).aggregate(&ms);
        let rec = out[0].to_record();
        assert_eq!(rec["date"], "2024-05-06");
        assert_eq!(rec["mention_count"], 1);
        assert_eq!(rec["price_targets"]["1000.0"], 1);
        assert!(rec.contains_key("top_contexts"));
    }

    #[test]
    fn empty_input_gives_no_summaries() {
        assert!(DailyAggregator::new(AggregationConfig::default())
            .aggregate(&[])
            .is_empty());
    }
}
