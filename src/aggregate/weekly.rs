// src/aggregate/weekly.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::bucket::{day_of, week_of};
use super::{
    merge_histograms, merge_top_contexts, record_of, top_contexts, BucketStrategy,
    CategoryCounts, Granularity, Summary, SummaryCore, TopContext,
};
use crate::config::AggregationConfig;
use crate::mention::StockMention;
use crate::merge::MergePolicy;

/// Per-ticker summary for one ISO week (Monday 00:00 UTC onward).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySummary {
    pub ticker: String,
    pub week_start: DateTime<Utc>,
    #[serde(flatten)]
    pub core: SummaryCore,
    #[serde(flatten)]
    pub categories: CategoryCounts,
    pub top_contexts: Vec<TopContext>,
    /// Mentions per calendar date within the week.
    pub daily_breakdown: BTreeMap<NaiveDate, u64>,
    pub etl_timestamp: DateTime<Utc>,
}

impl Summary for WeeklySummary {
    type Key = (String, DateTime<Utc>);
    const GRANULARITY: Granularity = Granularity::Weekly;

    fn key(&self) -> Self::Key {
        (self.ticker.clone(), self.week_start)
    }
    fn core(&self) -> &SummaryCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut SummaryCore {
        &mut self.core
    }

    fn absorb_details(&mut self, prior: &Self, policy: MergePolicy, top_n: usize) {
        self.categories.absorb(&prior.categories);
        merge_histograms(&mut self.daily_breakdown, &prior.daily_breakdown);
        if policy == MergePolicy::Reweighted {
            self.top_contexts = merge_top_contexts(&self.top_contexts, &prior.top_contexts, top_n);
        }
    }

    fn to_record(&self) -> Map<String, Value> {
        record_of(self)
    }
}

pub struct ByWeek;

impl BucketStrategy for ByWeek {
    type Bucket = DateTime<Utc>;
    type Output = WeeklySummary;

    fn bucket(ts: &DateTime<Utc>) -> DateTime<Utc> {
        week_of(ts)
    }

    fn summarize(
        ticker: &str,
        bucket: &DateTime<Utc>,
        group: &[&StockMention],
        cfg: &AggregationConfig,
        etl_timestamp: DateTime<Utc>,
    ) -> WeeklySummary {
        let mut daily_breakdown = BTreeMap::new();
        for m in group {
            *daily_breakdown.entry(day_of(&m.created_at)).or_insert(0) += 1;
        }
        WeeklySummary {
            ticker: ticker.to_string(),
            week_start: *bucket,
            core: SummaryCore::from_group(group, cfg),
            categories: CategoryCounts::from_group(group),
            top_contexts: top_contexts(group, cfg.top_contexts),
            daily_breakdown,
            etl_timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::mention;
    use super::super::WeeklyAggregator;
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn week_groups_and_daily_breakdown() {
        // Mon 2024-01-01 .. Sun 2024-01-07 form one week; Mon 2024-01-08 starts the next.
        let ms = vec![
            mention("AMD", Utc.with_ymd_and_hms(2024, 1, 3, 10, 0, 0).unwrap(), 0.1, 0.5, &["TECHNICAL"]),
            mention("AMD", Utc.with_ymd_and_hms(2024, 1, 3, 22, 0, 0).unwrap(), 0.1, 0.5, &[]),
            mention("AMD", Utc.with_ymd_and_hms(2024, 1, 7, 23, 0, 0).unwrap(), 0.1, 0.5, &[]),
            mention("AMD", Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap(), 0.1, 0.5, &[]),
        ];
        let out = WeeklyAggregator::new(AggregationConfig::default()).aggregate(&ms);
        assert_eq!(out.len(), 2);
        let w = &out[0];
        assert_eq!(w.week_start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(w.core.mention_count, 3);
        assert_eq!(w.categories.technical_signals, 1);
        let wed = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        assert_eq!(w.daily_breakdown.get(&wed), Some(&2));
        let rec = w.to_record();
        assert_eq!(rec["daily_breakdown"]["2024-01-07"], 1);
        assert_eq!(rec["week_start"], "2024-01-01T00:00:00Z");
    }
}
