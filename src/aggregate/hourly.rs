// src/aggregate/hourly.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::bucket::hour_of;
use super::{record_of, BucketStrategy, Granularity, Summary, SummaryCore};
use crate::config::AggregationConfig;
use crate::mention::StockMention;

/// Per-ticker summary for one clock hour. Carries direction counts only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlySummary {
    pub ticker: String,
    pub hour_start: DateTime<Utc>,
    #[serde(flatten)]
    pub core: SummaryCore,
    pub etl_timestamp: DateTime<Utc>,
}

impl Summary for HourlySummary {
    type Key = (String, DateTime<Utc>);
    const GRANULARITY: Granularity = Granularity::Hourly;

    fn key(&self) -> Self::Key {
        (self.ticker.clone(), self.hour_start)
    }
    fn core(&self) -> &SummaryCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut SummaryCore {
        &mut self.core
    }
    fn to_record(&self) -> Map<String, Value> {
        record_of(self)
    }
}

pub struct ByHour;

impl BucketStrategy for ByHour {
    type Bucket = DateTime<Utc>;
    type Output = HourlySummary;

    fn bucket(ts: &DateTime<Utc>) -> DateTime<Utc> {
        hour_of(ts)
    }

    fn summarize(
        ticker: &str,
        bucket: &DateTime<Utc>,
        group: &[&StockMention],
        cfg: &AggregationConfig,
        etl_timestamp: DateTime<Utc>,
    ) -> HourlySummary {
        HourlySummary {
            ticker: ticker.to_string(),
            hour_start: *bucket,
            core: SummaryCore::from_group(group, cfg),
            etl_timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::mention;
    use super::super::HourlyAggregator;
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn buckets_to_top_of_hour() {
        let ms = vec![
            mention("GME", Utc.with_ymd_and_hms(2024, 1, 1, 14, 37, 0).unwrap(), 0.2, 0.5, &["HOLD"]),
            mention("GME", Utc.with_ymd_and_hms(2024, 1, 1, 14, 2, 0).unwrap(), 0.4, 0.5, &[]),
            mention("GME", Utc.with_ymd_and_hms(2024, 1, 1, 15, 0, 0).unwrap(), 0.4, 0.5, &[]),
        ];
        let out = HourlyAggregator::new(AggregationConfig::default()).aggregate(&ms);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].hour_start, Utc.with_ymd_and_hms(2024, 1, 1, 14, 0, 0).unwrap());
        assert_eq!(out[0].core.mention_count, 2);
        assert_eq!(out[0].core.hold_signals, 1);
        let rec = out[0].to_record();
        assert_eq!(rec["hour_start"], "2024-01-01T14:00:00Z");
        assert!(!rec.contains_key("price_targets"));
    }
}
