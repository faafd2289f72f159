// src/aggregate/bucket.rs
//! Time-bucket functions. All buckets are computed in UTC.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};

/// Calendar date of `ts`.
pub fn day_of(ts: &DateTime<Utc>) -> NaiveDate {
    ts.date_naive()
}

/// `ts` floored to the top of the hour.
pub fn hour_of(ts: &DateTime<Utc>) -> DateTime<Utc> {
    let secs = i64::from(ts.minute()) * 60 + i64::from(ts.second());
    *ts - Duration::seconds(secs) - Duration::nanoseconds(i64::from(ts.nanosecond()))
}

/// Monday 00:00:00 of the ISO week containing `ts`.
pub fn week_of(ts: &DateTime<Utc>) -> DateTime<Utc> {
    let back = i64::from(ts.weekday().num_days_from_monday());
    let monday = ts.date_naive() - Duration::days(back);
    monday.and_time(chrono::NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, mi, s).unwrap()
    }

    #[test]
    fn hour_floors_minutes_and_seconds() {
        assert_eq!(hour_of(&ts(2024, 1, 1, 14, 37, 0)), ts(2024, 1, 1, 14, 0, 0));
        let with_nanos = ts(2024, 1, 1, 23, 59, 59) + Duration::nanoseconds(999);
        assert_eq!(hour_of(&with_nanos), ts(2024, 1, 1, 23, 0, 0));
    }

    #[test]
    fn week_floors_to_monday_midnight() {
        // 2024-01-03 is a Wednesday.
        assert_eq!(week_of(&ts(2024, 1, 3, 18, 5, 0)), ts(2024, 1, 1, 0, 0, 0));
        assert_eq!(week_of(&ts(2024, 1, 1, 0, 0, 0)), ts(2024, 1, 1, 0, 0, 0));
        // Sunday belongs to the week that started six days earlier, across a month edge.
        assert_eq!(week_of(&ts(2024, 3, 3, 23, 59, 59)), ts(2024, 2, 26, 0, 0, 0));
    }

    #[test]
    fn day_ignores_time_of_day() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(day_of(&ts(2024, 1, 1, 0, 0, 0)), d);
        assert_eq!(day_of(&ts(2024, 1, 1, 23, 59, 59)), d);
    }
}
