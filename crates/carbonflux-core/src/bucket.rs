// Copyright (c) 2026 Carbonflux Contributors
//
// This file is part of Carbonflux.
//
// Licensed under the MIT License. You may use, copy, modify, and distribute
// this file under the terms of that license.
//
// This software is provided "AS IS", without warranty of any kind.

//! Generic hierarchical time-bucketing engine.
//!
//! A [`BucketAlg`] maps a timestamp to a lexically sortable bucket key,
//! optionally with a finer sub-bucket axis. A [`Bucketer`] accumulates
//! timestamped values under those keys; [`Bucketer::finish`] consumes it
//! and yields an immutable [`BucketSnapshot`], so the freeze invariant is
//! enforced by the types rather than a runtime flag.

use chrono::{DateTime, Datelike, Timelike, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// One timestamped scalar fed to a bucketer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedValue {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Closed set of time-bucketing strategies.
///
/// Key functions are pure and deterministic; keys sort lexically into
/// chronological (or categorical) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketAlg {
    /// Everything in one "ALL" bucket, sub-bucketed by unique day.
    All,
    /// UTC hour of day, "00".."23".
    HourOfDay,
    /// Weekday vs weekend, sub-bucketed by unique day.
    WeekdayWeekend,
    /// Calendar month "01".."12", sub-bucketed by unique day.
    Month,
    /// Calendar year, sub-bucketed by unique day.
    Year,
    /// One bucket per calendar day (unbounded cardinality).
    EachUniqueDay,
    /// One bucket per calendar hour (unbounded cardinality).
    EachUniqueHour,
}

impl BucketAlg {
    /// Bucket key for a timestamp.
    pub fn bucket_key(self, timestamp: DateTime<Utc>) -> String {
        match self {
            BucketAlg::All => "ALL".to_owned(),
            BucketAlg::HourOfDay => format!("{:02}", timestamp.hour()),
            BucketAlg::WeekdayWeekend => {
                if timestamp.weekday().number_from_monday() <= 5 {
                    "weekday".to_owned()
                } else {
                    "weekend".to_owned()
                }
            }
            BucketAlg::Month => format!("{:02}", timestamp.month()),
            BucketAlg::Year => format!("{:04}", timestamp.year()),
            BucketAlg::EachUniqueDay => timestamp.format("%Y-%m-%d").to_string(),
            BucketAlg::EachUniqueHour => timestamp.format("%Y-%m-%dT%H").to_string(),
        }
    }

    /// Whether the distinct-key cardinality is bounded.
    pub fn is_capped_size(self) -> bool {
        match self {
            BucketAlg::All
            | BucketAlg::HourOfDay
            | BucketAlg::WeekdayWeekend
            | BucketAlg::Month
            | BucketAlg::Year => true,
            BucketAlg::EachUniqueDay | BucketAlg::EachUniqueHour => false,
        }
    }

    /// Sub-bucket axis, where one exists.
    pub fn sub_alg(self) -> Option<BucketAlg> {
        match self {
            BucketAlg::All | BucketAlg::WeekdayWeekend | BucketAlg::Month | BucketAlg::Year => {
                Some(BucketAlg::EachUniqueDay)
            }
            BucketAlg::HourOfDay | BucketAlg::EachUniqueDay | BucketAlg::EachUniqueHour => None,
        }
    }

    /// Display title for rendered tables.
    pub fn title(self) -> &'static str {
        match self {
            BucketAlg::All => "All samples",
            BucketAlg::HourOfDay => "Hour of day",
            BucketAlg::WeekdayWeekend => "Weekday vs weekend",
            BucketAlg::Month => "Month",
            BucketAlg::Year => "Year",
            BucketAlg::EachUniqueDay => "Each day",
            BucketAlg::EachUniqueHour => "Each hour",
        }
    }
}

#[derive(Debug, Default)]
struct BucketData {
    by_bucket: BTreeMap<String, Vec<TimedValue>>,
    by_sub_bucket: BTreeMap<String, BTreeMap<String, Vec<TimedValue>>>,
}

/// Accumulator bound to one [`BucketAlg`].
///
/// `add` serialises through a per-instance mutex, so concurrent
/// producers may share one bucketer during the fill phase. Reading
/// requires `finish()`, which consumes the bucketer; there is no way to
/// add to a snapshot or read from a live bucketer.
#[derive(Debug)]
pub struct Bucketer {
    alg: BucketAlg,
    data: Mutex<BucketData>,
}

impl Bucketer {
    pub fn new(alg: BucketAlg) -> Self {
        Self {
            alg,
            data: Mutex::new(BucketData::default()),
        }
    }

    pub fn alg(&self) -> BucketAlg {
        self.alg
    }

    /// File a value under its bucket key and, where the strategy has a
    /// sub-axis, under its sub-bucket key too.
    pub fn add(&self, timestamp: DateTime<Utc>, value: f64) {
        let item = TimedValue { timestamp, value };
        let key = self.alg.bucket_key(timestamp);
        let mut data = self.data.lock();
        data.by_bucket.entry(key.clone()).or_default().push(item);
        if let Some(sub) = self.alg.sub_alg() {
            let sub_key = sub.bucket_key(timestamp);
            data.by_sub_bucket
                .entry(key)
                .or_default()
                .entry(sub_key)
                .or_default()
                .push(item);
        }
    }

    /// Freeze: consume the accumulator and return the read-only view.
    pub fn finish(self) -> BucketSnapshot {
        let mut data = self.data.into_inner();
        for values in data.by_bucket.values_mut() {
            values.sort_by_key(|v| v.timestamp);
        }
        for sub_map in data.by_sub_bucket.values_mut() {
            for values in sub_map.values_mut() {
                values.sort_by_key(|v| v.timestamp);
            }
        }
        BucketSnapshot {
            alg: self.alg,
            data,
        }
    }
}

/// Immutable, queryable result of a finished [`Bucketer`].
///
/// Accessors hand out copies sorted by key and timestamp; callers can
/// neither observe nor cause mutation.
#[derive(Debug)]
pub struct BucketSnapshot {
    alg: BucketAlg,
    data: BucketData,
}

impl BucketSnapshot {
    pub fn alg(&self) -> BucketAlg {
        self.alg
    }

    /// Sorted bucket keys.
    pub fn bucket_keys(&self) -> Vec<String> {
        self.data.by_bucket.keys().cloned().collect()
    }

    /// All values grouped by bucket key.
    pub fn data_by_bucket(&self) -> BTreeMap<String, Vec<TimedValue>> {
        self.data.by_bucket.clone()
    }

    /// Values for one bucket, sorted by timestamp.
    pub fn bucket(&self, key: &str) -> Vec<TimedValue> {
        self.data.by_bucket.get(key).cloned().unwrap_or_default()
    }

    /// Sub-bucket map under one primary bucket, empty when the strategy
    /// has no sub-axis.
    pub fn data_by_sub_bucket(&self, key: &str) -> BTreeMap<String, Vec<TimedValue>> {
        self.data
            .by_sub_bucket
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Total number of values across all buckets.
    pub fn len(&self) -> usize {
        self.data.by_bucket.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_bucket_keys_are_deterministic_and_sortable() {
        let t = ts(5, 9);
        assert_eq!(BucketAlg::All.bucket_key(t), "ALL");
        assert_eq!(BucketAlg::HourOfDay.bucket_key(t), "09");
        assert_eq!(BucketAlg::Month.bucket_key(t), "01");
        assert_eq!(BucketAlg::Year.bucket_key(t), "2026");
        assert_eq!(BucketAlg::EachUniqueDay.bucket_key(t), "2026-01-05");
        assert_eq!(BucketAlg::EachUniqueHour.bucket_key(t), "2026-01-05T09");
        // 2026-01-05 is a Monday, 2026-01-10 a Saturday
        assert_eq!(BucketAlg::WeekdayWeekend.bucket_key(ts(5, 0)), "weekday");
        assert_eq!(BucketAlg::WeekdayWeekend.bucket_key(ts(10, 0)), "weekend");
    }

    #[test]
    fn test_capped_cardinality_flags() {
        assert!(BucketAlg::All.is_capped_size());
        assert!(BucketAlg::HourOfDay.is_capped_size());
        assert!(!BucketAlg::EachUniqueDay.is_capped_size());
        assert!(!BucketAlg::EachUniqueHour.is_capped_size());
    }

    #[test]
    fn test_singleton_bucket_holds_everything() {
        let bucketer = Bucketer::new(BucketAlg::All);
        for day in 1..=9 {
            bucketer.add(ts(day, 12), day as f64);
        }
        let snapshot = bucketer.finish();
        let data = snapshot.data_by_bucket();
        assert_eq!(data.len(), 1);
        assert_eq!(data["ALL"].len(), 9);
        assert_eq!(snapshot.len(), 9);
    }

    #[test]
    fn test_sub_bucket_union_equals_primary() {
        let bucketer = Bucketer::new(BucketAlg::WeekdayWeekend);
        for day in 1..=14 {
            for hour in [0, 6, 12, 18] {
                bucketer.add(ts(day, hour), f64::from(day * 100 + hour));
            }
        }
        let snapshot = bucketer.finish();
        for key in snapshot.bucket_keys() {
            let mut primary: Vec<f64> = snapshot.bucket(&key).iter().map(|v| v.value).collect();
            let mut union: Vec<f64> = snapshot
                .data_by_sub_bucket(&key)
                .values()
                .flatten()
                .map(|v| v.value)
                .collect();
            primary.sort_by(f64::total_cmp);
            union.sort_by(f64::total_cmp);
            assert_eq!(primary, union, "multiset mismatch for bucket {key}");
        }
    }

    #[test]
    fn test_hour_of_day_has_no_sub_axis() {
        let bucketer = Bucketer::new(BucketAlg::HourOfDay);
        bucketer.add(ts(3, 7), 1.0);
        bucketer.add(ts(4, 7), 2.0);
        let snapshot = bucketer.finish();
        assert_eq!(snapshot.bucket("07").len(), 2);
        assert!(snapshot.data_by_sub_bucket("07").is_empty());
    }

    #[test]
    fn test_snapshot_values_sorted_by_timestamp() {
        let bucketer = Bucketer::new(BucketAlg::All);
        bucketer.add(ts(9, 0), 9.0);
        bucketer.add(ts(1, 0), 1.0);
        bucketer.add(ts(5, 0), 5.0);
        let snapshot = bucketer.finish();
        let values: Vec<f64> = snapshot.bucket("ALL").iter().map(|v| v.value).collect();
        assert_eq!(values, vec![1.0, 5.0, 9.0]);
    }

    #[test]
    fn test_concurrent_fill() {
        let bucketer = std::sync::Arc::new(Bucketer::new(BucketAlg::HourOfDay));
        let mut handles = Vec::new();
        for worker in 0..4 {
            let bucketer = std::sync::Arc::clone(&bucketer);
            handles.push(std::thread::spawn(move || {
                for i in 0..250 {
                    bucketer.add(ts(1 + worker, (i % 24) as u32), f64::from(i));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        let snapshot = std::sync::Arc::into_inner(bucketer).unwrap().finish();
        assert_eq!(snapshot.len(), 1000);
    }
}
