// Copyright (c) 2026 Carbonflux Contributors
//
// This file is part of Carbonflux.
//
// Licensed under the MIT License. You may use, copy, modify, and distribute
// this file under the terms of that license.
//
// This software is provided "AS IS", without warranty of any kind.

//! Per-bucket-axis aggregate tables consumed by the excluded renderers.

use crate::bucket::{BucketAlg, BucketSnapshot, Bucketer, TimedValue};
use crate::intensity::variability;

/// Aggregate statistics for one bucket of an axis.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketTableRow {
    pub key: String,
    pub sample_count: usize,
    pub min_intensity: f64,
    pub mean_intensity: f64,
    pub max_intensity: f64,
    /// Spread of the bucket's own values, percent of max.
    pub variability_pct: f64,
    /// Mean of the sub-buckets' variabilities, where a sub-axis exists.
    pub mean_sub_variability_pct: Option<f64>,
    /// Mean over sub-buckets of (sub-mean - sub-min): how much could be
    /// saved by shifting load to each sub-bucket's best moment.
    pub mean_potential_saving: Option<f64>,
}

/// One rendered table: a titled axis with a row per bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketTable {
    pub title: String,
    pub rows: Vec<BucketTableRow>,
}

/// Bucket a timestamped intensity series under one axis.
pub fn bucket_intensities(samples: &[TimedValue], alg: BucketAlg) -> BucketSnapshot {
    let bucketer = Bucketer::new(alg);
    for sample in samples {
        bucketer.add(sample.timestamp, sample.value);
    }
    bucketer.finish()
}

/// Build the aggregate table for a finished snapshot.
pub fn intensity_table(snapshot: &BucketSnapshot) -> BucketTable {
    let has_sub_axis = snapshot.alg().sub_alg().is_some();
    let mut rows = Vec::new();

    for (key, values) in snapshot.data_by_bucket() {
        let stats = SeriesStats::over(&values);
        let (mean_sub_variability_pct, mean_potential_saving) = if has_sub_axis {
            let sub_buckets = snapshot.data_by_sub_bucket(&key);
            let mut variabilities = Vec::with_capacity(sub_buckets.len());
            let mut savings = Vec::with_capacity(sub_buckets.len());
            for sub_values in sub_buckets.values() {
                let sub = SeriesStats::over(sub_values);
                variabilities.push(variability(sub.min, sub.max));
                savings.push(sub.mean - sub.min);
            }
            (mean_of(&variabilities), mean_of(&savings))
        } else {
            (None, None)
        };

        rows.push(BucketTableRow {
            key,
            sample_count: values.len(),
            min_intensity: stats.min,
            mean_intensity: stats.mean,
            max_intensity: stats.max,
            variability_pct: variability(stats.min, stats.max),
            mean_sub_variability_pct,
            mean_potential_saving,
        });
    }

    BucketTable {
        title: snapshot.alg().title().to_owned(),
        rows,
    }
}

struct SeriesStats {
    min: f64,
    mean: f64,
    max: f64,
}

impl SeriesStats {
    fn over(values: &[TimedValue]) -> Self {
        let mut min = f64::MAX;
        let mut max = f64::MIN;
        let mut sum = 0.0;
        for v in values {
            min = min.min(v.value);
            max = max.max(v.value);
            sum += v.value;
        }
        if values.is_empty() {
            Self { min: 0.0, mean: 0.0, max: 0.0 }
        } else {
            Self { min, mean: sum / values.len() as f64, max }
        }
    }
}

fn mean_of(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
