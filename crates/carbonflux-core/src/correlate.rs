// Copyright (c) 2026 Carbonflux Contributors
//
// This file is part of Carbonflux.
//
// Licensed under the MIT License. You may use, copy, modify, and distribute
// this file under the terms of that license.
//
// This software is provided "AS IS", without warranty of any kind.

//! Single-pass Pearson correlation over paired series.

use crate::bucket::TimedValue;
use std::collections::BTreeMap;

/// Streaming Pearson correlation coefficient.
///
/// Uses running means and co-moments (Welford-style) rather than the
/// naive sum-of-products formula, which cancels catastrophically on
/// series with large offsets. Returns `None` for an empty input or when
/// either side has zero variance; degenerate results are excluded here
/// rather than surfaced as NaN.
pub fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.is_empty() {
        return None;
    }

    let mut n = 0.0_f64;
    let mut mean_x = 0.0;
    let mut mean_y = 0.0;
    let mut m2_x = 0.0;
    let mut m2_y = 0.0;
    let mut co_moment = 0.0;

    for &(x, y) in pairs {
        n += 1.0;
        let dx = x - mean_x;
        mean_x += dx / n;
        let dy = y - mean_y;
        mean_y += dy / n;
        m2_x += dx * (x - mean_x);
        m2_y += dy * (y - mean_y);
        co_moment += dx * (y - mean_y);
    }

    let denominator = (m2_x * m2_y).sqrt();
    if denominator == 0.0 {
        return None;
    }
    let r = co_moment / denominator;
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// Pair two timestamped series by exact timestamp, dropping points
/// present on only one side.
pub fn align_by_timestamp(a: &[TimedValue], b: &[TimedValue]) -> Vec<(f64, f64)> {
    let b_by_ts: BTreeMap<i64, f64> = b
        .iter()
        .map(|v| (v.timestamp.timestamp_millis(), v.value))
        .collect();
    a.iter()
        .filter_map(|v| {
            b_by_ts
                .get(&v.timestamp.timestamp_millis())
                .map(|&other| (v.value, other))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_self_correlation_is_one() {
        let pairs: Vec<(f64, f64)> = (0..50).map(|i| (f64::from(i) * 1.7, f64::from(i) * 1.7)).collect();
        let r = pearson(&pairs).unwrap();
        assert!((r - 1.0).abs() < 1e-12, "r = {r}");
    }

    #[test]
    fn test_perfect_anticorrelation() {
        let pairs: Vec<(f64, f64)> = (0..50).map(|i| (f64::from(i), -f64::from(i))).collect();
        let r = pearson(&pairs).unwrap();
        assert!((r + 1.0).abs() < 1e-12, "r = {r}");
    }

    #[test]
    fn test_constant_series_excluded() {
        let pairs: Vec<(f64, f64)> = (0..10).map(|i| (5.0, f64::from(i))).collect();
        assert_eq!(pearson(&pairs), None);
        assert_eq!(pearson(&[]), None);
        assert_eq!(pearson(&[(1.0, 2.0)]), None);
    }

    #[test]
    fn test_stable_under_large_offsets() {
        // Same linear relation shifted by 1e9; the naive formula loses
        // almost all precision here
        let offset = 1.0e9;
        let pairs: Vec<(f64, f64)> = (0..100)
            .map(|i| (offset + f64::from(i), offset + 2.0 * f64::from(i)))
            .collect();
        let r = pearson(&pairs).unwrap();
        assert!((r - 1.0).abs() < 1e-9, "r = {r}");
    }

    #[test]
    fn test_align_drops_one_sided_points() {
        let t = |m: i64| Utc.timestamp_millis_opt(m * 60_000).unwrap();
        let a = vec![
            TimedValue { timestamp: t(0), value: 1.0 },
            TimedValue { timestamp: t(1), value: 2.0 },
            TimedValue { timestamp: t(3), value: 3.0 },
        ];
        let b = vec![
            TimedValue { timestamp: t(1), value: 20.0 },
            TimedValue { timestamp: t(2), value: 30.0 },
            TimedValue { timestamp: t(3), value: 40.0 },
        ];
        let pairs = align_by_timestamp(&a, &b);
        assert_eq!(pairs, vec![(2.0, 20.0), (3.0, 40.0)]);
    }
}
