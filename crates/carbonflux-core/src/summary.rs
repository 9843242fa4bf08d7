// Copyright (c) 2026 Carbonflux Contributors
//
// This file is part of Carbonflux.
//
// Licensed under the MIT License. You may use, copy, modify, and distribute
// this file under the terms of that license.
//
// This software is provided "AS IS", without warranty of any kind.

//! Summary aggregation: drives the row extractor and intensity
//! calculator over a validated batch and produces one immutable
//! [`CurrentSummary`].

use crate::bucket::TimedValue;
use crate::correlate::{align_by_timestamp, pearson};
use crate::intensity::weighted_intensity;
use crate::row::RowTemplate;
use carbonflux_types::{
    CurrentSummary, FuelRow, GridStatus, IntensityConfig, SummaryByHour, Trend,
};
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Minimum accepted samples before a traffic-light status is computed.
/// At or below this the status stays `Insufficient` with zero thresholds.
const STATUS_SAMPLE_FLOOR: usize = 3;

#[derive(Debug, Default)]
struct HourAccumulator {
    sums: [f64; 24],
    counts: [u32; 24],
}

impl HourAccumulator {
    fn add(&mut self, hour: usize, value: f64) {
        self.sums[hour] += value;
        self.counts[hour] += 1;
    }

    /// Per-slot arithmetic means; slots with no samples stay absent.
    fn into_summary(self) -> SummaryByHour {
        let mut summary = SummaryByHour::default();
        for hour in 0..SummaryByHour::HOURS {
            if self.counts[hour] > 0 {
                let mean = self.sums[hour] / f64::from(self.counts[hour]);
                summary.set(hour, mean.round() as i64);
            }
        }
        summary
    }
}

/// Intensity over time for a row window, used by the bucketed
/// long-window tables. Rows that fail extraction or fall below the
/// fuel-diversity floor are dropped.
pub fn intensity_series(
    rows: &[FuelRow],
    template: &RowTemplate,
    config: &IntensityConfig,
) -> Vec<TimedValue> {
    let mut year_tables: BTreeMap<i32, BTreeMap<String, f64>> = BTreeMap::new();
    let mut series = Vec::with_capacity(rows.len());
    for row in rows {
        let Ok(sample) = template.sample(row) else {
            continue;
        };
        let year = sample.timestamp.year();
        let table = year_tables
            .entry(year)
            .or_insert_with(|| config.intensities_for_year(year));
        let intensity =
            weighted_intensity(table, &sample.generation_by_fuel, config.min_fuel_types);
        if intensity >= 0.0 {
            series.push(TimedValue {
                timestamp: sample.timestamp,
                value: intensity,
            });
        }
    }
    series
}

/// Compute the summary for one batch of validated rows.
///
/// Rows that fail extraction or whose fuel mix is too thin are skipped
/// with a warning; the last accepted row becomes "current". `now` is
/// only used for the empty fallback when no row is accepted. Apart from
/// diagnostic logging the function is pure in its inputs.
pub fn compute_summary(
    rows: &[FuelRow],
    template: &RowTemplate,
    config: &IntensityConfig,
    max_age: Duration,
    now: DateTime<Utc>,
) -> CurrentSummary {
    let mut hour_intensity = HourAccumulator::default();
    let mut hour_generation = HourAccumulator::default();
    let mut hour_zero_carbon = HourAccumulator::default();
    let mut hour_storage = HourAccumulator::default();

    let mut intensities: Vec<f64> = Vec::with_capacity(rows.len());
    let mut accepted: Vec<TimedValue> = Vec::with_capacity(rows.len());
    let mut fuel_series: BTreeMap<String, Vec<TimedValue>> = BTreeMap::new();
    let mut year_tables: BTreeMap<i32, BTreeMap<String, f64>> = BTreeMap::new();

    let mut intensity_sum = 0.0;
    let mut min_intensity = f64::MAX;
    let mut min_at: Option<DateTime<Utc>> = None;
    let mut max_intensity = f64::MIN;
    let mut max_at: Option<DateTime<Utc>> = None;
    let mut first_at: Option<DateTime<Utc>> = None;
    let mut current: Option<(carbonflux_types::GenerationSample, f64, f64)> = None;
    let mut skipped = 0usize;

    for (index, row) in rows.iter().enumerate() {
        let sample = match template.sample(row) {
            Ok(sample) => sample,
            Err(err) => {
                warn!("Skipping malformed row {}: {}", index, err);
                skipped += 1;
                continue;
            }
        };

        let year = sample.timestamp.year();
        let table = year_tables
            .entry(year)
            .or_insert_with(|| config.intensities_for_year(year));

        let intensity =
            weighted_intensity(table, &sample.generation_by_fuel, config.min_fuel_types);
        if intensity < 0.0 {
            warn!(
                "Skipping row {} at {}: insufficient fuel diversity",
                index, sample.timestamp
            );
            skipped += 1;
            continue;
        }

        let total_mw = sample.total_mw();
        let mut zero_carbon_mw = 0.0;
        let mut storage_mw = 0.0;
        for (fuel, mw) in &sample.generation_by_fuel {
            if table.get(fuel).is_some_and(|i| *i <= 0.0) {
                zero_carbon_mw += mw;
            }
            if config.storage_fuels.contains(fuel) {
                storage_mw += mw;
            }
            fuel_series.entry(fuel.clone()).or_default().push(TimedValue {
                timestamp: sample.timestamp,
                value: *mw,
            });
        }

        let hour = sample.timestamp.hour() as usize;
        hour_intensity.add(hour, intensity);
        hour_generation.add(hour, total_mw);
        hour_zero_carbon.add(hour, zero_carbon_mw);
        hour_storage.add(hour, storage_mw);

        if intensity < min_intensity {
            min_intensity = intensity;
            min_at = Some(sample.timestamp);
        }
        if intensity > max_intensity {
            max_intensity = intensity;
            max_at = Some(sample.timestamp);
        }
        first_at.get_or_insert(sample.timestamp);
        intensity_sum += intensity;
        intensities.push(intensity);
        accepted.push(TimedValue {
            timestamp: sample.timestamp,
            value: intensity,
        });
        current = Some((sample, intensity, storage_mw));
    }

    let Some((last_sample, last_intensity, last_storage_mw)) = current else {
        info!("No usable rows in batch ({} skipped); returning empty summary", skipped);
        return CurrentSummary::empty(now);
    };
    let sample_count = accepted.len();
    if skipped > 0 {
        debug!("Accepted {} rows, skipped {}", sample_count, skipped);
    }

    let ave_intensity = intensity_sum / sample_count as f64;
    let (status, lower_threshold, upper_threshold) = if sample_count > STATUS_SAMPLE_FLOOR {
        classify(&intensities, ave_intensity, last_intensity)
    } else {
        debug!(
            "Only {} accepted samples (floor {}); status left insufficient",
            sample_count, STATUS_SAMPLE_FLOOR
        );
        (GridStatus::Insufficient, 0.0, 0.0)
    };

    let recent_change = (sample_count >= 2).then(|| {
        let previous = accepted[sample_count - 2].value;
        if last_intensity > previous {
            Trend::Worsening
        } else if last_intensity < previous {
            Trend::Improving
        } else {
            Trend::Steady
        }
    });

    let mut correlation = BTreeMap::new();
    for (fuel, series) in &fuel_series {
        let pairs = align_by_timestamp(series, &accepted);
        match pearson(&pairs) {
            Some(r) => {
                correlation.insert(fuel.clone(), r);
            }
            None => {
                debug!("Correlation for {} degenerate; entry omitted", fuel);
            }
        }
    }

    let timestamp = last_sample.timestamp;
    let window_millis = first_at
        .map(|first| (timestamp - first).num_milliseconds())
        .unwrap_or(0);

    info!(
        "Summary over {} samples: status {}, current {:.1} gCO2/kWh, window {} h",
        sample_count,
        status.label(),
        last_intensity,
        window_millis / 3_600_000
    );

    CurrentSummary {
        status,
        recent_change,
        timestamp,
        use_by_time: timestamp + max_age,
        current_mw: last_sample.total_mw(),
        current_intensity: last_intensity,
        current_generation_mw: last_sample.generation_by_fuel,
        current_storage_drawdown_mw: last_storage_mw,
        min_intensity,
        min_intensity_at: min_at.unwrap_or(timestamp),
        max_intensity,
        max_intensity_at: max_at.unwrap_or(timestamp),
        ave_intensity,
        window_millis,
        sample_count,
        lower_threshold,
        upper_threshold,
        hour_intensity: hour_intensity.into_summary(),
        hour_generation: hour_generation.into_summary(),
        hour_zero_carbon: hour_zero_carbon.into_summary(),
        hour_storage_drawdown: hour_storage.into_summary(),
        total_grid_losses: config.total_grid_losses(),
        correlation_intensity_to_fuel: correlation,
    }
}

/// Quartile-based traffic-light thresholds.
///
/// Upper quartile of the sorted sample set is the RED threshold; the
/// GREEN threshold is the lower quartile or the mean, whichever is
/// smaller, which keeps lower <= upper in skewed distributions.
fn classify(intensities: &[f64], mean: f64, current: f64) -> (GridStatus, f64, f64) {
    let mut sorted = intensities.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    let lower_quartile = sorted[n / 4];
    let upper_quartile = sorted[n.saturating_mul(3) / 4];
    let lower = lower_quartile.min(mean);
    let upper = upper_quartile;
    let status = if current >= upper {
        GridStatus::Red
    } else if current <= lower {
        GridStatus::Green
    } else {
        GridStatus::Yellow
    };
    (status, lower, upper)
}
