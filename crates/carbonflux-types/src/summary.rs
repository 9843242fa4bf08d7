// Copyright (c) 2026 Carbonflux Contributors
//
// This file is part of Carbonflux.
//
// Licensed under the MIT License. You may use, copy, modify, and distribute
// this file under the terms of that license.
//
// This software is provided "AS IS", without warranty of any kind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Traffic-light classification of the current carbon intensity.
///
/// `Insufficient` is the explicit "not enough accepted samples to
/// classify" state; it replaces the old convention of a null status with
/// zero thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GridStatus {
    /// Intensity at or below the lower threshold.
    Green,
    /// Intensity strictly between the thresholds.
    Yellow,
    /// Intensity at or above the upper threshold.
    Red,
    /// Too few samples to classify; thresholds stay at zero.
    #[default]
    Insufficient,
}

impl GridStatus {
    /// Short display label used by flag files and the post gate.
    pub fn label(self) -> &'static str {
        match self {
            GridStatus::Green => "GREEN",
            GridStatus::Yellow => "YELLOW",
            GridStatus::Red => "RED",
            GridStatus::Insufficient => "UNKNOWN",
        }
    }
}

/// Direction of the intensity change between the last two accepted samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    /// Intensity strictly decreasing.
    Improving,
    /// Intensity strictly increasing.
    Worsening,
    /// Intensity unchanged.
    Steady,
}

/// Fixed 24-slot hour-of-day histogram.
///
/// Index is UTC hour [0, 23]; an absent slot means no samples were seen
/// for that hour (distinct from a zero mean).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SummaryByHour(pub [Option<i64>; 24]);

impl SummaryByHour {
    pub const HOURS: usize = 24;

    /// Value for a UTC hour, `None` when out of range or no samples.
    pub fn get(&self, hour: usize) -> Option<i64> {
        self.0.get(hour).copied().flatten()
    }

    pub fn set(&mut self, hour: usize, value: i64) {
        if let Some(slot) = self.0.get_mut(hour) {
            *slot = Some(value);
        }
    }

    /// True when every hour slot holds a value.
    pub fn is_fully_populated(&self) -> bool {
        self.0.iter().all(Option::is_some)
    }

    /// Number of populated slots.
    pub fn populated_count(&self) -> usize {
        self.0.iter().filter(|s| s.is_some()).count()
    }
}

/// Immutable summary of one aggregation run over a window of feed rows.
///
/// Created once per cycle and handed off by value; nothing mutates it
/// after construction. Serializable so the last good summary can be
/// cached for staleness fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentSummary {
    /// Traffic-light status of the newest accepted sample.
    pub status: GridStatus,
    /// Change between the two newest accepted samples, if both exist.
    pub recent_change: Option<Trend>,
    /// Timestamp of the newest accepted sample.
    pub timestamp: DateTime<Utc>,
    /// Wall-clock time after which this summary is considered stale.
    pub use_by_time: DateTime<Utc>,
    /// Total generation of the newest accepted sample (MW).
    pub current_mw: f64,
    /// Weighted intensity of the newest accepted sample (gCO2/kWh).
    pub current_intensity: f64,
    /// Per-fuel generation of the newest accepted sample (MW).
    pub current_generation_mw: BTreeMap<String, f64>,
    /// Storage discharge portion of the newest accepted sample (MW).
    pub current_storage_drawdown_mw: f64,
    /// Lowest intensity seen in the window.
    pub min_intensity: f64,
    pub min_intensity_at: DateTime<Utc>,
    /// Highest intensity seen in the window.
    pub max_intensity: f64,
    pub max_intensity_at: DateTime<Utc>,
    /// Arithmetic mean intensity over accepted samples.
    pub ave_intensity: f64,
    /// Span between oldest and newest accepted sample (ms).
    pub window_millis: i64,
    /// Number of accepted samples.
    pub sample_count: usize,
    /// GREEN at or below this intensity. Always <= `upper_threshold`.
    pub lower_threshold: f64,
    /// RED at or above this intensity.
    pub upper_threshold: f64,
    /// Mean intensity by UTC hour of day.
    pub hour_intensity: SummaryByHour,
    /// Mean total generation by UTC hour of day (MW).
    pub hour_generation: SummaryByHour,
    /// Mean zero-carbon generation by UTC hour of day (MW).
    pub hour_zero_carbon: SummaryByHour,
    /// Mean storage drawdown by UTC hour of day (MW).
    pub hour_storage_drawdown: SummaryByHour,
    /// Total configured grid-loss fraction.
    pub total_grid_losses: f64,
    /// Pearson correlation of each fuel's generation against intensity.
    /// Degenerate (zero-variance) fuels are omitted.
    pub correlation_intensity_to_fuel: BTreeMap<String, f64>,
}

impl CurrentSummary {
    /// Well-defined empty summary: all-zero numerics, `Insufficient`
    /// status, already stale. Returned when no usable data exists.
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            status: GridStatus::Insufficient,
            recent_change: None,
            timestamp: now,
            use_by_time: now,
            current_mw: 0.0,
            current_intensity: 0.0,
            current_generation_mw: BTreeMap::new(),
            current_storage_drawdown_mw: 0.0,
            min_intensity: 0.0,
            min_intensity_at: now,
            max_intensity: 0.0,
            max_intensity_at: now,
            ave_intensity: 0.0,
            window_millis: 0,
            sample_count: 0,
            lower_threshold: 0.0,
            upper_threshold: 0.0,
            hour_intensity: SummaryByHour::default(),
            hour_generation: SummaryByHour::default(),
            hour_zero_carbon: SummaryByHour::default(),
            hour_storage_drawdown: SummaryByHour::default(),
            total_grid_losses: 0.0,
            correlation_intensity_to_fuel: BTreeMap::new(),
        }
    }

    /// True when this summary's use-by time has passed.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now > self.use_by_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_summary_by_hour_defaults_to_absent() {
        let hours = SummaryByHour::default();
        assert_eq!(hours.populated_count(), 0);
        assert!(!hours.is_fully_populated());
        assert_eq!(hours.get(0), None);
        assert_eq!(hours.get(99), None);
    }

    #[test]
    fn test_summary_by_hour_set_and_full() {
        let mut hours = SummaryByHour::default();
        for h in 0..SummaryByHour::HOURS {
            hours.set(h, h as i64 * 10);
        }
        assert!(hours.is_fully_populated());
        assert_eq!(hours.get(23), Some(230));
        // Out-of-range set is ignored rather than panicking
        hours.set(24, 1);
        assert_eq!(hours.populated_count(), 24);
    }

    #[test]
    fn test_empty_summary_is_stale() {
        let now = Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap();
        let summary = CurrentSummary::empty(now);
        assert_eq!(summary.status, GridStatus::Insufficient);
        assert_eq!(summary.sample_count, 0);
        assert!(!summary.is_stale(now));
        assert!(summary.is_stale(now + chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_summary_round_trips_through_json() {
        let now = Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap();
        let mut summary = CurrentSummary::empty(now);
        summary.status = GridStatus::Green;
        summary.current_intensity = 123.4;
        summary.hour_intensity.set(7, 456);
        summary
            .correlation_intensity_to_fuel
            .insert("CCGT".to_owned(), 0.87);

        let json = serde_json::to_string(&summary).unwrap();
        let back: CurrentSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
    }
}
