// Copyright (c) 2026 Carbonflux Contributors
//
// This file is part of Carbonflux.
//
// Licensed under the MIT License. You may use, copy, modify, and distribute
// this file under the terms of that license.
//
// This software is provided "AS IS", without warranty of any kind.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while validating static configuration.
///
/// Any of these is fatal: the cycle aborts before the first fetch.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("feed URL is empty")]
    EmptyFeedUrl,
    #[error("column template is empty")]
    EmptyColumnTemplate,
    #[error("column template has no '{0}' column")]
    MissingReservedColumn(&'static str),
    #[error("duplicate column name '{0}' in template")]
    DuplicateColumn(String),
    #[error("fuel '{fuel}' has negative intensity {intensity}")]
    NegativeIntensity { fuel: String, intensity: f64 },
    #[error("fuel '{fuel}' has an inverted year range {min}..={max}")]
    InvertedYearRange { fuel: String, min: i32, max: i32 },
    #[error("min_fuel_types must be at least 1")]
    ZeroMinFuelTypes,
    #[error("loss fraction '{name}' = {value} is outside [0, 1]")]
    BadLossFraction { name: String, value: f64 },
    #[error("store retention_rows must be positive")]
    ZeroRetention,
}

// ============= System Configuration =============

/// Top-level configuration, loaded from a single TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(rename = "feed")]
    pub feed: FeedConfig,
    #[serde(rename = "intensity")]
    pub intensity: IntensityConfig,
    #[serde(default, rename = "store")]
    pub store: StoreConfig,
    #[serde(default, rename = "output")]
    pub output: OutputConfig,
    #[serde(default, rename = "post")]
    pub post: PostConfig,
}

impl SystemConfig {
    /// Validate the whole configuration. Called before any fetch; an
    /// error here aborts the cycle.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.feed.validate()?;
        self.intensity.validate()?;
        self.store.validate()?;
        Ok(())
    }
}

/// Live feed location and row shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// URL of the generation-by-fuel feed.
    pub url: String,

    /// Record type tag expected in the feed's first column.
    #[serde(default = "default_record_type")]
    pub record_type: String,

    /// Positional column template applied to every row. Reserved names
    /// (`type`, `timestamp`, `date`, `settlementperiod`) are excluded
    /// from fuel detection; anything matching the fuel-code pattern is
    /// treated as a fuel column.
    pub columns: Vec<String>,

    /// Expected number of rows in a 24h fetch (feed cadence dependent).
    #[serde(default = "default_expected_rows")]
    pub expected_rows: usize,

    /// Tolerated clock skew before a timestamp counts as "from the
    /// future" (seconds).
    #[serde(default = "default_future_skew_secs")]
    pub future_skew_secs: u64,

    /// How long a computed summary stays usable past its newest sample
    /// (seconds). Drives the cache staleness fallback.
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
}

impl FeedConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::EmptyFeedUrl);
        }
        if self.columns.is_empty() {
            return Err(ConfigError::EmptyColumnTemplate);
        }
        if !self.columns.iter().any(|c| c == "timestamp") {
            return Err(ConfigError::MissingReservedColumn("timestamp"));
        }
        let mut seen = BTreeSet::new();
        for column in &self.columns {
            if !seen.insert(column) {
                return Err(ConfigError::DuplicateColumn(column.clone()));
            }
        }
        Ok(())
    }

    pub fn future_skew(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.future_skew_secs as i64)
    }

    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.max_age_secs as i64)
    }
}

fn default_record_type() -> String {
    "FUELINST".to_owned()
}

fn default_expected_rows() -> usize {
    // 5-minute cadence over 24 hours
    288
}

fn default_future_skew_secs() -> u64 {
    900
}

fn default_max_age_secs() -> u64 {
    3600
}

/// One per-fuel intensity entry (gCO2/kWh), optionally qualified by an
/// explicit year or an inclusive year range. An unqualified entry acts
/// as the default when no year-specific entry matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuelIntensityEntry {
    pub fuel: String,
    pub intensity: f64,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub min_year: Option<i32>,
    #[serde(default)]
    pub max_year: Option<i32>,
}

impl FuelIntensityEntry {
    /// True when this entry applies to the given year. Unqualified
    /// entries never match here; they are the fallback.
    fn matches_year(&self, year: i32) -> bool {
        if let Some(y) = self.year {
            return y == year;
        }
        match (self.min_year, self.max_year) {
            (None, None) => false,
            (min, max) => {
                min.is_none_or(|m| year >= m) && max.is_none_or(|m| year <= m)
            }
        }
    }

    fn is_default(&self) -> bool {
        self.year.is_none() && self.min_year.is_none() && self.max_year.is_none()
    }
}

/// Per-fuel intensity table plus the knobs of the summary computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntensityConfig {
    /// Intensity entries; multiple entries per fuel are allowed when
    /// year-qualified.
    pub fuels: Vec<FuelIntensityEntry>,

    /// Named grid-loss fractions (e.g. transmission, distribution).
    /// Each in [0, 1]; their sum is reported as total grid losses.
    #[serde(default)]
    pub loss_fractions: BTreeMap<String, f64>,

    /// Fuel codes whose generation is storage drawdown rather than
    /// primary generation.
    #[serde(default = "default_storage_fuels")]
    pub storage_fuels: BTreeSet<String>,

    /// Minimum distinct nonzero-generation fuels required before a
    /// row's weighted intensity is considered meaningful.
    #[serde(default = "default_min_fuel_types")]
    pub min_fuel_types: usize,
}

impl IntensityConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_fuel_types == 0 {
            return Err(ConfigError::ZeroMinFuelTypes);
        }
        for entry in &self.fuels {
            if entry.intensity < 0.0 {
                return Err(ConfigError::NegativeIntensity {
                    fuel: entry.fuel.clone(),
                    intensity: entry.intensity,
                });
            }
            if let (Some(min), Some(max)) = (entry.min_year, entry.max_year)
                && min > max
            {
                return Err(ConfigError::InvertedYearRange {
                    fuel: entry.fuel.clone(),
                    min,
                    max,
                });
            }
        }
        for (name, value) in &self.loss_fractions {
            if !(0.0..=1.0).contains(value) {
                return Err(ConfigError::BadLossFraction {
                    name: name.clone(),
                    value: *value,
                });
            }
        }
        Ok(())
    }

    /// Flatten the entry list into one intensity per fuel for the
    /// given year. Exact-year entries win over ranges, ranges over the
    /// unqualified default.
    pub fn intensities_for_year(&self, year: i32) -> BTreeMap<String, f64> {
        let mut table: BTreeMap<String, (u8, f64)> = BTreeMap::new();
        for entry in &self.fuels {
            let rank = if entry.year == Some(year) {
                3
            } else if entry.matches_year(year) {
                2
            } else if entry.is_default() {
                1
            } else {
                continue;
            };
            let slot = table.entry(entry.fuel.clone()).or_insert((0, 0.0));
            if rank > slot.0 {
                *slot = (rank, entry.intensity);
            }
        }
        table.into_iter().map(|(k, (_, v))| (k, v)).collect()
    }

    /// Sum of all configured loss fractions.
    pub fn total_grid_losses(&self) -> f64 {
        self.loss_fractions.values().sum()
    }
}

fn default_storage_fuels() -> BTreeSet<String> {
    BTreeSet::from(["PS".to_owned()])
}

fn default_min_fuel_types() -> usize {
    2
}

/// Cache and long-term store locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Cached last-good summary snapshot (JSON).
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,

    /// Long-term flat record store (CSV rows, feed schema).
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Retention cap in rows; 7 days of hourly samples by default.
    #[serde(default = "default_retention_rows")]
    pub retention_rows: usize,
}

impl StoreConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.retention_rows == 0 {
            return Err(ConfigError::ZeroRetention);
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_path: default_cache_path(),
            store_path: default_store_path(),
            retention_rows: default_retention_rows(),
        }
    }
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("./data/summary_cache.json")
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./data/fuel_store.csv")
}

fn default_retention_rows() -> usize {
    7 * 24
}

/// Locations of the files handed to downstream publishers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Status flag file read by page renderers. Written before any
    /// page that links to it.
    #[serde(default = "default_flag_path")]
    pub flag_path: PathBuf,

    /// Append-only intensity data log.
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            flag_path: default_flag_path(),
            log_path: default_log_path(),
        }
    }
}

fn default_flag_path() -> PathBuf {
    PathBuf::from("./data/status.flag")
}

fn default_log_path() -> PathBuf {
    PathBuf::from("./data/intensity_log.csv")
}

/// Status-post gating: cooldown and duplicate suppression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Minimum interval between posts (seconds).
    #[serde(default = "default_post_interval_secs")]
    pub min_interval_secs: u64,

    /// Where the last-posted status is remembered between cycles.
    #[serde(default = "default_post_state_path")]
    pub state_path: PathBuf,
}

impl PostConfig {
    pub fn min_interval(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.min_interval_secs as i64)
    }
}

impl Default for PostConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_interval_secs: default_post_interval_secs(),
            state_path: default_post_state_path(),
        }
    }
}

fn default_post_interval_secs() -> u64 {
    3600
}

fn default_post_state_path() -> PathBuf {
    PathBuf::from("./data/last_post.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> SystemConfig {
        toml::from_str(
            r#"
            [feed]
            url = "https://example.org/fuelinst"
            columns = ["type", "date", "settlementperiod", "timestamp", "CCGT", "COAL", "NUCLEAR", "WIND", "PS"]

            [intensity]
            min_fuel_types = 2
            fuels = [
                { fuel = "CCGT", intensity = 360.0 },
                { fuel = "COAL", intensity = 910.0 },
                { fuel = "COAL", intensity = 940.0, max_year = 2010 },
                { fuel = "NUCLEAR", intensity = 0.0 },
                { fuel = "WIND", intensity = 0.0 },
                { fuel = "PS", intensity = 500.0, year = 2026 },
                { fuel = "PS", intensity = 480.0 },
            ]

            [intensity.loss_fractions]
            transmission = 0.02
            distribution = 0.05
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_valid_config_passes_validation() {
        let config = sample_config();
        config.validate().unwrap();
        assert_eq!(config.feed.record_type, "FUELINST");
        assert_eq!(config.feed.expected_rows, 288);
        assert_eq!(config.store.retention_rows, 168);
        assert!(config.intensity.storage_fuels.contains("PS"));
    }

    #[test]
    fn test_year_qualified_lookup_precedence() {
        let config = sample_config();
        let now = config.intensity.intensities_for_year(2026);
        // Exact year beats the unqualified default
        assert_eq!(now.get("PS"), Some(&500.0));
        // Range entry applies only within its bounds
        assert_eq!(now.get("COAL"), Some(&910.0));
        let old = config.intensity.intensities_for_year(2009);
        assert_eq!(old.get("COAL"), Some(&940.0));
        assert_eq!(old.get("PS"), Some(&480.0));
    }

    #[test]
    fn test_total_grid_losses_sums_fractions() {
        let config = sample_config();
        assert!((config.intensity.total_grid_losses() - 0.07).abs() < 1e-12);
    }

    #[test]
    fn test_negative_intensity_rejected() {
        let mut config = sample_config();
        config.intensity.fuels.push(FuelIntensityEntry {
            fuel: "OIL".to_owned(),
            intensity: -1.0,
            year: None,
            min_year: None,
            max_year: None,
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NegativeIntensity { .. })
        ));
    }

    #[test]
    fn test_template_without_timestamp_rejected() {
        let mut config = sample_config();
        config.feed.columns = vec!["type".to_owned(), "CCGT".to_owned()];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingReservedColumn("timestamp"))
        ));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let mut config = sample_config();
        config.feed.columns.push("CCGT".to_owned());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateColumn(_))
        ));
    }
}
