// Copyright (c) 2026 Carbonflux Contributors
//
// This file is part of Carbonflux.
//
// Licensed under the MIT License. You may use, copy, modify, and distribute
// this file under the terms of that license.
//
// This software is provided "AS IS", without warranty of any kind.

//! Positional column template and per-row field extraction.

use carbonflux_types::{FuelRow, GenerationSample};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

/// Column names that can never be fuel codes.
const RESERVED_COLUMNS: [&str; 4] = ["type", "timestamp", "date", "settlementperiod"];

/// Errors raised while mapping the template onto a raw row.
#[derive(Debug, Error, PartialEq)]
pub enum RowError {
    #[error("row has no '{0}' field")]
    MissingField(&'static str),
    #[error("unparseable timestamp '{0}'")]
    BadTimestamp(String),
    #[error("unparseable value '{value}' in column '{column}'")]
    BadField { column: String, value: String },
    #[error("negative generation {value} MW for fuel '{fuel}'")]
    NegativeGeneration { fuel: String, value: f64 },
}

/// Maps a configured positional column template onto raw feed rows.
///
/// Fuel columns are detected by naming pattern: an uppercase first
/// letter followed by alphanumerics, excluding the reserved non-fuel
/// names. Built once per cycle and shared read-only.
#[derive(Debug, Clone)]
pub struct RowTemplate {
    positions: BTreeMap<String, usize>,
    fuel_columns: Vec<(String, usize)>,
    timestamp_index: usize,
}

impl RowTemplate {
    /// Build a template from the configured column names in feed order.
    /// The template must name a `timestamp` column (config validation
    /// enforces this before we get here).
    pub fn new(columns: &[String]) -> Self {
        let mut positions = BTreeMap::new();
        let mut fuel_columns = Vec::new();
        let mut timestamp_index = 0;
        for (index, name) in columns.iter().enumerate() {
            positions.insert(name.clone(), index);
            if name == "timestamp" {
                timestamp_index = index;
            }
            if is_fuel_name(name) {
                fuel_columns.push((name.clone(), index));
            }
        }
        Self {
            positions,
            fuel_columns,
            timestamp_index,
        }
    }

    /// Named field of a row, if the template and row both carry it.
    pub fn field<'r>(&self, row: &'r FuelRow, name: &str) -> Option<&'r str> {
        self.positions.get(name).and_then(|&i| row.field(i))
    }

    /// Fuel codes recognised by this template, in feed order.
    pub fn fuel_names(&self) -> impl Iterator<Item = &str> {
        self.fuel_columns.iter().map(|(name, _)| name.as_str())
    }

    /// Parse a row's timestamp (ms since epoch, UTC).
    pub fn timestamp(&self, row: &FuelRow) -> Result<DateTime<Utc>, RowError> {
        let raw = row
            .field(self.timestamp_index)
            .ok_or(RowError::MissingField("timestamp"))?;
        let millis: i64 = raw
            .trim()
            .parse()
            .map_err(|_| RowError::BadTimestamp(raw.to_owned()))?;
        match Utc.timestamp_millis_opt(millis) {
            chrono::LocalResult::Single(ts) => Ok(ts),
            chrono::LocalResult::Ambiguous(..) | chrono::LocalResult::None => {
                Err(RowError::BadTimestamp(raw.to_owned()))
            }
        }
    }

    /// Extract the full generation sample from a row. A missing fuel
    /// field reads as 0 MW (the feed drops trailing empty columns); a
    /// malformed or negative value fails the whole row.
    pub fn sample(&self, row: &FuelRow) -> Result<GenerationSample, RowError> {
        let timestamp = self.timestamp(row)?;
        let mut generation_by_fuel = BTreeMap::new();
        for (fuel, index) in &self.fuel_columns {
            let value = match row.field(*index) {
                None => 0.0,
                Some(raw) if raw.trim().is_empty() => 0.0,
                Some(raw) => raw.trim().parse::<f64>().map_err(|_| RowError::BadField {
                    column: fuel.clone(),
                    value: raw.to_owned(),
                })?,
            };
            if value < 0.0 {
                return Err(RowError::NegativeGeneration {
                    fuel: fuel.clone(),
                    value,
                });
            }
            generation_by_fuel.insert(fuel.clone(), value);
        }
        Ok(GenerationSample {
            timestamp,
            generation_by_fuel,
        })
    }
}

/// Fuel-code naming pattern: uppercase first letter, alphanumerics
/// after, and not a reserved column name.
fn is_fuel_name(name: &str) -> bool {
    if RESERVED_COLUMNS.contains(&name) {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_uppercase() => chars.all(|c| c.is_ascii_alphanumeric()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> RowTemplate {
        let columns: Vec<String> = ["type", "date", "settlementperiod", "timestamp", "CCGT", "WIND", "PS"]
            .iter()
            .map(|s| (*s).to_owned())
            .collect();
        RowTemplate::new(&columns)
    }

    fn row(fields: &[&str]) -> FuelRow {
        FuelRow::new(fields.iter().map(|s| (*s).to_owned()).collect())
    }

    #[test]
    fn test_fuel_detection_skips_reserved_columns() {
        let template = template();
        let fuels: Vec<&str> = template.fuel_names().collect();
        assert_eq!(fuels, vec!["CCGT", "WIND", "PS"]);
    }

    #[test]
    fn test_fuel_name_pattern() {
        assert!(is_fuel_name("CCGT"));
        assert!(is_fuel_name("Npshyd"));
        assert!(is_fuel_name("INTFR2"));
        assert!(!is_fuel_name("timestamp"));
        assert!(!is_fuel_name("type"));
        assert!(!is_fuel_name("ccgt"));
        assert!(!is_fuel_name("INT-FR"));
        assert!(!is_fuel_name(""));
    }

    #[test]
    fn test_sample_extraction() {
        let template = template();
        let row = row(&["FUELINST", "20260110", "12", "1768046400000", "12000", "8000", "400"]);
        let sample = template.sample(&row).unwrap();
        assert_eq!(sample.generation_by_fuel["CCGT"], 12000.0);
        assert_eq!(sample.generation_by_fuel["WIND"], 8000.0);
        assert_eq!(sample.total_mw(), 20400.0);
        assert_eq!(sample.timestamp.timestamp_millis(), 1768046400000);
    }

    #[test]
    fn test_missing_trailing_fuel_reads_as_zero() {
        let template = template();
        let row = row(&["FUELINST", "20260110", "12", "1768046400000", "12000"]);
        let sample = template.sample(&row).unwrap();
        assert_eq!(sample.generation_by_fuel["WIND"], 0.0);
        assert_eq!(sample.generation_by_fuel["PS"], 0.0);
    }

    #[test]
    fn test_bad_timestamp_fails_row() {
        let template = template();
        let row = row(&["FUELINST", "20260110", "12", "not-a-time", "12000", "1", "1"]);
        assert!(matches!(template.timestamp(&row), Err(RowError::BadTimestamp(_))));
    }

    #[test]
    fn test_malformed_and_negative_values_fail_row() {
        let template = template();
        let bad = row(&["FUELINST", "20260110", "12", "1768046400000", "twelve", "1", "1"]);
        assert!(matches!(template.sample(&bad), Err(RowError::BadField { .. })));
        let negative = row(&["FUELINST", "20260110", "12", "1768046400000", "-5", "1", "1"]);
        assert!(matches!(
            template.sample(&negative),
            Err(RowError::NegativeGeneration { .. })
        ));
    }

    #[test]
    fn test_row_errors_compare_by_value() {
        let template = template();
        let negative = row(&["FUELINST", "20260110", "12", "1768046400000", "-5", "1", "1"]);
        let err = template.sample(&negative).unwrap_err();
        assert_eq!(
            err,
            RowError::NegativeGeneration {
                fuel: "CCGT".to_owned(),
                value: -5.0,
            }
        );
        assert_ne!(err, RowError::MissingField("timestamp"));
    }

    #[test]
    fn test_named_field_access() {
        let template = template();
        let row = row(&["FUELINST", "20260110", "12", "1768046400000", "12000", "1", "1"]);
        assert_eq!(template.field(&row, "settlementperiod"), Some("12"));
        assert_eq!(template.field(&row, "nope"), None);
    }
}
