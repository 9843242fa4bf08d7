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

/// One raw record from the generation-by-fuel feed.
///
/// Fields are positional strings; their meaning is assigned by the
/// configured column template (see `carbonflux-core`'s row extractor).
/// The same shape is used for the live feed and the long-term store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuelRow {
    pub fields: Vec<String>,
}

impl FuelRow {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    /// Field at a given position, if present.
    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }
}

/// Generation snapshot extracted from a single feed row.
///
/// Maps fuel code to instantaneous generation in MW (never negative).
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSample {
    pub timestamp: DateTime<Utc>,
    pub generation_by_fuel: BTreeMap<String, f64>,
}

impl GenerationSample {
    /// Total generation across all fuels (MW).
    pub fn total_mw(&self) -> f64 {
        self.generation_by_fuel.values().sum()
    }
}
