// Copyright (c) 2026 Carbonflux Contributors
//
// This file is part of Carbonflux.
//
// Licensed under the MIT License. You may use, copy, modify, and distribute
// this file under the terms of that license.
//
// This software is provided "AS IS", without warranty of any kind.

pub mod config;
pub mod row;
pub mod summary;

// Re-export common types for convenience
pub use config::{
    ConfigError, FeedConfig, FuelIntensityEntry, IntensityConfig, OutputConfig, PostConfig,
    StoreConfig, SystemConfig,
};
pub use row::{FuelRow, GenerationSample};
pub use summary::{CurrentSummary, GridStatus, SummaryByHour, Trend};
