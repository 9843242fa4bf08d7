// Copyright (c) 2026 Carbonflux Contributors
//
// This file is part of Carbonflux.
//
// Licensed under the MIT License. You may use, copy, modify, and distribute
// this file under the terms of that license.
//
// This software is provided "AS IS", without warranty of any kind.

//! Weighted carbon-intensity arithmetic.

use std::collections::BTreeMap;
use tracing::warn;

/// Sentinel returned when a fuel mix is too thin to classify.
pub const INSUFFICIENT_DATA: f64 = -1.0;

/// Generation-weighted carbon intensity of a fuel mix (gCO2/kWh).
///
/// Only fuels present in both maps contribute. Returns
/// [`INSUFFICIENT_DATA`] when fewer than `min_fuel_types` common fuels
/// exist, or fewer than that many carry nonzero generation, or any
/// generation value is negative (caller contract violation). Returns
/// 0.0 for an all-zero mix that still meets the diversity floor.
///
/// Fuels present in `generation` but absent from `intensities` are
/// ignored; neither input is mutated.
pub fn weighted_intensity(
    intensities: &BTreeMap<String, f64>,
    generation: &BTreeMap<String, f64>,
    min_fuel_types: usize,
) -> f64 {
    let mut common = 0usize;
    let mut nonzero = 0usize;
    let mut weighted_sum = 0.0;
    let mut total_power = 0.0;

    for (fuel, power) in generation {
        if *power < 0.0 {
            warn!("Negative generation {} MW for fuel {}", power, fuel);
            return INSUFFICIENT_DATA;
        }
        let Some(intensity) = intensities.get(fuel) else {
            continue;
        };
        common += 1;
        if *power > 0.0 {
            nonzero += 1;
            weighted_sum += power * intensity;
            total_power += power;
        }
    }

    if common < min_fuel_types || nonzero < min_fuel_types {
        return INSUFFICIENT_DATA;
    }
    if total_power <= 0.0 {
        return 0.0;
    }
    weighted_sum / total_power
}

/// Spread of a value range as a percentage of its maximum.
///
/// Always in [0, 100] for `0 <= min <= max`; 0 when `max` is zero.
pub fn variability(min: f64, max: f64) -> f64 {
    if max <= 0.0 {
        return 0.0;
    }
    (100.0 * (1.0 - min / max)).clamp(0.0, 100.0)
}
