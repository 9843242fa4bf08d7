// Copyright (c) 2026 Carbonflux Contributors
//
// This file is part of Carbonflux.
//
// Licensed under the MIT License. You may use, copy, modify, and distribute
// this file under the terms of that license.
//
// This software is provided "AS IS", without warranty of any kind.

pub mod bucket;
pub mod correlate;
pub mod intensity;
pub mod row;
pub mod summary;
pub mod tables;
pub mod validate;

pub use bucket::{BucketAlg, BucketSnapshot, Bucketer, TimedValue};
pub use correlate::{align_by_timestamp, pearson};
pub use intensity::{INSUFFICIENT_DATA, variability, weighted_intensity};
pub use row::{RowError, RowTemplate};
pub use summary::{compute_summary, intensity_series};
pub use tables::{BucketTable, BucketTableRow, bucket_intensities, intensity_table};
pub use validate::{ValidationError, validate_batch};
