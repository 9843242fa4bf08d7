// Copyright (c) 2026 Carbonflux Contributors
//
// This file is part of Carbonflux.
//
// Licensed under the MIT License. You may use, copy, modify, and distribute
// this file under the terms of that license.
//
// This software is provided "AS IS", without warranty of any kind.

//! Batch-level validation and gap repair for freshly fetched rows.
//!
//! Validation is all-or-nothing at the batch level: a structurally
//! broken batch is rejected outright and the caller falls back to the
//! cached snapshot. Individually malformed rows inside an accepted
//! batch are left in place; the aggregator skips them row by row.

use crate::row::RowTemplate;
use carbonflux_types::FuelRow;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Row-count slack over the expected bound before a batch counts as
/// structurally broken.
const ROW_COUNT_SLACK: usize = 2;

/// Structural defects that reject a whole batch.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("batch is empty")]
    Empty,
    #[error("no row carries a parseable timestamp")]
    NoTimestamps,
    #[error("rows out of chronological order at index {index}")]
    OutOfOrder { index: usize },
    #[error("timestamp {timestamp} is beyond the future-skew tolerance")]
    FutureTimestamp { timestamp: DateTime<Utc> },
    #[error("{got} rows wildly exceeds the expected bound {max}")]
    TooManyRows { got: usize, max: usize },
}

/// Validate a fetched batch, splicing in store rows where the feed
/// silently dropped its newest records.
///
/// The upstream feed under load drops its most recent records rather
/// than erroring; when the long-term store holds newer rows than the
/// batch's tail, those rows are appended and the batch continues.
/// Anything else structurally wrong rejects the batch.
pub fn validate_batch(
    template: &RowTemplate,
    mut rows: Vec<FuelRow>,
    now: DateTime<Utc>,
    expected_rows: usize,
    future_skew: Duration,
    store: Option<&[FuelRow]>,
) -> Result<Vec<FuelRow>, ValidationError> {
    if rows.is_empty() {
        return Err(ValidationError::Empty);
    }

    let max_rows = expected_rows.saturating_mul(ROW_COUNT_SLACK);
    if rows.len() > max_rows {
        return Err(ValidationError::TooManyRows {
            got: rows.len(),
            max: max_rows,
        });
    }

    // Structural checks run over rows whose timestamps parse; rows with
    // broken timestamps stay in the batch and are skipped later.
    let horizon = now + future_skew;
    let mut previous: Option<DateTime<Utc>> = None;
    let mut newest: Option<DateTime<Utc>> = None;
    for (index, row) in rows.iter().enumerate() {
        let timestamp = match template.timestamp(row) {
            Ok(ts) => ts,
            Err(err) => {
                debug!("Row {} has no usable timestamp: {}", index, err);
                continue;
            }
        };
        if timestamp > horizon {
            return Err(ValidationError::FutureTimestamp { timestamp });
        }
        if let Some(prev) = previous
            && timestamp < prev
        {
            return Err(ValidationError::OutOfOrder { index });
        }
        previous = Some(timestamp);
        newest = Some(timestamp);
    }
    let Some(newest) = newest else {
        return Err(ValidationError::NoTimestamps);
    };

    // Tail repair: splice store rows newer than the batch's newest.
    if let Some(store_rows) = store {
        let mut spliced = 0usize;
        let mut patch: Vec<(DateTime<Utc>, FuelRow)> = Vec::new();
        for row in store_rows {
            match template.timestamp(row) {
                Ok(ts) if ts > newest && ts <= horizon => patch.push((ts, row.clone())),
                Ok(_) => {}
                Err(err) => warn!("Skipping store row with bad timestamp: {}", err),
            }
        }
        patch.sort_by_key(|(ts, _)| *ts);
        for (_, row) in patch {
            rows.push(row);
            spliced += 1;
        }
        if spliced > 0 {
            info!(
                "Live feed batch ended at {}; spliced {} newer rows from the long-term store",
                newest, spliced
            );
        }
    }

    // The splice can only grow the batch; the count bound holds for the
    // repaired batch too.
    if rows.len() > max_rows {
        return Err(ValidationError::TooManyRows {
            got: rows.len(),
            max: max_rows,
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn template() -> RowTemplate {
        let columns: Vec<String> = ["type", "timestamp", "CCGT", "WIND"]
            .iter()
            .map(|s| (*s).to_owned())
            .collect();
        RowTemplate::new(&columns)
    }

    fn row_at(ts: DateTime<Utc>) -> FuelRow {
        FuelRow::new(vec![
            "FUELINST".to_owned(),
            ts.timestamp_millis().to_string(),
            "1000".to_owned(),
            "2000".to_owned(),
        ])
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_ordered_batch_passes() {
        let template = template();
        let now = base() + Duration::hours(4);
        let rows: Vec<FuelRow> = (0..4).map(|h| row_at(base() + Duration::hours(h))).collect();
        let validated =
            validate_batch(&template, rows, now, 288, Duration::minutes(15), None).unwrap();
        assert_eq!(validated.len(), 4);
    }

    #[test]
    fn test_empty_batch_rejected() {
        let template = template();
        assert!(matches!(
            validate_batch(&template, Vec::new(), base(), 288, Duration::minutes(15), None),
            Err(ValidationError::Empty)
        ));
    }

    #[test]
    fn test_out_of_order_batch_rejected() {
        let template = template();
        let now = base() + Duration::hours(4);
        let rows = vec![
            row_at(base() + Duration::hours(2)),
            row_at(base() + Duration::hours(1)),
        ];
        assert!(matches!(
            validate_batch(&template, rows, now, 288, Duration::minutes(15), None),
            Err(ValidationError::OutOfOrder { index: 1 })
        ));
    }

    #[test]
    fn test_future_timestamp_rejected() {
        let template = template();
        let now = base();
        let rows = vec![row_at(now + Duration::hours(1))];
        assert!(matches!(
            validate_batch(&template, rows, now, 288, Duration::minutes(15), None),
            Err(ValidationError::FutureTimestamp { .. })
        ));
    }

    #[test]
    fn test_row_count_blowout_rejected() {
        let template = template();
        let now = base() + Duration::hours(1);
        let rows: Vec<FuelRow> = (0..20).map(|_| row_at(base())).collect();
        assert!(matches!(
            validate_batch(&template, rows, now, 5, Duration::minutes(15), None),
            Err(ValidationError::TooManyRows { got: 20, max: 10 })
        ));
    }

    #[test]
    fn test_dropped_tail_spliced_from_store() {
        let template = template();
        let now = base() + Duration::hours(6);
        // Feed dropped the two newest records; the store still has them
        let batch: Vec<FuelRow> = (0..4).map(|h| row_at(base() + Duration::hours(h))).collect();
        let store: Vec<FuelRow> = (0..6).map(|h| row_at(base() + Duration::hours(h))).collect();
        let validated = validate_batch(
            &template,
            batch,
            now,
            288,
            Duration::minutes(15),
            Some(&store),
        )
        .unwrap();
        assert_eq!(validated.len(), 6);
        let last = template.timestamp(validated.last().unwrap()).unwrap();
        assert_eq!(last, base() + Duration::hours(5));
    }

    #[test]
    fn test_store_rows_older_than_batch_not_spliced() {
        let template = template();
        let now = base() + Duration::hours(4);
        let batch: Vec<FuelRow> = (2..4).map(|h| row_at(base() + Duration::hours(h))).collect();
        let store: Vec<FuelRow> = (0..2).map(|h| row_at(base() + Duration::hours(h))).collect();
        let validated = validate_batch(
            &template,
            batch,
            now,
            288,
            Duration::minutes(15),
            Some(&store),
        )
        .unwrap();
        assert_eq!(validated.len(), 2);
    }

    #[test]
    fn test_spliced_batch_still_bounded() {
        let template = template();
        let now = base() + Duration::hours(12);
        // Batch is at the bound already; a large store splice must not
        // push it past unchecked
        let batch: Vec<FuelRow> = (0..4).map(|h| row_at(base() + Duration::hours(h))).collect();
        let store: Vec<FuelRow> = (0..12).map(|h| row_at(base() + Duration::hours(h))).collect();
        let result = validate_batch(
            &template,
            batch,
            now,
            2,
            Duration::minutes(15),
            Some(&store),
        );
        assert!(matches!(
            result,
            Err(ValidationError::TooManyRows { got: 12, max: 4 })
        ));
    }

    #[test]
    fn test_rows_without_timestamps_tolerated_inside_batch() {
        let template = template();
        let now = base() + Duration::hours(2);
        let mut rows = vec![row_at(base()), row_at(base() + Duration::hours(1))];
        rows.insert(
            1,
            FuelRow::new(vec!["FUELINST".to_owned(), "garbage".to_owned()]),
        );
        let validated =
            validate_batch(&template, rows, now, 288, Duration::minutes(15), None).unwrap();
        // The malformed row stays; the aggregator skips it later
        assert_eq!(validated.len(), 3);
    }
}
