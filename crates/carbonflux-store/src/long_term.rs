// Copyright (c) 2026 Carbonflux Contributors
//
// This file is part of Carbonflux.
//
// Licensed under the MIT License. You may use, copy, modify, and distribute
// this file under the terms of that license.
//
// This software is provided "AS IS", without warranty of any kind.

//! Flat 7-day record store: append, dedupe, trim.
//!
//! The store keeps raw feed rows so it can both seed 7-day summaries
//! and patch gaps in fresh fetches. Reconciliation builds a whole new
//! ordered list and replaces the file wholesale; other components only
//! ever see complete versions.

use anyhow::{Context, Result};
use carbonflux_core::RowTemplate;
use carbonflux_types::FuelRow;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Long-term flat record store with a fixed retention cap.
#[derive(Debug, Clone)]
pub struct LongTermStore {
    store_path: PathBuf,
    retention_rows: usize,
}

impl LongTermStore {
    pub fn new(store_path: impl Into<PathBuf>, retention_rows: usize) -> Self {
        Self {
            store_path: store_path.into(),
            retention_rows,
        }
    }

    pub fn path(&self) -> &Path {
        &self.store_path
    }

    /// Load all stored rows, oldest first. A missing file is an empty
    /// store, not an error.
    pub fn load(&self) -> Result<Vec<FuelRow>> {
        if !self.store_path.exists() {
            debug!("Store file {} not found; starting empty", self.store_path.display());
            return Ok(Vec::new());
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.store_path)
            .with_context(|| format!("Failed to open store {}", self.store_path.display()))?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record
                .with_context(|| format!("Failed to read store {}", self.store_path.display()))?;
            rows.push(FuelRow::new(record.iter().map(str::to_owned).collect()));
        }
        debug!("Loaded {} rows from {}", rows.len(), self.store_path.display());
        Ok(rows)
    }

    /// Merge a fresh batch into existing store rows.
    ///
    /// Rows are keyed by timestamp; a batch row with a duplicate
    /// timestamp replaces the stored one. The result is sorted oldest
    /// first and trimmed to the retention cap. Rows whose timestamp
    /// does not parse are dropped with a warning.
    pub fn merge(
        &self,
        existing: &[FuelRow],
        batch: &[FuelRow],
        template: &RowTemplate,
    ) -> Vec<FuelRow> {
        let mut by_timestamp: BTreeMap<i64, FuelRow> = BTreeMap::new();
        for row in existing.iter().chain(batch) {
            match template.timestamp(row) {
                Ok(ts) => {
                    by_timestamp.insert(ts.timestamp_millis(), row.clone());
                }
                Err(err) => warn!("Dropping store row with bad timestamp: {}", err),
            }
        }

        let total = by_timestamp.len();
        let skip = total.saturating_sub(self.retention_rows);
        if skip > 0 {
            debug!("Trimming {} rows beyond the {}-row retention cap", skip, self.retention_rows);
        }
        by_timestamp.into_values().skip(skip).collect()
    }

    /// Replace the store file with a new row list (atomic write).
    pub fn save(&self, rows: &[FuelRow]) -> Result<()> {
        if let Some(parent) = self.store_path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let temp_path = self.store_path.with_extension("tmp");
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_path(&temp_path)
                .with_context(|| format!("Failed to write temp file {}", temp_path.display()))?;
            for row in rows {
                writer
                    .write_record(&row.fields)
                    .context("Failed to write store row")?;
            }
            writer.flush().context("Failed to flush store file")?;
        }
        fs::rename(&temp_path, &self.store_path).with_context(|| {
            format!("Failed to rename temp file to {}", self.store_path.display())
        })?;

        info!("Saved {} rows to {}", rows.len(), self.store_path.display());
        Ok(())
    }

    /// Load, merge and save in one step, returning the reconciled list.
    pub fn reconcile(&self, batch: &[FuelRow], template: &RowTemplate) -> Result<Vec<FuelRow>> {
        let existing = self.load()?;
        let merged = self.merge(&existing, batch, template);
        self.save(&merged)?;
        Ok(merged)
    }
}
