// Copyright (c) 2026 Carbonflux Contributors
//
// This file is part of Carbonflux.
//
// Licensed under the MIT License. You may use, copy, modify, and distribute
// this file under the terms of that license.
//
// This software is provided "AS IS", without warranty of any kind.

//! Cached last-good summary, used for staleness fallback.

use anyhow::{Context, Result};
use carbonflux_types::CurrentSummary;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Persists the most recent non-stale [`CurrentSummary`] as JSON.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    cache_path: PathBuf,
}

impl SnapshotCache {
    pub fn new(cache_path: impl Into<PathBuf>) -> Self {
        Self {
            cache_path: cache_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.cache_path
    }

    /// Load the cached summary, if one has ever been written.
    pub fn load(&self) -> Result<Option<CurrentSummary>> {
        if !self.cache_path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.cache_path)
            .with_context(|| format!("Failed to read cache from {}", self.cache_path.display()))?;
        let summary = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache from {}", self.cache_path.display()))?;
        Ok(Some(summary))
    }

    /// Persist a summary as the new cached snapshot.
    ///
    /// A summary whose use-by time has already elapsed is never cached;
    /// the existing snapshot (if any) is kept instead. Uses atomic
    /// write (temp file + rename) to prevent corruption.
    pub fn save(&self, summary: &CurrentSummary, now: DateTime<Utc>) -> Result<()> {
        if summary.is_stale(now) {
            warn!(
                "Not caching summary: already stale (use-by {}, now {})",
                summary.use_by_time, now
            );
            return Ok(());
        }

        if let Some(parent) = self.cache_path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(summary).context("Failed to serialize summary")?;
        let temp_path = self.cache_path.with_extension("tmp");
        fs::write(&temp_path, &json)
            .with_context(|| format!("Failed to write temp file {}", temp_path.display()))?;
        fs::rename(&temp_path, &self.cache_path).with_context(|| {
            format!("Failed to rename temp file to {}", self.cache_path.display())
        })?;

        info!(
            "Cached summary at {} (status {}, use-by {})",
            self.cache_path.display(),
            summary.status.label(),
            summary.use_by_time
        );
        Ok(())
    }

    /// Fallback summary for a cycle with no usable fetch: the cached
    /// snapshot when it exists and is still fresh by wall clock,
    /// otherwise the well-defined empty summary.
    pub fn resolve_fallback(&self, now: DateTime<Utc>) -> CurrentSummary {
        match self.load() {
            Ok(Some(cached)) if !cached.is_stale(now) => {
                info!(
                    "Falling back to cached summary from {} (use-by {})",
                    cached.timestamp, cached.use_by_time
                );
                cached
            }
            Ok(Some(cached)) => {
                warn!(
                    "Cached summary is stale (use-by {}); reporting empty summary",
                    cached.use_by_time
                );
                CurrentSummary::empty(now)
            }
            Ok(None) => {
                warn!("No cached summary available; reporting empty summary");
                CurrentSummary::empty(now)
            }
            Err(err) => {
                warn!("Failed to load cached summary: {:#}", err);
                CurrentSummary::empty(now)
            }
        }
    }
}
