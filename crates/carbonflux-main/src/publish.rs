// Copyright (c) 2026 Carbonflux Contributors
//
// This file is part of Carbonflux.
//
// Licensed under the MIT License. You may use, copy, modify, and distribute
// this file under the terms of that license.
//
// This software is provided "AS IS", without warranty of any kind.

//! Downstream publish seams: the status flag file, the append-only
//! data log, and the social-post gate. Page/icon/social rendering is
//! external; these write the artifacts those collaborators consume.

use anyhow::{Context, Result};
use carbonflux_types::{CurrentSummary, GridStatus};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Something that accepts a finished summary for publication.
pub trait StatusSink {
    fn name(&self) -> &'static str;
    fn publish(&self, summary: &CurrentSummary) -> Result<()>;
}

/// Writes the current status word to the flag file. Pages that link to
/// the flag are rendered after this, so the write is atomic.
#[derive(Debug, Clone)]
pub struct FlagFile {
    path: PathBuf,
}

impl FlagFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StatusSink for FlagFile {
    fn name(&self) -> &'static str {
        "flag-file"
    }

    fn publish(&self, summary: &CurrentSummary) -> Result<()> {
        ensure_parent(&self.path)?;
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, summary.status.label())
            .with_context(|| format!("Failed to write temp file {}", temp_path.display()))?;
        fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Failed to rename temp file to {}", self.path.display()))?;
        debug!("Wrote status {} to {}", summary.status.label(), self.path.display());
        Ok(())
    }
}

/// Appends one CSV line per cycle: timestamp, intensity, status.
#[derive(Debug, Clone)]
pub struct DataLog {
    path: PathBuf,
}

impl DataLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StatusSink for DataLog {
    fn name(&self) -> &'static str {
        "data-log"
    }

    fn publish(&self, summary: &CurrentSummary) -> Result<()> {
        ensure_parent(&self.path)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open data log {}", self.path.display()))?;
        writeln!(
            file,
            "{},{:.1},{}",
            summary.timestamp.timestamp_millis(),
            summary.current_intensity,
            summary.status.label()
        )
        .context("Failed to append to data log")?;
        Ok(())
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.exists()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

/// Last successfully posted status, persisted between cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LastPost {
    status: GridStatus,
    at: DateTime<Utc>,
}

/// Cooldown and duplicate suppression for status posts.
///
/// A post goes out only for a classified status that differs from the
/// last posted one, and only after the minimum inter-post interval has
/// elapsed. Runs strictly after the page publish succeeds because the
/// post references the published page.
#[derive(Debug, Clone)]
pub struct PostGate {
    state_path: PathBuf,
    min_interval: Duration,
}

impl PostGate {
    pub fn new(state_path: impl Into<PathBuf>, min_interval: Duration) -> Self {
        Self {
            state_path: state_path.into(),
            min_interval,
        }
    }

    /// Decide whether the given status should be posted now.
    pub fn should_post(&self, status: GridStatus, now: DateTime<Utc>) -> bool {
        if status == GridStatus::Insufficient {
            debug!("Post suppressed: status is unclassified");
            return false;
        }
        match self.load() {
            Some(last) if last.status == status => {
                debug!("Post suppressed: status {} unchanged", status.label());
                false
            }
            Some(last) if now - last.at < self.min_interval => {
                debug!(
                    "Post suppressed: last post at {} is within the {}s cooldown",
                    last.at,
                    self.min_interval.num_seconds()
                );
                false
            }
            _ => true,
        }
    }

    /// Record a successful post.
    pub fn record(&self, status: GridStatus, now: DateTime<Utc>) -> Result<()> {
        ensure_parent(&self.state_path)?;
        let json = serde_json::to_string_pretty(&LastPost { status, at: now })
            .context("Failed to serialize post state")?;
        fs::write(&self.state_path, json)
            .with_context(|| format!("Failed to write post state {}", self.state_path.display()))?;
        info!("Recorded posted status {} at {}", status.label(), now);
        Ok(())
    }

    fn load(&self) -> Option<LastPost> {
        let contents = fs::read_to_string(&self.state_path).ok()?;
        serde_json::from_str(&contents).ok()
    }
}
