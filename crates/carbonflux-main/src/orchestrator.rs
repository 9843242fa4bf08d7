// Copyright (c) 2026 Carbonflux Contributors
//
// This file is part of Carbonflux.
//
// Licensed under the MIT License. You may use, copy, modify, and distribute
// this file under the terms of that license.
//
// This software is provided "AS IS", without warranty of any kind.

//! One cycle of the pipeline: load and fetch concurrently, validate,
//! aggregate the 24h and 7-day windows side by side, then fan out to
//! the publish units under a single deadline.

use crate::publish::{DataLog, FlagFile, PostGate, StatusSink};
use anyhow::{Context, Result};
use carbonflux_core::{
    BucketAlg, BucketTable, RowTemplate, bucket_intensities, compute_summary, intensity_series,
    intensity_table, validate_batch,
};
use carbonflux_feed::FeedClient;
use carbonflux_store::{LongTermStore, SnapshotCache};
use carbonflux_types::{CurrentSummary, FuelRow, IntensityConfig, SystemConfig};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::task::{self, JoinSet};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Overall deadline for the publish fan-out. On expiry the cycle
/// proceeds regardless; stragglers are abandoned, not awaited.
const PUBLISH_DEADLINE: Duration = Duration::from_secs(30);

/// What one cycle produced, for the caller to report on.
#[derive(Debug)]
pub struct CycleOutcome {
    /// The 24h summary (or the cache/empty fallback).
    pub summary: CurrentSummary,
    /// Summary over the full long-term store window; present whenever
    /// the store holds rows, live fetch or not.
    pub week_summary: Option<CurrentSummary>,
    /// Hour-of-day intensity table over the store window.
    pub week_table: Option<BucketTable>,
    /// True when the live batch was unusable and the cache stood in.
    pub used_fallback: bool,
    /// Publish units that failed this cycle (failures are isolated).
    pub failed_units: Vec<String>,
}

/// Run one full fetch → validate → aggregate → publish cycle.
///
/// Only pre-fetch configuration problems are fatal. A failed fetch or
/// a rejected batch falls back to the cached snapshot, and a failing
/// publish unit is logged and isolated without cancelling its siblings.
pub async fn run_cycle(config: &SystemConfig, now: DateTime<Utc>) -> Result<CycleOutcome> {
    let template = RowTemplate::new(&config.feed.columns);
    let store = LongTermStore::new(&config.store.store_path, config.store.retention_rows);
    let cache = SnapshotCache::new(&config.store.cache_path);
    let client = FeedClient::new(config.feed.url.clone())
        .context("Failed to build feed client")?;

    // Store load and live fetch have no data dependency; run together.
    let load_task = {
        let store = store.clone();
        task::spawn_blocking(move || store.load())
    };
    let (stored, fetched) = tokio::join!(load_task, client.fetch_rows(&config.feed.record_type));
    let stored = match stored.context("Store load task panicked")? {
        Ok(rows) => rows,
        Err(err) => {
            warn!("Long-term store unreadable, continuing without: {err:#}");
            Vec::new()
        }
    };

    let batch = match fetched {
        Ok(rows) => match validate_batch(
            &template,
            rows,
            now,
            config.feed.expected_rows,
            config.feed.future_skew(),
            Some(&stored),
        ) {
            Ok(rows) => Some(rows),
            Err(err) => {
                warn!("Batch rejected: {err}");
                None
            }
        },
        Err(err) => {
            warn!("Feed fetch failed: {err}");
            None
        }
    };

    let max_age = config.feed.max_age();
    let (summary, week_summary, week_table, used_fallback) = match batch {
        Some(rows) => {
            // Reconcile first so the 7-day window includes this batch.
            let merged = {
                let store = store.clone();
                let template = template.clone();
                let rows = rows.clone();
                task::spawn_blocking(move || store.reconcile(&rows, &template))
                    .await
                    .context("Store reconcile task panicked")?
            };
            let merged = match merged {
                Ok(merged) => merged,
                Err(err) => {
                    warn!("Long-term store reconcile failed: {err:#}");
                    rows.clone()
                }
            };

            let day_task = {
                let template = template.clone();
                let intensity = config.intensity.clone();
                task::spawn_blocking(move || {
                    compute_summary(&rows, &template, &intensity, max_age, now)
                })
            };
            let week_task = {
                let template = template.clone();
                let intensity = config.intensity.clone();
                task::spawn_blocking(move || week_window(&merged, &template, &intensity, max_age, now))
            };
            let (day, week) = tokio::join!(day_task, week_task);
            let summary = day.context("Summary task panicked")?;
            let (week_summary, week_table) = week.context("Aggregation task panicked")?;
            (summary, Some(week_summary), week_table, false)
        }
        None => {
            // The 7-day window only needs the store; it still runs
            // when the live batch was unusable.
            let fallback_task = {
                let cache = cache.clone();
                task::spawn_blocking(move || cache.resolve_fallback(now))
            };
            let week_task = (!stored.is_empty()).then(|| {
                let template = template.clone();
                let intensity = config.intensity.clone();
                task::spawn_blocking(move || week_window(&stored, &template, &intensity, max_age, now))
            });
            let summary = fallback_task
                .await
                .context("Cache fallback task panicked")?;
            let (week_summary, week_table) = match week_task {
                Some(handle) => {
                    let (week_summary, week_table) =
                        handle.await.context("Aggregation task panicked")?;
                    (Some(week_summary), week_table)
                }
                None => (None, None),
            };
            (summary, week_summary, week_table, true)
        }
    };

    let failed_units = publish(config, &cache, &summary, !used_fallback, now).await;

    Ok(CycleOutcome {
        summary,
        week_summary,
        week_table,
        used_fallback,
        failed_units,
    })
}

fn week_window(
    rows: &[FuelRow],
    template: &RowTemplate,
    intensity: &IntensityConfig,
    max_age: chrono::Duration,
    now: DateTime<Utc>,
) -> (CurrentSummary, Option<BucketTable>) {
    let summary = compute_summary(rows, template, intensity, max_age, now);
    let series = intensity_series(rows, template, intensity);
    let table = (!series.is_empty())
        .then(|| intensity_table(&bucket_intensities(&series, BucketAlg::HourOfDay)));
    (summary, table)
}

/// Fan out to the publish units, join them under the deadline, then
/// run the post gate strictly after the flag publish has succeeded.
///
/// The snapshot cache holds the last summary computed from real data;
/// a fallback summary is published to the flag and log but never
/// written back over the cached snapshot.
async fn publish(
    config: &SystemConfig,
    cache: &SnapshotCache,
    summary: &CurrentSummary,
    cache_summary: bool,
    now: DateTime<Utc>,
) -> Vec<String> {
    let mut units: JoinSet<(&'static str, Result<()>)> = JoinSet::new();
    {
        let flag = FlagFile::new(&config.output.flag_path);
        let summary = summary.clone();
        units.spawn_blocking(move || (flag.name(), flag.publish(&summary)));
    }
    {
        let log = DataLog::new(&config.output.log_path);
        let summary = summary.clone();
        units.spawn_blocking(move || (log.name(), log.publish(&summary)));
    }
    if cache_summary {
        let cache = cache.clone();
        let summary = summary.clone();
        units.spawn_blocking(move || ("snapshot-cache", cache.save(&summary, now)));
    }

    let join_all = async {
        let mut failed = Vec::new();
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok((name, Ok(()))) => debug!("Publish unit {} done", name),
                Ok((name, Err(err))) => {
                    warn!("Publish unit {} failed: {err:#}", name);
                    failed.push(name.to_owned());
                }
                Err(err) => {
                    warn!("Publish unit panicked: {err}");
                    failed.push("panicked".to_owned());
                }
            }
        }
        failed
    };
    let mut failed = match timeout(PUBLISH_DEADLINE, join_all).await {
        Ok(failed) => failed,
        Err(_) => {
            warn!(
                "Publish units still running after {}s; proceeding without them",
                PUBLISH_DEADLINE.as_secs()
            );
            vec!["deadline-expired".to_owned()]
        }
    };

    // The post references the published status, so it runs only after
    // the flag write has succeeded.
    if config.post.enabled {
        if failed.iter().any(|n| n == "flag-file" || n == "deadline-expired") {
            warn!("Skipping status post: flag publish did not complete");
        } else {
            let gate = PostGate::new(&config.post.state_path, config.post.min_interval());
            let status = summary.status;
            let posted = task::spawn_blocking(move || {
                if gate.should_post(status, now) {
                    info!("Grid status is now {}; announcing", status.label());
                    gate.record(status, now)?;
                }
                Ok::<_, anyhow::Error>(())
            })
            .await;
            match posted {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!("Status post failed: {err:#}");
                    failed.push("status-post".to_owned());
                }
                Err(err) => {
                    warn!("Status post task panicked: {err}");
                    failed.push("status-post".to_owned());
                }
            }
        }
    }
    failed
}
