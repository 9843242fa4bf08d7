// Copyright (c) 2026 Carbonflux Contributors
//
// This file is part of Carbonflux.
//
// Licensed under the MIT License. You may use, copy, modify, and distribute
// this file under the terms of that license.
//
// This software is provided "AS IS", without warranty of any kind.

mod config;
mod orchestrator;
mod publish;

use anyhow::Result;
use chrono::Utc;
use orchestrator::CycleOutcome;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::FmtSubscriber;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    println!("Carbonflux - grid carbon intensity monitor");
    println!("Version: {VERSION}");
    println!();
    println!("Usage: carbonflux [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -h, --help             Print this help message");
    println!("  -v, --version          Print version");
    println!("  -c, --config <PATH>    Config file (default ./carbonflux.toml,");
    println!("                         or the CARBONFLUX_CONFIG environment variable)");
    println!("      --interval <SECS>  Run continuously at the given cadence");
    println!("                         instead of a single cycle");
}

struct Args {
    config_path: Option<String>,
    interval_secs: Option<u64>,
}

fn parse_args() -> Result<Option<Args>> {
    let mut args = std::env::args().skip(1);
    let mut parsed = Args {
        config_path: None,
        interval_secs: None,
    };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(None);
            }
            "--version" | "-v" => {
                println!("{VERSION}");
                return Ok(None);
            }
            "--config" | "-c" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a path"))?;
                parsed.config_path = Some(path);
            }
            "--interval" => {
                let secs = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--interval requires seconds"))?;
                parsed.interval_secs = Some(secs.parse()?);
            }
            other => {
                anyhow::bail!("Unknown argument: {other} (try --help)");
            }
        }
    }
    Ok(Some(parsed))
}

#[tokio::main]
async fn main() -> Result<()> {
    let Some(args) = parse_args()? else {
        return Ok(());
    };

    // Respects RUST_LOG, defaults to info
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    // Any configuration problem here is fatal; nothing has been
    // fetched or published yet.
    let config = config::load_config(args.config_path.as_deref())?;

    info!("Starting Carbonflux {}", VERSION);
    info!("Configuration summary:");
    info!("   Feed: {} ({})", config.feed.url, config.feed.record_type);
    info!(
        "   Columns: {} ({} fuels expected)",
        config.feed.columns.len(),
        config.intensity.fuels.len()
    );
    info!("   Store: {}", config.store.store_path.display());
    info!("   Cache: {}", config.store.cache_path.display());
    info!("   Status posts enabled: {}", config.post.enabled);

    match args.interval_secs {
        None => {
            let outcome = orchestrator::run_cycle(&config, Utc::now()).await?;
            report(&outcome);
        }
        Some(secs) => {
            info!("Running every {}s, Ctrl-C to stop", secs);
            let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match orchestrator::run_cycle(&config, Utc::now()).await {
                    Ok(outcome) => report(&outcome),
                    Err(err) => error!("Cycle failed: {err:#}"),
                }
            }
        }
    }
    Ok(())
}

fn report(outcome: &CycleOutcome) {
    let summary = &outcome.summary;
    if outcome.used_fallback {
        warn!(
            "Live batch unusable; reporting {} from the cached snapshot",
            summary.status.label()
        );
    } else {
        info!(
            "Grid status {} at {:.1} gCO2/kWh over {} samples",
            summary.status.label(),
            summary.current_intensity,
            summary.sample_count
        );
    }
    if !outcome.failed_units.is_empty() {
        warn!("Publish units failed this cycle: {}", outcome.failed_units.join(", "));
    }
    if let Some(week) = &outcome.week_summary {
        info!(
            "7-day window: mean {:.1} gCO2/kWh, min {:.1}, max {:.1}",
            week.ave_intensity, week.min_intensity, week.max_intensity
        );
    }
    if let Some(table) = &outcome.week_table {
        info!("{}:", table.title);
        for row in &table.rows {
            info!(
                "   {}: mean {:.0} (min {:.0}, max {:.0}, {:.0}% variability, n={})",
                row.key,
                row.mean_intensity,
                row.min_intensity,
                row.max_intensity,
                row.variability_pct,
                row.sample_count
            );
        }
    }
}
