// Copyright (c) 2026 Carbonflux Contributors
//
// This file is part of Carbonflux.
//
// Licensed under the MIT License. You may use, copy, modify, and distribute
// this file under the terms of that license.
//
// This software is provided "AS IS", without warranty of any kind.

//! HTTP client for the generation-by-fuel live feed.

use crate::errors::{FeedError, FeedResult};
use carbonflux_types::FuelRow;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Live feed client with bounded retry.
#[derive(Debug, Clone)]
pub struct FeedClient {
    url: String,
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl FeedClient {
    /// Build a client for the configured feed URL.
    pub fn new(url: impl Into<String>) -> FeedResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| FeedError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            client,
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
        })
    }

    /// Override retry behaviour (mainly for tests).
    pub fn with_retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    /// Fetch the feed and return its rows of the requested record type.
    ///
    /// The body is CSV without headers; rows are kept as positional
    /// string fields for the column template to interpret. Any error
    /// here means no usable fetch this cycle.
    pub async fn fetch_rows(&self, record_type: &str) -> FeedResult<Vec<FuelRow>> {
        debug!("Fetching feed from {}", self.url);
        let response = self.retry_request().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!("Feed returned status {}: {}", status, message);
            return Err(FeedError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let rows = parse_rows(&body, record_type)?;
        if rows.is_empty() {
            return Err(FeedError::Empty {
                record_type: record_type.to_owned(),
            });
        }

        info!("Fetched {} {} rows from feed", rows.len(), record_type);
        Ok(rows)
    }

    async fn retry_request(&self) -> FeedResult<reqwest::Response> {
        let mut attempts = 0;
        let mut delay = self.retry_delay;

        loop {
            attempts += 1;
            match self.client.get(&self.url).send().await {
                Ok(response) => return Ok(response),
                Err(e) if attempts >= self.max_retries => {
                    error!("Feed request failed after {} attempts: {}", attempts, e);
                    return Err(FeedError::Http(e));
                }
                Err(e) => {
                    warn!(
                        "Feed request failed (attempt {}/{}): {}. Retrying in {:?}",
                        attempts, self.max_retries, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2; // Exponential backoff
                }
            }
        }
    }
}

/// Parse a CSV feed body, keeping rows whose first field matches the
/// record type tag. The feed mixes record types and pads unevenly, so
/// the reader runs headerless and flexible.
fn parse_rows(body: &str, record_type: &str) -> FeedResult<Vec<FuelRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.get(0) == Some(record_type) {
            rows.push(FuelRow::new(record.iter().map(str::to_owned).collect()));
        }
    }
    Ok(rows)
}
