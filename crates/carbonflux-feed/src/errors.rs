// Copyright (c) 2026 Carbonflux Contributors
//
// This file is part of Carbonflux.
//
// Licensed under the MIT License. You may use, copy, modify, and distribute
// this file under the terms of that license.
//
// This software is provided "AS IS", without warranty of any kind.

use thiserror::Error;

/// Errors from the live feed client. Any of these means the whole
/// batch is unavailable this cycle and the caller must fall back.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to parse feed body: {0}")]
    Parse(#[from] csv::Error),

    #[error("feed returned no '{record_type}' records")]
    Empty { record_type: String },

    #[error("invalid feed configuration: {0}")]
    Config(String),
}

pub type FeedResult<T> = Result<T, FeedError>;
