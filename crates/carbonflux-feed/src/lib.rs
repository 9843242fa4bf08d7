// Copyright (c) 2026 Carbonflux Contributors
//
// This file is part of Carbonflux.
//
// Licensed under the MIT License. You may use, copy, modify, and distribute
// this file under the terms of that license.
//
// This software is provided "AS IS", without warranty of any kind.

pub mod client;
pub mod errors;

pub use client::FeedClient;
pub use errors::{FeedError, FeedResult};
