// Copyright (c) 2026 Carbonflux Contributors
//
// This file is part of Carbonflux.
//
// Licensed under the MIT License. You may use, copy, modify, and distribute
// this file under the terms of that license.
//
// This software is provided "AS IS", without warranty of any kind.

//! Persistence: the cached last-good summary and the 7-day record store.

pub mod cache;
pub mod long_term;

pub use cache::SnapshotCache;
pub use long_term::LongTermStore;
