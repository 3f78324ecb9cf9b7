// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Persistence-crate error type. Uses `thiserror` rather than the
//! hand-rolled `flagcore::Error`, matching `hdds-persistence`'s own
//! choice of `anyhow`/derive-based errors over the core `hdds` crate's
//! manual `Display` impls -- a satellite crate is held to its own
//! conventions, not the core crate's.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error reading persistent store: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed persisted data: {0}")]
    Malformed(String),
    #[error("backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, PersistenceError>;
