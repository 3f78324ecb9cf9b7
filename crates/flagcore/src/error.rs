// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy for the flag SDK core.
//!
//! Mirrors the categorisation in the specification's error-handling
//! design: every failure a caller can observe belongs to one of these
//! variants. Evaluation failures never use this type directly -- they
//! are surfaced as an `EvaluationReason` with `kind = error` instead
//! (see [`crate::eval::reason`]). This type is for configuration,
//! data-source, and store failures that can legitimately stop the SDK
//! or a build step.

use std::fmt;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// SDK-wide error taxonomy (specification §7).
#[derive(Debug, Clone)]
pub enum Error {
    /// A configuration builder was given invalid or incomplete settings.
    ConfigInvalid(String),
    /// A context failed validation (specification §3.3).
    ContextInvalid(String),
    /// A JSON payload didn't match the expected schema.
    JsonSchema(String),
    /// Transport-level failure (connection refused, timeout, DNS, ...).
    NetworkError(String),
    /// The remote endpoint responded with a non-success status.
    ErrorResponse { status: u16, message: String },
    /// The configured data store failed an operation.
    StoreError(String),
    /// A flag or segment was structurally invalid for evaluation.
    MalformedFlag(String),
    /// Catch-all for errors that don't fit another category.
    Unknown(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConfigInvalid(s) => write!(f, "invalid configuration: {s}"),
            Error::ContextInvalid(s) => write!(f, "invalid context: {s}"),
            Error::JsonSchema(s) => write!(f, "schema mismatch: {s}"),
            Error::NetworkError(s) => write!(f, "network error: {s}"),
            Error::ErrorResponse { status, message } => {
                write!(f, "error response ({status}): {message}")
            }
            Error::StoreError(s) => write!(f, "data store error: {s}"),
            Error::MalformedFlag(s) => write!(f, "malformed flag: {s}"),
            Error::Unknown(s) => write!(f, "unknown error: {s}"),
        }
    }
}

impl std::error::Error for Error {}

/// A coarse kind, stripped of message payloads -- used where only the
/// category matters (e.g. `DataSourceStatus::last_error.kind`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unknown,
    NetworkError,
    ErrorResponse,
    InvalidData,
    StoreError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Unknown => "unknown",
            ErrorKind::NetworkError => "networkError",
            ErrorKind::ErrorResponse => "errorResponse",
            ErrorKind::InvalidData => "invalidData",
            ErrorKind::StoreError => "storeError",
        };
        f.write_str(s)
    }
}
