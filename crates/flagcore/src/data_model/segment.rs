// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The `Segment` data type (specification §3.5).

use super::SegmentRule;
use serde::{Deserialize, Serialize};

/// A `{contextKind, values}` membership list, scoped to a single
/// context kind (unlike [`super::Target`], there is no variation to
/// select -- membership is binary).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextValues {
    #[serde(default = "default_context_kind")]
    pub context_kind: String,
    pub values: Vec<String>,
}

fn default_context_kind() -> String {
    "user".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub key: String,
    pub version: u64,
    /// Shorthand user-kind membership lists.
    #[serde(default)]
    pub included: Vec<String>,
    #[serde(default)]
    pub excluded: Vec<String>,
    /// Arbitrary-context-kind membership lists.
    #[serde(default)]
    pub included_contexts: Vec<ContextValues>,
    #[serde(default)]
    pub excluded_contexts: Vec<ContextValues>,
    #[serde(default)]
    pub rules: Vec<SegmentRule>,
    #[serde(default)]
    pub salt: String,
    #[serde(default)]
    pub unbounded: bool,
    pub unbounded_context_kind: Option<String>,
    #[serde(default)]
    pub generation: Option<u64>,
}
