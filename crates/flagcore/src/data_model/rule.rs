// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Flag and segment rules (specification §3.4, §3.5).

use super::{Clause, VariationOrRollout};
use serde::{Deserialize, Serialize};

/// A flag rule: matches when every clause matches, and resolves to a
/// variation via `variation_or_rollout`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    #[serde(default)]
    pub clauses: Vec<Clause>,
    #[serde(flatten)]
    pub variation_or_rollout: VariationOrRollout,
    #[serde(default)]
    pub track_events: bool,
}

/// A segment rule: matches when every clause matches and, if a weight
/// is present, the context buckets below `weight / 100_000`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRule {
    #[serde(default)]
    pub clauses: Vec<Clause>,
    pub weight: Option<u32>,
    pub bucket_by: Option<String>,
    pub rollout_context_kind: Option<String>,
}
