// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Rollouts and variation selection (specification §3.4).

use serde::{Deserialize, Serialize};

/// One weighted entry in a rollout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedVariation {
    pub variation: usize,
    /// Units are hundred-thousandths; the sum across all entries
    /// represents a proportion of 100_000.
    pub weight: u32,
    #[serde(default)]
    pub untracked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RolloutKind {
    Rollout,
    Experiment,
}

/// A probabilistic assignment of a context to a variation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rollout {
    #[serde(default = "default_rollout_kind")]
    pub kind: RolloutKind,
    #[serde(default = "default_context_kind")]
    pub context_kind: String,
    pub bucket_by: Option<String>,
    pub seed: Option<u32>,
    pub variations: Vec<WeightedVariation>,
}

fn default_rollout_kind() -> RolloutKind {
    RolloutKind::Rollout
}

fn default_context_kind() -> String {
    "user".to_string()
}

/// Either a fixed variation index or a rollout to bucket into.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariationOrRollout {
    Variation { variation: usize },
    Rollout { rollout: Rollout },
}
