// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The `Flag` data type (specification §3.4).

use super::{Rule, VariationOrRollout};
use crate::value::Value;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSideAvailability {
    #[serde(default)]
    pub using_environment_id: bool,
    #[serde(default)]
    pub using_mobile_key: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prerequisite {
    pub key: String,
    pub variation: usize,
}

/// A target list: direct context-key-to-variation overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    #[serde(default = "default_context_kind")]
    pub context_kind: String,
    pub values: Vec<String>,
    pub variation: usize,
}

fn default_context_kind() -> String {
    "user".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flag {
    pub key: String,
    pub version: u64,
    pub on: bool,
    pub variations: Vec<Value>,
    pub off_variation: Option<usize>,
    pub fallthrough: VariationOrRollout,
    #[serde(default)]
    pub prerequisites: Vec<Prerequisite>,
    /// Legacy user-kind-only targets.
    #[serde(default)]
    pub targets: Vec<Target>,
    /// Targets scoped to an arbitrary context kind.
    #[serde(default)]
    pub context_targets: Vec<Target>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub salt: String,
    #[serde(default)]
    pub track_events: bool,
    #[serde(default)]
    pub track_events_fallthrough: bool,
    pub debug_events_until_date: Option<i64>,
    #[serde(default)]
    pub client_side_availability: ClientSideAvailability,
}

impl Flag {
    /// Variation values in evaluation order: context targets, then
    /// legacy targets, matching how §4.3 step 4 walks them.
    pub fn all_targets(&self) -> impl Iterator<Item = &Target> {
        self.context_targets.iter().chain(self.targets.iter())
    }

    pub fn variation_value(&self, index: usize) -> Option<&Value> {
        self.variations.get(index)
    }
}
