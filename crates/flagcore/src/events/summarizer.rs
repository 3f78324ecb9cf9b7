// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Evaluation summarization (specification §4.5), grounded on the
//! summary bookkeeping inlined in
//! `original_source/libs/internal/src/events/asio_event_processor.cpp`
//! and split into its own type here because the specification names it
//! as its own component. Not thread-safe by itself -- only the event
//! processor's single owning task touches it.

use crate::value::Value;
use std::collections::HashMap;
use std::time::SystemTime;

/// One bucket of evaluation outcomes for a flag: how many times a
/// given `(variation, flagVersion)` pair was the result, and what value
/// it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Counter {
    pub value: Value,
    pub count: u64,
}

#[derive(Debug, Clone, Default)]
struct FlagSummary {
    default_value: Value,
    counters: HashMap<(Option<usize>, Option<u64>), Counter>,
}

/// An immutable snapshot handed to the flush pipeline; contains
/// everything needed to build the wire `summary` event.
#[derive(Debug, Clone)]
pub struct SummaryState {
    pub start_date: SystemTime,
    pub end_date: SystemTime,
    pub features: HashMap<String, FlagSummaryEntry>,
}

/// Per-flag entry in a [`SummaryState`], with counters flattened into a
/// list so callers don't need to know about the internal key shape.
#[derive(Debug, Clone)]
pub struct FlagSummaryEntry {
    pub default_value: Value,
    pub counters: Vec<CounterEntry>,
}

#[derive(Debug, Clone)]
pub struct CounterEntry {
    pub variation: Option<usize>,
    pub version: Option<u64>,
    pub value: Value,
    pub count: u64,
}

impl SummaryState {
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Accumulates feature-event parameters across a flush window.
pub struct Summarizer {
    start: SystemTime,
    features: HashMap<String, FlagSummary>,
}

impl Default for Summarizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Summarizer {
    pub fn new() -> Self {
        Self {
            start: SystemTime::now(),
            features: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Record one evaluation outcome. `version` is `None` when the flag
    /// wasn't found (the caller still summarizes against the default).
    pub fn add_evaluation(
        &mut self,
        flag_key: &str,
        version: Option<u64>,
        variation: Option<usize>,
        value: &Value,
        default: &Value,
    ) {
        let entry = self.features.entry(flag_key.to_string()).or_insert_with(|| FlagSummary {
            default_value: default.clone(),
            counters: HashMap::new(),
        });
        let counter = entry
            .counters
            .entry((variation, version))
            .or_insert_with(|| Counter {
                value: value.clone(),
                count: 0,
            });
        counter.count += 1;
    }

    /// Take a snapshot and reset the window start to `now`, per
    /// specification §4.5.
    pub fn finish(&mut self, now: SystemTime) -> Option<SummaryState> {
        if self.features.is_empty() {
            self.start = now;
            return None;
        }
        let start_date = self.start;
        let features = std::mem::take(&mut self.features)
            .into_iter()
            .map(|(key, summary)| {
                let counters = summary
                    .counters
                    .into_iter()
                    .map(|((variation, version), counter)| CounterEntry {
                        variation,
                        version,
                        value: counter.value,
                        count: counter.count,
                    })
                    .collect();
                (
                    key,
                    FlagSummaryEntry {
                        default_value: summary.default_value,
                        counters,
                    },
                )
            })
            .collect();
        self.start = now;
        Some(SummaryState {
            start_date,
            end_date: now,
            features,
        })
    }
}
