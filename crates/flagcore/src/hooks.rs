// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Evaluation hooks (SPEC_FULL.md §C.1), grounded on
//! `original_source/libs/server-sdk/src/hooks/hook.cpp`: a way for a
//! host application to observe every flag evaluation without changing
//! what it returns.
//!
//! Hooks wrap [`crate::eval::evaluate`] from the outside -- the
//! evaluator's own contract (specification §4.3) stays pure and knows
//! nothing about them. [`crate::client::Client`] is what calls
//! `before_evaluation`/`after_evaluation` around each evaluation.

use crate::context::Context;
use crate::eval::Detail;
use crate::value::Value;
use std::collections::BTreeMap;

/// What a hook observes about the evaluation it's wrapping: which flag,
/// for which context, the caller's default, and which `*Variation`
/// method was called.
#[derive(Debug, Clone)]
pub struct EvaluationSeriesContext {
    pub flag_key: String,
    pub context: Context,
    pub default_value: Value,
    pub method: String,
}

impl EvaluationSeriesContext {
    pub fn new(flag_key: impl Into<String>, context: Context, default_value: Value, method: impl Into<String>) -> Self {
        Self {
            flag_key: flag_key.into(),
            context,
            default_value,
            method: method.into(),
        }
    }
}

/// A small typed key-value bag a hook can thread from its
/// `before_evaluation` call to its own `after_evaluation` call. Opaque
/// to the client facade and to other hooks -- each hook only ever sees
/// the data it produced itself.
#[derive(Debug, Clone, Default)]
pub struct EvaluationSeriesData(BTreeMap<String, Value>);

impl EvaluationSeriesData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(mut self, key: impl Into<String>, value: Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }
}

/// Observes flag evaluations. Both methods have pass-through default
/// implementations so a hook only needs to override what it cares
/// about -- e.g. a metrics hook that only counts evaluations never
/// touches `before_evaluation`.
pub trait Hook: Send + Sync {
    /// A short name used in log messages if a hook panics or is slow;
    /// has no effect on evaluation itself.
    fn name(&self) -> &str;

    fn before_evaluation(&self, _series: &EvaluationSeriesContext, data: EvaluationSeriesData) -> EvaluationSeriesData {
        data
    }

    fn after_evaluation(
        &self,
        _series: &EvaluationSeriesContext,
        data: EvaluationSeriesData,
        _detail: &Detail,
    ) -> EvaluationSeriesData {
        data
    }
}

/// Runs every hook's `before_evaluation` in registration order,
/// returning the per-hook data each one produced so the matching
/// `after_evaluation` call can be threaded the right state back.
pub(crate) fn run_before(hooks: &[std::sync::Arc<dyn Hook>], series: &EvaluationSeriesContext) -> Vec<EvaluationSeriesData> {
    hooks
        .iter()
        .map(|hook| hook.before_evaluation(series, EvaluationSeriesData::new()))
        .collect()
}

/// Runs every hook's `after_evaluation` in registration order, paired
/// with the data its own `before_evaluation` call produced.
pub(crate) fn run_after(
    hooks: &[std::sync::Arc<dyn Hook>],
    series: &EvaluationSeriesContext,
    before_data: Vec<EvaluationSeriesData>,
    detail: &Detail,
) {
    for (hook, data) in hooks.iter().zip(before_data) {
        hook.after_evaluation(series, data, detail);
    }
}
