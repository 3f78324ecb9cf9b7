// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Clause operator semantics (specification §4.3.2).

use super::semver;
use super::timestamp;
use crate::data_model::Operator;
use crate::value::Value;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Mutex;

/// `matches` compiles a fresh `Regex` per call unless cached; cache by
/// pattern text since the same clause is evaluated repeatedly.
static REGEX_CACHE: Lazy<Mutex<HashMap<String, Option<Regex>>>> = Lazy::new(|| Mutex::new(HashMap::new()));

fn cached_regex(pattern: &str) -> Option<Regex> {
    let mut cache = REGEX_CACHE.lock().unwrap_or_else(|e| e.into_inner());
    cache
        .entry(pattern.to_string())
        .or_insert_with(|| Regex::new(pattern).ok())
        .clone()
}

/// `true` iff `attr_value` matches `clause_value` under `op`. Never
/// panics or aborts -- malformed operands (bad regex, non-numeric
/// compare, etc.) simply don't match, per specification §4.3.2.
pub fn matches_one(op: Operator, attr_value: &Value, clause_value: &Value) -> bool {
    match op {
        Operator::In => attr_value == clause_value,
        Operator::StartsWith => str_op(attr_value, clause_value, |a, b| a.starts_with(b)),
        Operator::EndsWith => str_op(attr_value, clause_value, |a, b| a.ends_with(b)),
        Operator::Contains => str_op(attr_value, clause_value, |a, b| a.contains(b)),
        Operator::Matches => match (attr_value.as_str(), clause_value.as_str()) {
            (Some(a), Some(pattern)) => cached_regex(pattern).is_some_and(|re| re.is_match(a)),
            _ => false,
        },
        Operator::LessThan => numeric_cmp(attr_value, clause_value, |a, b| a < b),
        Operator::LessThanOrEqual => numeric_cmp(attr_value, clause_value, |a, b| a <= b),
        Operator::GreaterThan => numeric_cmp(attr_value, clause_value, |a, b| a > b),
        Operator::GreaterThanOrEqual => numeric_cmp(attr_value, clause_value, |a, b| a >= b),
        Operator::Before => timestamp_cmp(attr_value, clause_value, |a, b| a < b),
        Operator::After => timestamp_cmp(attr_value, clause_value, |a, b| a > b),
        Operator::SemVerEqual => semver_cmp(attr_value, clause_value, |a, b| a == b),
        Operator::SemVerLessThan => semver_cmp(attr_value, clause_value, |a, b| a < b),
        Operator::SemVerGreaterThan => semver_cmp(attr_value, clause_value, |a, b| a > b),
        // segmentMatch is handled by the caller, which has store access;
        // reaching here means it was evaluated without that context.
        Operator::SegmentMatch => false,
    }
}

fn str_op(a: &Value, b: &Value, f: impl Fn(&str, &str) -> bool) -> bool {
    match (a.as_str(), b.as_str()) {
        (Some(a), Some(b)) => f(a, b),
        _ => false,
    }
}

fn numeric_cmp(a: &Value, b: &Value, f: impl Fn(f64, f64) -> bool) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => f(a, b),
        _ => false,
    }
}

fn timestamp_cmp(a: &Value, b: &Value, f: impl Fn(chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>) -> bool) -> bool {
    match (timestamp::to_timepoint(a), timestamp::to_timepoint(b)) {
        (Some(a), Some(b)) => f(a, b),
        _ => false,
    }
}

fn semver_cmp(a: &Value, b: &Value, f: impl Fn(&semver::SemVer, &semver::SemVer) -> bool) -> bool {
    match (a.as_str().and_then(semver::parse), b.as_str().and_then(semver::parse)) {
        (Some(a), Some(b)) => f(&a, &b),
        _ => false,
    }
}
