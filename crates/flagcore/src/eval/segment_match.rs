// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Segment membership evaluation, including segment-to-segment
//! recursion via `segmentMatch` clauses inside segment rules
//! (specification §4.3.3).
//!
//! Recursion is bounded the same way prerequisite recursion is: a
//! depth counter and a visited-set catch both genuine cycles and
//! pathologically deep chains without blowing the stack.

use super::big_segments::{BigSegmentStore, BigSegmentsResult};
use super::bucketing::{bucket_value, resolve_bucket_by, BucketInput};
use super::clause_ops::matches_one;
use super::reason::BigSegmentsStatus;
use crate::context::{AttributeRef, Context};
use crate::data_model::{Clause, Kind, Operator, Segment, SegmentRule};
use crate::store::MemoryStore;
use std::collections::HashSet;

pub const MAX_RECURSION_DEPTH: usize = 20;

pub struct SegmentMatch {
    pub matched: bool,
    pub big_segments_status: Option<BigSegmentsStatus>,
    /// Set when recursion hit its depth limit or revisited a segment
    /// already on the stack. A cycle makes the match result
    /// meaningless, so callers surface `malformedFlag` regardless of
    /// `matched` (specification §4.3.3, §8.2 scenario 4).
    pub malformed: bool,
}

impl SegmentMatch {
    fn simple(matched: bool) -> Self {
        Self {
            matched,
            big_segments_status: None,
            malformed: false,
        }
    }

    fn cycle() -> Self {
        Self {
            matched: false,
            big_segments_status: None,
            malformed: true,
        }
    }
}

fn default_context_kind() -> &'static str {
    "user"
}

/// `true` iff `key` (for the default "user" kind, or `kind` for the
/// context-scoped lists) is one of `values`.
fn key_in_list(context: &Context, kind: &str, values: &[String]) -> bool {
    context
        .attributes_for(kind)
        .is_some_and(|attrs| values.iter().any(|v| v == &attrs.key))
}

pub fn evaluate_segment_match(
    clause: &Clause,
    context: &Context,
    store: &MemoryStore,
    big_segments: &dyn BigSegmentStore,
    visited: &mut HashSet<String>,
    depth: usize,
) -> SegmentMatch {
    let mut any_matched = false;
    let mut status = None;
    let mut malformed = false;
    for segment_key in clause.values.iter().filter_map(|v| v.as_str()) {
        let result = is_in_segment(segment_key, context, store, big_segments, visited, depth);
        if let Some(s) = result.big_segments_status {
            status = Some(s);
        }
        if result.matched {
            any_matched = true;
        }
        malformed |= result.malformed;
    }
    SegmentMatch {
        matched: any_matched,
        big_segments_status: status,
        malformed,
    }
}

pub fn is_in_segment(
    segment_key: &str,
    context: &Context,
    store: &MemoryStore,
    big_segments: &dyn BigSegmentStore,
    visited: &mut HashSet<String>,
    depth: usize,
) -> SegmentMatch {
    if depth > MAX_RECURSION_DEPTH || !visited.insert(segment_key.to_string()) {
        return SegmentMatch::cycle();
    }
    let result = match store.get(Kind::Segment, segment_key) {
        Some(d) if !d.is_tombstone() => match d.as_segment() {
            Some(segment) => evaluate_segment(segment, context, store, big_segments, visited, depth),
            None => SegmentMatch::simple(false),
        },
        _ => SegmentMatch::simple(false),
    };
    visited.remove(segment_key);
    result
}

fn evaluate_segment(
    segment: &Segment,
    context: &Context,
    store: &MemoryStore,
    big_segments: &dyn BigSegmentStore,
    visited: &mut HashSet<String>,
    depth: usize,
) -> SegmentMatch {
    if segment.unbounded {
        return evaluate_unbounded_segment(segment, context, big_segments);
    }

    if key_in_list(context, default_context_kind(), &segment.excluded)
        || segment
            .excluded_contexts
            .iter()
            .any(|cv| key_in_list(context, &cv.context_kind, &cv.values))
    {
        return SegmentMatch::simple(false);
    }

    if key_in_list(context, default_context_kind(), &segment.included)
        || segment
            .included_contexts
            .iter()
            .any(|cv| key_in_list(context, &cv.context_kind, &cv.values))
    {
        return SegmentMatch::simple(true);
    }

    let mut malformed = false;
    let mut status = None;
    for rule in &segment.rules {
        let (matched, rule_malformed, rule_status) =
            segment_rule_matches(rule, segment, context, store, big_segments, visited, depth);
        malformed |= rule_malformed;
        if rule_status.is_some() {
            status = rule_status;
        }
        if matched {
            return SegmentMatch {
                matched: true,
                big_segments_status: status,
                malformed,
            };
        }
    }

    SegmentMatch {
        matched: false,
        big_segments_status: status,
        malformed,
    }
}

fn evaluate_unbounded_segment(
    segment: &Segment,
    context: &Context,
    big_segments: &dyn BigSegmentStore,
) -> SegmentMatch {
    let kind = segment.unbounded_context_kind.as_deref().unwrap_or("user");
    let Some(attrs) = context.attributes_for(kind) else {
        return SegmentMatch {
            matched: false,
            big_segments_status: Some(BigSegmentsStatus::NotConfigured),
            malformed: false,
        };
    };
    let BigSegmentsResult { member, status } = big_segments.is_member(&segment.key, &attrs.key);
    SegmentMatch {
        matched: member.unwrap_or(false),
        big_segments_status: Some(status),
        malformed: false,
    }
}

/// Returns `(matched, malformed, big_segments_status)`; `malformed` is
/// set whenever any clause (including nested `segmentMatch` clauses)
/// hit a recursion cycle, independent of whether the rule itself
/// matched; `big_segments_status` is the most recent status reported
/// by an unbounded segment consulted while checking this rule's
/// clauses, if any.
fn segment_rule_matches(
    rule: &SegmentRule,
    segment: &Segment,
    context: &Context,
    store: &MemoryStore,
    big_segments: &dyn BigSegmentStore,
    visited: &mut HashSet<String>,
    depth: usize,
) -> (bool, bool, Option<BigSegmentsStatus>) {
    let mut malformed = false;
    let mut status = None;
    for clause in &rule.clauses {
        let (matched, clause_malformed, clause_status) =
            clause_matches(clause, context, store, big_segments, visited, depth + 1);
        malformed |= clause_malformed;
        if clause_status.is_some() {
            status = clause_status;
        }
        if !matched {
            return (false, malformed, status);
        }
    }
    let matched = match rule.weight {
        None => true,
        Some(weight) => {
            let context_kind = rule.rollout_context_kind.as_deref().unwrap_or("user");
            let bucket_by = rule
                .bucket_by
                .as_ref()
                .map(|s| AttributeRef::parse(s))
                .unwrap_or_else(|| AttributeRef::parse_literal("key"));
            match resolve_bucket_by(context, context_kind, &bucket_by) {
                BucketInput::Value(attr_value) => {
                    let bucket = bucket_value(&segment.key, &segment.salt, None, &attr_value);
                    bucket < weight as f64 / 100_000.0
                }
                _ => false,
            }
        }
    };
    (matched, malformed, status)
}

/// Clause matching used within segment rules -- the same semantics as
/// flag rule clauses, including nested `segmentMatch` recursion.
/// Returns `(matched, malformed, big_segments_status)`.
pub fn clause_matches(
    clause: &Clause,
    context: &Context,
    store: &MemoryStore,
    big_segments: &dyn BigSegmentStore,
    visited: &mut HashSet<String>,
    depth: usize,
) -> (bool, bool, Option<BigSegmentsStatus>) {
    let (raw, malformed, status) = if clause.op == Operator::SegmentMatch {
        let result = evaluate_segment_match(clause, context, store, big_segments, visited, depth);
        (result.matched, result.malformed, result.big_segments_status)
    } else {
        let attr_ref = AttributeRef::parse(&clause.attribute);
        let matched = match context.get(&clause.context_kind, &attr_ref) {
            Some(attr_value) => attr_value
                .iter_values()
                .any(|v| clause.values.iter().any(|cv| matches_one(clause.op, v, cv))),
            None => false,
        };
        (matched, false, None)
    };
    let matched = if clause.negate { !raw } else { raw };
    (matched, malformed, status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Attributes;
    use crate::data_model::Descriptor;

    fn segment(key: &str, included: Vec<&str>, excluded: Vec<&str>) -> Segment {
        Segment {
            key: key.to_string(),
            version: 1,
            included: included.into_iter().map(String::from).collect(),
            excluded: excluded.into_iter().map(String::from).collect(),
            included_contexts: vec![],
            excluded_contexts: vec![],
            rules: vec![],
            salt: "salt".to_string(),
            unbounded: false,
            unbounded_context_kind: None,
            generation: None,
        }
    }

    #[test]
    fn excluded_wins_over_included() {
        let store = MemoryStore::new();
        store.upsert(
            Kind::Segment,
            "s",
            Descriptor::segment(segment("s", vec!["u1"], vec!["u1"])),
        );
        let ctx = Context::single("user", Attributes::new("u1"));
        let mut visited = HashSet::new();
        let result = is_in_segment("s", &ctx, &store, &super::super::big_segments::NoBigSegmentStore, &mut visited, 0);
        assert!(!result.matched);
    }

    #[test]
    fn missing_segment_does_not_match() {
        let store = MemoryStore::new();
        let ctx = Context::single("user", Attributes::new("u1"));
        let mut visited = HashSet::new();
        let result = is_in_segment(
            "missing",
            &ctx,
            &store,
            &super::super::big_segments::NoBigSegmentStore,
            &mut visited,
            0,
        );
        assert!(!result.matched);
    }

    #[test]
    fn self_referential_segment_match_clause_does_not_infinite_loop() {
        let store = MemoryStore::new();
        let cyclic_rule = SegmentRule {
            clauses: vec![Clause {
                context_kind: "user".to_string(),
                attribute: "key".to_string(),
                op: Operator::SegmentMatch,
                values: vec![crate::value::Value::from("s")],
                negate: false,
            }],
            weight: None,
            bucket_by: None,
            rollout_context_kind: None,
        };
        let mut s = segment("s", vec![], vec![]);
        s.rules = vec![cyclic_rule];
        store.upsert(Kind::Segment, "s", Descriptor::segment(s));
        let ctx = Context::single("user", Attributes::new("u1"));
        let mut visited = HashSet::new();
        let result = is_in_segment("s", &ctx, &store, &super::super::big_segments::NoBigSegmentStore, &mut visited, 0);
        assert!(!result.matched);
    }

    #[test]
    fn unbounded_segment_without_big_store_reports_not_configured() {
        let store = MemoryStore::new();
        let mut s = segment("s", vec![], vec![]);
        s.unbounded = true;
        store.upsert(Kind::Segment, "s", Descriptor::segment(s));
        let ctx = Context::single("user", Attributes::new("u1"));
        let mut visited = HashSet::new();
        let result = is_in_segment("s", &ctx, &store, &super::super::big_segments::NoBigSegmentStore, &mut visited, 0);
        assert!(!result.matched);
        assert_eq!(result.big_segments_status, Some(BigSegmentsStatus::NotConfigured));
    }
}
