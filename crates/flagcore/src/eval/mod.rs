// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The evaluation engine: a pure function from `(Flag, Context, data
//! store)` to a [`Detail`] (specification §4.3). Everything here is
//! side-effect free except for recording which prerequisite flags were
//! consulted along the way, which the event pipeline (C8) needs in
//! order to emit their own evaluation events.

pub mod big_segments;
pub mod bucketing;
mod clause_ops;
pub mod reason;
mod segment_match;
pub mod semver;
pub mod timestamp;

pub use big_segments::{BigSegmentStore, BigSegmentsResult, NoBigSegmentStore};
pub use reason::{BigSegmentsStatus, Detail, EvalErrorKind, Reason};

use bucketing::{bucket_value, resolve_bucket_by, select_weighted_variation, BucketInput};
use crate::context::{AttributeRef, Context};
use crate::data_model::{Flag, Kind, Rule, Target, VariationOrRollout};
use crate::store::MemoryStore;
use crate::value::Value;
use segment_match::MAX_RECURSION_DEPTH;
use std::collections::HashSet;

/// A prerequisite flag evaluated while resolving some top-level flag,
/// together with the outcome it produced.
#[derive(Debug, Clone)]
pub struct PrerequisiteEvaluation {
    pub flag_key: String,
    pub detail: Detail,
}

/// Evaluate `flag` for `context` against `store`, with no big segment
/// store wired in (unbounded segments always report `NotConfigured`).
pub fn evaluate(flag: &Flag, context: &Context, store: &MemoryStore) -> Detail {
    let mut prereq_events = Vec::new();
    evaluate_with_big_segments(flag, context, store, &NoBigSegmentStore, &mut prereq_events)
}

/// Evaluate `flag`, recording every prerequisite flag consulted (and
/// its own [`Detail`]) into `prereq_events` so callers can emit
/// prerequisite evaluation events alongside the top-level one.
pub fn evaluate_with_big_segments(
    flag: &Flag,
    context: &Context,
    store: &MemoryStore,
    big_segments: &dyn BigSegmentStore,
    prereq_events: &mut Vec<PrerequisiteEvaluation>,
) -> Detail {
    let mut visited_flags = HashSet::new();
    eval_flag(flag, context, store, big_segments, &mut visited_flags, prereq_events, 0)
}

fn eval_flag(
    flag: &Flag,
    context: &Context,
    store: &MemoryStore,
    big_segments: &dyn BigSegmentStore,
    visited_flags: &mut HashSet<String>,
    prereq_events: &mut Vec<PrerequisiteEvaluation>,
    depth: usize,
) -> Detail {
    if !context.is_valid() {
        return Detail::error(Value::Null, EvalErrorKind::UserNotSpecified);
    }

    if !flag.on {
        return off_result(flag);
    }

    for prereq in &flag.prerequisites {
        if depth >= MAX_RECURSION_DEPTH || !visited_flags.insert(prereq.key.clone()) {
            return off_result_with_prereq_failure(flag, &prereq.key);
        }
        let satisfied = match store.get(Kind::Flag, &prereq.key) {
            Some(d) if !d.is_tombstone() => match d.as_flag() {
                Some(prereq_flag) => {
                    let detail = eval_flag(
                        prereq_flag,
                        context,
                        store,
                        big_segments,
                        visited_flags,
                        prereq_events,
                        depth + 1,
                    );
                    let satisfied = prereq_flag.on && detail.variation_index == Some(prereq.variation);
                    prereq_events.push(PrerequisiteEvaluation {
                        flag_key: prereq.key.clone(),
                        detail,
                    });
                    satisfied
                }
                None => false,
            },
            _ => false,
        };
        visited_flags.remove(&prereq.key);
        if !satisfied {
            return off_result_with_prereq_failure(flag, &prereq.key);
        }
    }

    if let Some(variation) = target_match(flag, context) {
        return variation_detail(flag, variation, Reason::TargetMatch);
    }

    let mut visited_segments = HashSet::new();
    let mut big_segments_status = None;
    for (rule_index, rule) in flag.rules.iter().enumerate() {
        let (matched, malformed, rule_status) = rule_matches(rule, context, store, big_segments, &mut visited_segments);
        if rule_status.is_some() {
            big_segments_status = rule_status;
        }
        if malformed {
            let mut detail = Detail::error(Value::Null, EvalErrorKind::MalformedFlag);
            if let Some(status) = big_segments_status {
                detail = detail.with_big_segments_status(status);
            }
            return detail;
        }
        if matched {
            let mut detail = resolve_variation_or_rollout(flag, &rule.variation_or_rollout, context, |in_experiment| {
                Reason::RuleMatch {
                    rule_index,
                    rule_id: rule.id.clone(),
                    in_experiment,
                }
            });
            if let Some(status) = big_segments_status {
                detail = detail.with_big_segments_status(status);
            }
            return detail;
        }
    }

    let mut detail = resolve_variation_or_rollout(flag, &flag.fallthrough, context, |in_experiment| Reason::Fallthrough {
        in_experiment,
    });
    if let Some(status) = big_segments_status {
        detail = detail.with_big_segments_status(status);
    }
    detail
}

fn off_result(flag: &Flag) -> Detail {
    match flag.off_variation {
        None => Detail::new(Value::Null, None, Reason::Off),
        Some(index) => match flag.variation_value(index) {
            Some(v) => Detail::new(v.clone(), Some(index), Reason::Off),
            None => Detail::error(Value::Null, EvalErrorKind::MalformedFlag),
        },
    }
}

fn off_result_with_prereq_failure(flag: &Flag, prerequisite_key: &str) -> Detail {
    let reason = Reason::PrerequisiteFailed {
        prerequisite_key: prerequisite_key.to_string(),
    };
    match flag.off_variation {
        None => Detail::new(Value::Null, None, reason),
        Some(index) => match flag.variation_value(index) {
            Some(v) => Detail::new(v.clone(), Some(index), reason),
            None => Detail::error(Value::Null, EvalErrorKind::MalformedFlag),
        },
    }
}

fn variation_detail(flag: &Flag, index: usize, reason: Reason) -> Detail {
    match flag.variation_value(index) {
        Some(v) => Detail::new(v.clone(), Some(index), reason),
        None => Detail::error(Value::Null, EvalErrorKind::MalformedFlag),
    }
}

fn target_match(flag: &Flag, context: &Context) -> Option<usize> {
    for target in flag.all_targets() {
        if target_contains_context(target, context) {
            return Some(target.variation);
        }
    }
    None
}

fn target_contains_context(target: &Target, context: &Context) -> bool {
    context
        .attributes_for(&target.context_kind)
        .is_some_and(|attrs| target.values.iter().any(|v| v == &attrs.key))
}

/// Returns `(matched, malformed, big_segments_status)`. `malformed` is
/// set when a `segmentMatch` clause anywhere in the rule hit a
/// recursion cycle (specification §4.3.3, §8.2 scenario 4), independent
/// of whether the rule's clauses otherwise matched. `big_segments_status`
/// is the most recent status reported by an unbounded segment consulted
/// while checking this rule's clauses, if any.
fn rule_matches(
    rule: &Rule,
    context: &Context,
    store: &MemoryStore,
    big_segments: &dyn BigSegmentStore,
    visited_segments: &mut HashSet<String>,
) -> (bool, bool, Option<BigSegmentsStatus>) {
    let mut malformed = false;
    let mut status = None;
    for clause in &rule.clauses {
        let (matched, clause_malformed, clause_status) =
            segment_match::clause_matches(clause, context, store, big_segments, visited_segments, 0);
        malformed |= clause_malformed;
        if clause_status.is_some() {
            status = clause_status;
        }
        if !matched {
            return (false, malformed, status);
        }
    }
    (true, malformed, status)
}

/// Resolve a fixed variation or a rollout into a [`Detail`], handing
/// the caller-supplied closure the `inExperiment` flag so it can build
/// the right [`Reason`] variant (`Fallthrough` or `RuleMatch`).
fn resolve_variation_or_rollout(
    flag: &Flag,
    vor: &VariationOrRollout,
    context: &Context,
    reason_for: impl FnOnce(bool) -> Reason,
) -> Detail {
    match vor {
        VariationOrRollout::Variation { variation } => variation_detail(flag, *variation, reason_for(false)),
        VariationOrRollout::Rollout { rollout } => {
            let bucket_by = rollout
                .bucket_by
                .as_ref()
                .map(|s| AttributeRef::parse(s))
                .unwrap_or_else(|| AttributeRef::parse_literal("key"));
            let bucket = match resolve_bucket_by(context, &rollout.context_kind, &bucket_by) {
                BucketInput::Value(attr_value) => {
                    bucket_value(&flag.key, &flag.salt, rollout.seed, &attr_value)
                }
                // Missing kind or a non-bucketable attribute both fall
                // back to bucket 0, matching the original SDK rather
                // than failing the evaluation outright.
                BucketInput::MissingKind | BucketInput::NotBucketable => 0.0,
            };
            match select_weighted_variation(&rollout.variations, bucket, rollout.kind) {
                Some(selected) => {
                    variation_detail(flag, selected.variation, reason_for(selected.in_experiment))
                }
                None => Detail::error(Value::Null, EvalErrorKind::MalformedFlag),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Attributes;
    use crate::data_model::{Clause, ClientSideAvailability, Descriptor, Operator, Prerequisite};

    fn base_flag(key: &str) -> Flag {
        Flag {
            key: key.to_string(),
            version: 1,
            on: true,
            variations: vec![Value::from(false), Value::from(true)],
            off_variation: Some(0),
            fallthrough: VariationOrRollout::Variation { variation: 1 },
            prerequisites: vec![],
            targets: vec![],
            context_targets: vec![],
            rules: vec![],
            salt: "salt".to_string(),
            track_events: false,
            track_events_fallthrough: false,
            debug_events_until_date: None,
            client_side_availability: ClientSideAvailability::default(),
        }
    }

    #[test]
    fn off_flag_returns_off_variation() {
        let mut flag = base_flag("f");
        flag.on = false;
        let store = MemoryStore::new();
        let ctx = Context::single("user", Attributes::new("u1"));
        let detail = evaluate(&flag, &ctx, &store);
        assert_eq!(detail.value, Value::from(false));
        assert_eq!(detail.reason, Reason::Off);
    }

    #[test]
    fn invalid_context_is_an_error() {
        let flag = base_flag("f");
        let store = MemoryStore::new();
        let ctx = Context::single("user", Attributes::new(""));
        let detail = evaluate(&flag, &ctx, &store);
        assert_eq!(
            detail.reason,
            Reason::Error {
                error_kind: EvalErrorKind::UserNotSpecified
            }
        );
    }

    #[test]
    fn fallthrough_fixed_variation() {
        let flag = base_flag("f");
        let store = MemoryStore::new();
        let ctx = Context::single("user", Attributes::new("u1"));
        let detail = evaluate(&flag, &ctx, &store);
        assert_eq!(detail.value, Value::from(true));
        assert_eq!(
            detail.reason,
            Reason::Fallthrough {
                in_experiment: false
            }
        );
    }

    #[test]
    fn target_match_takes_priority_over_fallthrough() {
        let mut flag = base_flag("f");
        flag.targets.push(Target {
            context_kind: "user".to_string(),
            values: vec!["u1".to_string()],
            variation: 0,
        });
        let store = MemoryStore::new();
        let ctx = Context::single("user", Attributes::new("u1"));
        let detail = evaluate(&flag, &ctx, &store);
        assert_eq!(detail.value, Value::from(false));
        assert_eq!(detail.reason, Reason::TargetMatch);
    }

    #[test]
    fn rule_with_in_clause_matches() {
        let mut flag = base_flag("f");
        flag.rules.push(Rule {
            id: "rule1".to_string(),
            clauses: vec![Clause {
                context_kind: "user".to_string(),
                attribute: "key".to_string(),
                op: Operator::In,
                values: vec![Value::from("u1")],
                negate: false,
            }],
            variation_or_rollout: VariationOrRollout::Variation { variation: 0 },
            track_events: false,
        });
        let store = MemoryStore::new();
        let ctx = Context::single("user", Attributes::new("u1"));
        let detail = evaluate(&flag, &ctx, &store);
        assert_eq!(detail.value, Value::from(false));
        match detail.reason {
            Reason::RuleMatch { rule_index, .. } => assert_eq!(rule_index, 0),
            other => panic!("expected RuleMatch, got {other:?}"),
        }
    }

    #[test]
    fn out_of_range_variation_is_malformed_flag() {
        let mut flag = base_flag("f");
        flag.fallthrough = VariationOrRollout::Variation { variation: 99 };
        let store = MemoryStore::new();
        let ctx = Context::single("user", Attributes::new("u1"));
        let detail = evaluate(&flag, &ctx, &store);
        assert_eq!(
            detail.reason,
            Reason::Error {
                error_kind: EvalErrorKind::MalformedFlag
            }
        );
    }

    #[test]
    fn failed_prerequisite_falls_back_to_off_variation() {
        let store = MemoryStore::new();
        let mut prereq = base_flag("prereq");
        prereq.fallthrough = VariationOrRollout::Variation { variation: 0 }; // produces `false`
        store.upsert(Kind::Flag, "prereq", Descriptor::flag(prereq));

        let mut flag = base_flag("f");
        flag.prerequisites.push(Prerequisite {
            key: "prereq".to_string(),
            variation: 1, // requires `true`, but prereq yields `false`
        });
        let ctx = Context::single("user", Attributes::new("u1"));
        let mut events = Vec::new();
        let detail = evaluate_with_big_segments(&flag, &ctx, &store, &NoBigSegmentStore, &mut events);
        assert_eq!(detail.value, Value::from(false));
        match detail.reason {
            Reason::PrerequisiteFailed { prerequisite_key } => assert_eq!(prerequisite_key, "prereq"),
            other => panic!("expected PrerequisiteFailed, got {other:?}"),
        }
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].flag_key, "prereq");
    }

    #[test]
    fn satisfied_prerequisite_falls_through() {
        let store = MemoryStore::new();
        let mut prereq = base_flag("prereq");
        prereq.fallthrough = VariationOrRollout::Variation { variation: 1 }; // produces `true`
        store.upsert(Kind::Flag, "prereq", Descriptor::flag(prereq));

        let mut flag = base_flag("f");
        flag.prerequisites.push(Prerequisite {
            key: "prereq".to_string(),
            variation: 1,
        });
        let ctx = Context::single("user", Attributes::new("u1"));
        let detail = evaluate(&flag, &ctx, &store);
        assert_eq!(detail.value, Value::from(true));
        assert_eq!(
            detail.reason,
            Reason::Fallthrough {
                in_experiment: false
            }
        );
    }

    #[test]
    fn segment_match_clause_consults_store() {
        use crate::data_model::Segment;
        let store = MemoryStore::new();
        store.upsert(
            Kind::Segment,
            "seg1",
            Descriptor::segment(Segment {
                key: "seg1".to_string(),
                version: 1,
                included: vec!["u1".to_string()],
                excluded: vec![],
                included_contexts: vec![],
                excluded_contexts: vec![],
                rules: vec![],
                salt: "s".to_string(),
                unbounded: false,
                unbounded_context_kind: None,
                generation: None,
            }),
        );
        let mut flag = base_flag("f");
        flag.rules.push(Rule {
            id: "rule1".to_string(),
            clauses: vec![Clause {
                context_kind: "user".to_string(),
                attribute: "key".to_string(),
                op: Operator::SegmentMatch,
                values: vec![Value::from("seg1")],
                negate: false,
            }],
            variation_or_rollout: VariationOrRollout::Variation { variation: 0 },
            track_events: false,
        });
        let ctx = Context::single("user", Attributes::new("u1"));
        let detail = evaluate(&flag, &ctx, &store);
        assert_eq!(detail.value, Value::from(false));
        assert!(matches!(detail.reason, Reason::RuleMatch { .. }));
    }

    #[test]
    fn segment_cycle_yields_malformed_flag_without_hanging() {
        use crate::data_model::{Segment, SegmentRule};

        fn segment_referencing(key: &str, other: &str) -> Segment {
            Segment {
                key: key.to_string(),
                version: 1,
                included: vec![],
                excluded: vec![],
                included_contexts: vec![],
                excluded_contexts: vec![],
                rules: vec![SegmentRule {
                    clauses: vec![Clause {
                        context_kind: "user".to_string(),
                        attribute: "key".to_string(),
                        op: Operator::SegmentMatch,
                        values: vec![Value::from(other)],
                        negate: false,
                    }],
                    weight: None,
                    bucket_by: None,
                    rollout_context_kind: None,
                }],
                salt: "s".to_string(),
                unbounded: false,
                unbounded_context_kind: None,
                generation: None,
            }
        }

        let store = MemoryStore::new();
        store.upsert(Kind::Segment, "a", Descriptor::segment(segment_referencing("a", "b")));
        store.upsert(Kind::Segment, "b", Descriptor::segment(segment_referencing("b", "a")));

        let mut flag = base_flag("f");
        flag.rules.push(Rule {
            id: "rule1".to_string(),
            clauses: vec![Clause {
                context_kind: "user".to_string(),
                attribute: "key".to_string(),
                op: Operator::SegmentMatch,
                values: vec![Value::from("a")],
                negate: false,
            }],
            variation_or_rollout: VariationOrRollout::Variation { variation: 0 },
            track_events: false,
        });
        let ctx = Context::single("user", Attributes::new("u1"));
        let detail = evaluate(&flag, &ctx, &store);
        assert_eq!(
            detail.reason,
            Reason::Error {
                error_kind: EvalErrorKind::MalformedFlag
            }
        );
    }

    struct StaleBigSegmentStore;

    impl BigSegmentStore for StaleBigSegmentStore {
        fn is_member(&self, _segment_key: &str, _context_key: &str) -> BigSegmentsResult {
            BigSegmentsResult {
                member: Some(true),
                status: BigSegmentsStatus::Stale,
            }
        }
    }

    #[test]
    fn unbounded_segment_status_reaches_detail() {
        use crate::data_model::Segment;
        let store = MemoryStore::new();
        store.upsert(
            Kind::Segment,
            "big1",
            Descriptor::segment(Segment {
                key: "big1".to_string(),
                version: 1,
                included: vec![],
                excluded: vec![],
                included_contexts: vec![],
                excluded_contexts: vec![],
                rules: vec![],
                salt: "s".to_string(),
                unbounded: true,
                unbounded_context_kind: None,
                generation: None,
            }),
        );
        let mut flag = base_flag("f");
        flag.rules.push(Rule {
            id: "rule1".to_string(),
            clauses: vec![Clause {
                context_kind: "user".to_string(),
                attribute: "key".to_string(),
                op: Operator::SegmentMatch,
                values: vec![Value::from("big1")],
                negate: false,
            }],
            variation_or_rollout: VariationOrRollout::Variation { variation: 0 },
            track_events: false,
        });
        let ctx = Context::single("user", Attributes::new("u1"));
        let mut prereq_events = Vec::new();
        let detail = evaluate_with_big_segments(&flag, &ctx, &store, &StaleBigSegmentStore, &mut prereq_events);
        assert!(matches!(detail.reason, Reason::RuleMatch { .. }));
        assert_eq!(detail.big_segments_status, Some(BigSegmentsStatus::Stale));
    }
}
