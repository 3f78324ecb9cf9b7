// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bucketing: deterministic assignment of a context to a fraction of
//! `[0, 1)` given a salt, optional seed, and an attribute value
//! (specification §4.3.1).

use crate::context::{AttributeRef, Context};
use crate::data_model::{RolloutKind, WeightedVariation};
use crate::value::Value;
use sha1::{Digest, Sha1};

/// Result of resolving `bucketBy` against a context: either a value to
/// hash, or a reason the attribute couldn't be used.
pub enum BucketInput {
    Value(String),
    /// The target kind isn't present in the context.
    MissingKind,
    /// The attribute resolved to something other than a string or
    /// integer-valued number.
    NotBucketable,
}

/// Stringify the bucket-by attribute: strings are used as-is; numbers
/// must be integer-valued (truncation is not performed -- a fractional
/// number is rejected, matching the original SDK's behavior of only
/// accepting strings/ints for bucketing).
pub fn resolve_bucket_by(
    context: &Context,
    context_kind: &str,
    bucket_by: &AttributeRef,
) -> BucketInput {
    if context.attributes_for(context_kind).is_none() {
        return BucketInput::MissingKind;
    }
    match context.get(context_kind, bucket_by) {
        Some(Value::String(s)) => BucketInput::Value(s),
        Some(Value::Number(n)) if n.trunc() == n => BucketInput::Value(format!("{}", n as i64)),
        _ => BucketInput::NotBucketable,
    }
}

/// Compute the bucket value in `[0, 1)` for `flag_or_segment_key`,
/// `salt`, optional `seed`, and the already-resolved attribute string.
pub fn bucket_value(key: &str, salt: &str, seed: Option<u32>, attr_value: &str) -> f64 {
    let hash_input = match seed {
        Some(seed) => format!("{seed}.{attr_value}"),
        None => format!("{key}.{salt}.{attr_value}"),
    };
    let digest = Sha1::digest(hash_input.as_bytes());
    let hex = hex_prefix(&digest, 15);
    let as_u64 = u64::from_str_radix(&hex, 16).unwrap_or(0);
    as_u64 as f64 / 0x0FFF_FFFF_FFFF_FFFFu64 as f64
}

fn hex_prefix(digest: &[u8], hex_chars: usize) -> String {
    let bytes_needed = hex_chars.div_ceil(2);
    let mut s = String::with_capacity(hex_chars);
    for b in &digest[..bytes_needed.min(digest.len())] {
        s.push_str(&format!("{b:02x}"));
    }
    s.truncate(hex_chars);
    s
}

/// Outcome of walking a rollout's weighted variations for a given
/// bucket.
pub struct BucketedVariation {
    pub variation: usize,
    pub in_experiment: bool,
}

/// Walk `variations` in order accumulating `weight / 100_000` until
/// the bound exceeds `bucket`. specification §4.3.1: if the weights
/// sum to less than 1.0 and the bucket falls in the gap, the *last*
/// weighted variation wins.
pub fn select_weighted_variation(
    variations: &[WeightedVariation],
    bucket: f64,
    kind: RolloutKind,
) -> Option<BucketedVariation> {
    if variations.is_empty() {
        return None;
    }
    let mut cumulative = 0.0f64;
    for wv in variations {
        cumulative += wv.weight as f64 / 100_000.0;
        if bucket < cumulative {
            return Some(BucketedVariation {
                variation: wv.variation,
                in_experiment: kind == RolloutKind::Experiment && !wv.untracked,
            });
        }
    }
    let last = variations.last().unwrap();
    Some(BucketedVariation {
        variation: last.variation,
        in_experiment: kind == RolloutKind::Experiment && !last.untracked,
    })
}
