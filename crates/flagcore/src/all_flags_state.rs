// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `AllFlagsState` (SPEC_FULL.md §C.2), grounded on
//! `original_source/libs/server-sdk/src/all_flags_state/all_flags_state.cpp`:
//! evaluates every flag currently in the store for one context and
//! returns a snapshot a server process can hand to a client-side SDK
//! it's bootstrapping, without that SDK needing its own connection.

use crate::context::Context;
use crate::data_model::Kind;
use crate::eval::{evaluate, Reason};
use crate::store::MemoryStore;
use crate::value::Value;
use std::collections::BTreeMap;

/// Per-flag bookkeeping alongside its evaluated value, carried in the
/// `$flagsState` side-channel of the serialized form rather than
/// alongside the value itself, so SDKs that don't care can skip it.
#[derive(Debug, Clone)]
pub struct FlagMetadata {
    pub version: u64,
    pub variation: Option<usize>,
    pub reason: Option<Reason>,
    pub track_events: bool,
    /// `trackEvents` computed from `debugEventsUntilDate`/`trackEventsFallthrough`
    /// rather than the flag's own flag, per the original's `TrackReason` field.
    pub track_reason: bool,
    pub debug_events_until_date: Option<i64>,
}

/// What to include and which flags to evaluate (specification §6.4's
/// `clientSide` scoping, reused here for the same "don't leak
/// server-only flags" concern).
#[derive(Debug, Clone, Default)]
pub struct AllFlagsStateOptions {
    /// Only include flags with `clientSideAvailability.usingEnvironmentId`.
    pub client_side_only: bool,
    pub with_reasons: bool,
    /// Drop per-flag metadata for flags that wouldn't generate an
    /// event anyway, shrinking the payload for bootstrap use.
    pub details_only_for_tracked_flags: bool,
}

/// A point-in-time snapshot of every (selected) flag's value for one
/// context.
#[derive(Debug, Clone)]
pub struct AllFlagsState {
    valid: bool,
    values: BTreeMap<String, Value>,
    metadata: BTreeMap<String, FlagMetadata>,
}

impl AllFlagsState {
    fn invalid() -> Self {
        Self {
            valid: false,
            values: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn valid(&self) -> bool {
        self.valid
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn metadata(&self, flag_key: &str) -> Option<&FlagMetadata> {
        self.metadata.get(flag_key)
    }

    /// The wire representation: flag values as top-level keys plus a
    /// `$flagsState` map of per-flag metadata and a `$valid` flag, per
    /// the original SDK's bootstrap payload shape.
    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        for (key, value) in &self.values {
            obj.insert(key.clone(), value.to_json());
        }
        let mut flags_state = serde_json::Map::new();
        for (key, meta) in &self.metadata {
            let mut entry = serde_json::Map::new();
            entry.insert("version".to_string(), serde_json::json!(meta.version));
            if let Some(variation) = meta.variation {
                entry.insert("variation".to_string(), serde_json::json!(variation));
            }
            if let Some(reason) = &meta.reason {
                entry.insert("reason".to_string(), reason.to_json());
            }
            if meta.track_events {
                entry.insert("trackEvents".to_string(), serde_json::json!(true));
            }
            if meta.track_reason {
                entry.insert("trackReason".to_string(), serde_json::json!(true));
            }
            if let Some(debug_until) = meta.debug_events_until_date {
                entry.insert("debugEventsUntilDate".to_string(), serde_json::json!(debug_until));
            }
            flags_state.insert(key.clone(), serde_json::Value::Object(entry));
        }
        obj.insert("$flagsState".to_string(), serde_json::Value::Object(flags_state));
        obj.insert("$valid".to_string(), serde_json::json!(self.valid));
        serde_json::Value::Object(obj)
    }
}

/// Build an [`AllFlagsState`] by evaluating every flag in `store`
/// against `context`. An invalid context produces an invalid, empty
/// state rather than evaluating anything -- mirroring how a single
/// evaluation would report `error(userNotSpecified)`.
pub fn all_flags_state(store: &MemoryStore, context: &Context, options: &AllFlagsStateOptions) -> AllFlagsState {
    if !context.is_valid() {
        return AllFlagsState::invalid();
    }

    let mut values = BTreeMap::new();
    let mut metadata = BTreeMap::new();

    for (key, descriptor) in store.all(Kind::Flag) {
        let Some(flag) = descriptor.as_flag() else {
            continue;
        };
        if options.client_side_only && !flag.client_side_availability.using_environment_id {
            continue;
        }

        let detail = evaluate(flag, context, store);
        values.insert(key.clone(), detail.value.clone());

        let track_reason = flag.track_events_fallthrough && matches!(detail.reason, Reason::Fallthrough { .. });
        let is_tracked = flag.track_events || track_reason || detail.reason == Reason::Off && flag.debug_events_until_date.is_some();
        if options.details_only_for_tracked_flags && !is_tracked {
            continue;
        }

        metadata.insert(
            key,
            FlagMetadata {
                version: flag.version,
                variation: detail.variation_index,
                reason: if options.with_reasons || is_tracked {
                    Some(detail.reason.clone())
                } else {
                    None
                },
                track_events: flag.track_events,
                track_reason,
                debug_events_until_date: flag.debug_events_until_date,
            },
        );
    }

    AllFlagsState {
        valid: true,
        values,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Attributes;
    use crate::data_model::{ClientSideAvailability, Descriptor, Flag, VariationOrRollout};

    fn flag(key: &str, client_side: bool) -> Flag {
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
            salt: "s".to_string(),
            track_events: false,
            track_events_fallthrough: false,
            debug_events_until_date: None,
            client_side_availability: ClientSideAvailability {
                using_environment_id: client_side,
                using_mobile_key: false,
            },
        }
    }

    #[test]
    fn invalid_context_yields_invalid_state() {
        let store = MemoryStore::new();
        let ctx = Context::single("user", Attributes::new(""));
        let state = all_flags_state(&store, &ctx, &AllFlagsStateOptions::default());
        assert!(!state.valid());
        assert!(state.values().is_empty());
    }

    #[test]
    fn evaluates_every_flag_in_the_store() {
        let store = MemoryStore::new();
        store.upsert(Kind::Flag, "a", Descriptor::flag(flag("a", true)));
        store.upsert(Kind::Flag, "b", Descriptor::flag(flag("b", false)));
        let ctx = Context::single("user", Attributes::new("u1"));
        let state = all_flags_state(&store, &ctx, &AllFlagsStateOptions::default());
        assert!(state.valid());
        assert_eq!(state.values().get("a"), Some(&Value::from(true)));
        assert_eq!(state.values().get("b"), Some(&Value::from(true)));
    }

    #[test]
    fn client_side_only_filters_out_server_flags() {
        let store = MemoryStore::new();
        store.upsert(Kind::Flag, "a", Descriptor::flag(flag("a", true)));
        store.upsert(Kind::Flag, "b", Descriptor::flag(flag("b", false)));
        let ctx = Context::single("user", Attributes::new("u1"));
        let options = AllFlagsStateOptions {
            client_side_only: true,
            ..Default::default()
        };
        let state = all_flags_state(&store, &ctx, &options);
        assert!(state.values().contains_key("a"));
        assert!(!state.values().contains_key("b"));
    }

    #[test]
    fn to_json_has_values_and_flags_state_side_channel() {
        let store = MemoryStore::new();
        store.upsert(Kind::Flag, "a", Descriptor::flag(flag("a", true)));
        let ctx = Context::single("user", Attributes::new("u1"));
        let state = all_flags_state(&store, &ctx, &AllFlagsStateOptions::default());
        let json = state.to_json();
        assert_eq!(json["a"], true);
        assert_eq!(json["$valid"], true);
        assert_eq!(json["$flagsState"]["a"]["version"], 1);
    }
}
