// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Descriptors and tombstones (specification §3.6).

use super::{Flag, Segment};
use serde::{Deserialize, Serialize};

/// Which kind of item a descriptor holds -- the store is keyed by
/// `(Kind, key)` rather than using a dynamic-dispatch item trait
/// (specification §9, "Polymorphism for stored items").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    Flag,
    Segment,
}

/// The concrete payload of a versioned item, or nothing if it has been
/// deleted (a tombstone).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Item {
    Flag(Flag),
    Segment(Segment),
    Tombstone,
}

/// A versioned wrapper over a stored item or its tombstone.
///
/// Tombstones retain their version so a later out-of-order update with
/// a lower version is rejected by [`crate::store::DataStore::upsert`]
/// just like it would be for a live item.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub version: u64,
    pub item: Item,
}

impl Descriptor {
    pub fn flag(flag: Flag) -> Self {
        Self {
            version: flag.version,
            item: Item::Flag(flag),
        }
    }

    pub fn segment(segment: Segment) -> Self {
        Self {
            version: segment.version,
            item: Item::Segment(segment),
        }
    }

    pub fn tombstone(version: u64) -> Self {
        Self {
            version,
            item: Item::Tombstone,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self.item, Item::Tombstone)
    }

    pub fn as_flag(&self) -> Option<&Flag> {
        match &self.item {
            Item::Flag(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_segment(&self) -> Option<&Segment> {
        match &self.item {
            Item::Segment(s) => Some(s),
            _ => None,
        }
    }
}
