// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The in-memory data store (specification §4.1).
//!
//! Keyed by `(Kind, key)` rather than using an open class hierarchy,
//! per the polymorphism note in specification §9. Grounded on the
//! teacher's `RuntimeConfig` (`crates/hdds/src/config.rs`): a
//! `DashMap` gives lock-free reads while a single atomic/mutex flag
//! tracks whether the store has ever been initialized.

use crate::data_model::{Descriptor, Kind};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Thread-safe map from `(kind, key)` to a versioned descriptor.
///
/// All three public operations never block a reader behind a writer
/// for longer than the single `DashMap` shard lock needed to read or
/// write one entry.
pub struct MemoryStore {
    items: DashMap<(Kind, String), Descriptor>,
    initialized: AtomicBool,
    init_lock: Mutex<()>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            items: DashMap::new(),
            initialized: AtomicBool::new(false),
            init_lock: Mutex::new(()),
        }
    }

    /// Atomically replace all data. Subsequent `init` calls replace
    /// the whole set again -- there is no merging.
    pub fn init(&self, data: impl IntoIterator<Item = ((Kind, String), Descriptor)>) {
        let _guard = self.init_lock.lock();
        self.items.clear();
        for (key, descriptor) in data {
            self.items.insert(key, descriptor);
        }
        self.initialized.store(true, Ordering::Release);
    }

    pub fn get(&self, kind: Kind, key: &str) -> Option<Descriptor> {
        self.items.get(&(kind, key.to_string())).map(|e| e.value().clone())
    }

    /// A snapshot of every descriptor of the given kind, tombstones
    /// included -- evaluators use this to distinguish "deleted" from
    /// "never existed".
    pub fn all(&self, kind: Kind) -> Vec<(String, Descriptor)> {
        self.items
            .iter()
            .filter(|e| e.key().0 == kind)
            .map(|e| (e.key().1.clone(), e.value().clone()))
            .collect()
    }

    /// Apply `descriptor` iff its version is strictly greater than
    /// whatever is currently stored (or nothing is stored yet).
    /// Returns whether the write took effect.
    pub fn upsert(&self, kind: Kind, key: &str, descriptor: Descriptor) -> bool {
        use dashmap::mapref::entry::Entry;
        match self.items.entry((kind, key.to_string())) {
            Entry::Vacant(v) => {
                v.insert(descriptor);
                true
            }
            Entry::Occupied(mut o) => {
                if descriptor.version > o.get().version {
                    o.insert(descriptor);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }
}
