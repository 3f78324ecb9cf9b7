// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The lazy-load data system (SPEC_FULL.md §C.3): a third mode
//! alongside streaming and polling that reads flags/segments on
//! demand from an externally-owned persistent store, with a
//! TTL-bounded cache in front of it.
//!
//! Grounded on `original_source/.../data_system/lazy_load_builder.cpp`:
//! unlike streaming/polling there is no reconnect loop to own --
//! `LazyLoadDataSource` is purely reactive, populating
//! [`crate::store::MemoryStore`] as evaluations ask for keys it hasn't
//! seen (or whose cache entry expired) rather than replicating the
//! whole data set up front. The concrete backend is injected as a
//! trait object so a real implementation (e.g. `flagcore-persistence`'s
//! store types) never needs to depend back on this crate's data-source
//! internals.

use crate::data_model::{Descriptor, Kind};
use crate::status::{ClientState, State, StatusProvider};
use crate::store::MemoryStore;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The read-only seam onto an externally-owned persistent store.
/// Errors are reported as plain strings, matching the other injected
/// transport traits in this module (e.g. [`super::http_transport::HttpTransport`]) --
/// there is no shared error type to round-trip across the crate
/// boundary a concrete backend lives behind.
pub trait PersistentStore: Send + Sync {
    fn get(&self, kind: Kind, key: &str) -> Result<Option<Descriptor>, String>;
    fn all(&self, kind: Kind) -> Result<Vec<(String, Descriptor)>, String>;
}

/// How long a cached read remains valid before it's treated as stale.
#[derive(Debug, Clone, Copy)]
pub struct CacheTtl(pub Duration);

impl Default for CacheTtl {
    fn default() -> Self {
        Self(Duration::from_secs(30))
    }
}

/// What happens when a cache entry is found to be stale.
#[derive(Debug, Clone, Copy)]
pub enum EvictionPolicy {
    /// Evict only the stale entry; once the cache holds more than
    /// `capacity` live entries, drop the least recently touched one.
    Lru { capacity: usize },
    /// Any single stale entry invalidates the entire cache, forcing a
    /// full refetch on next access -- appropriate for backends where a
    /// partial cache is more surprising than a cold one.
    All,
}

struct CacheEntry {
    descriptor: Descriptor,
    loaded_at: Instant,
}

/// On-demand data source backed by a [`PersistentStore`]. Does not own
/// a background task -- every read is driven by a caller (typically
/// the evaluator, via the owning client) asking for a specific key.
pub struct LazyLoadDataSource {
    backend: Arc<dyn PersistentStore>,
    store: Arc<MemoryStore>,
    status: StatusProvider,
    ttl: Duration,
    eviction: EvictionPolicy,
    cache: DashMap<(Kind, String), CacheEntry>,
    lru_order: Mutex<VecDeque<(Kind, String)>>,
}

impl LazyLoadDataSource {
    pub fn new(
        backend: Arc<dyn PersistentStore>,
        store: Arc<MemoryStore>,
        status: StatusProvider,
        ttl: CacheTtl,
        eviction: EvictionPolicy,
    ) -> Self {
        // There is no connection to establish, so the source is ready
        // the moment it exists.
        status.set_state(State::Initialized, None);
        Self {
            backend,
            store,
            status,
            ttl: ttl.0,
            eviction,
            cache: DashMap::new(),
            lru_order: Mutex::new(VecDeque::new()),
        }
    }

    pub fn status(&self) -> ClientState {
        self.status.status().state.as_client_state()
    }

    /// Fetch one item, consulting the cache first. A cache hit within
    /// `ttl` never touches the backend; a miss or an expired entry
    /// fetches fresh data, writes it into the shared store, and
    /// refreshes the cache.
    pub fn get(&self, kind: Kind, key: &str) -> Result<Option<Descriptor>, String> {
        let cache_key = (kind, key.to_string());
        if let Some(entry) = self.cache.get(&cache_key) {
            if entry.loaded_at.elapsed() < self.ttl {
                let descriptor = entry.descriptor.clone();
                drop(entry);
                self.touch(&cache_key);
                return Ok(Some(descriptor));
            }
        }
        self.evict_stale(&cache_key);

        let fetched = self.backend.get(kind, key)?;
        if let Some(descriptor) = &fetched {
            self.store.upsert(kind, key, descriptor.clone());
            self.cache.insert(
                cache_key.clone(),
                CacheEntry {
                    descriptor: descriptor.clone(),
                    loaded_at: Instant::now(),
                },
            );
            self.touch(&cache_key);
            self.enforce_capacity();
        }
        Ok(fetched)
    }

    /// Bulk-load every item of `kind` (used by `AllFlagsState`, which
    /// can't enumerate keys it hasn't already cached). Bypasses the
    /// per-key TTL -- a full load is always fresh.
    pub fn load_all(&self, kind: Kind) -> Result<Vec<(String, Descriptor)>, String> {
        let items = self.backend.all(kind)?;
        for (key, descriptor) in &items {
            self.store.upsert(kind, key, descriptor.clone());
            let cache_key = (kind, key.clone());
            self.cache.insert(
                cache_key.clone(),
                CacheEntry {
                    descriptor: descriptor.clone(),
                    loaded_at: Instant::now(),
                },
            );
            self.touch(&cache_key);
        }
        self.enforce_capacity();
        Ok(items)
    }

    fn evict_stale(&self, cache_key: &(Kind, String)) {
        match self.eviction {
            EvictionPolicy::All => {
                self.cache.clear();
                self.lru_order.lock().clear();
            }
            EvictionPolicy::Lru { .. } => {
                self.cache.remove(cache_key);
                self.lru_order.lock().retain(|k| k != cache_key);
            }
        }
    }

    fn touch(&self, cache_key: &(Kind, String)) {
        let mut order = self.lru_order.lock();
        order.retain(|k| k != cache_key);
        order.push_back(cache_key.clone());
    }

    fn enforce_capacity(&self) {
        if let EvictionPolicy::Lru { capacity } = self.eviction {
            let mut order = self.lru_order.lock();
            while order.len() > capacity {
                if let Some(oldest) = order.pop_front() {
                    self.cache.remove(&oldest);
                } else {
                    break;
                }
            }
        }
    }
}
