// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The persistent-store abstraction backing the lazy-load data system
//! (`flagcore::data_source::lazy_load`), grounded on
//! `hdds-persistence/src/store.rs`'s `PersistenceStore` trait shape:
//! a small, backend-agnostic trait plus one in-tree reference
//! implementation, with real backends left to downstream crates.
//!
//! Unlike the streaming/polling data sources, a persistent store is
//! read synchronously -- the lazy-load cache wraps calls in
//! `spawn_blocking` where that matters, the same way the teacher's own
//! SQLite-backed store is a blocking API called from async code.

use crate::error::{PersistenceError, Result};
use flagcore::data_model::{Descriptor, Flag, Kind, Segment};
use flagcore::data_source::LazyLoadPersistentStore;
use std::collections::HashMap;
use std::sync::Mutex;

/// Backend-agnostic read interface for flags/segments at rest.
///
/// # Implementations
///
/// - [`InMemoryPersistentStore`] -- reference implementation, used by
///   this crate's own tests and as a drop-in for `flagcore` tests that
///   exercise the lazy-load data system without a real backend.
/// - [`FileBootstrapStore`] -- reads a one-shot JSON snapshot at
///   construction time; has no write path, mirroring the
///   `bootstrap`-only persistence mode in the original SDK.
pub trait PersistentStore: Send + Sync {
    /// Fetch one item by kind and key.
    fn get(&self, kind: Kind, key: &str) -> Result<Option<Descriptor>>;

    /// Fetch everything of a given kind, for cache population.
    fn all(&self, kind: Kind) -> Result<Vec<(String, Descriptor)>>;
}

/// A reference `PersistentStore` backed by an in-process map. Has a
/// write path (`upsert`) so tests can seed it directly, unlike
/// [`FileBootstrapStore`].
#[derive(Default)]
pub struct InMemoryPersistentStore {
    items: Mutex<HashMap<(Kind, String), Descriptor>>,
}

impl InMemoryPersistentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, kind: Kind, key: impl Into<String>, descriptor: Descriptor) {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((kind, key.into()), descriptor);
    }
}

impl PersistentStore for InMemoryPersistentStore {
    fn get(&self, kind: Kind, key: &str) -> Result<Option<Descriptor>> {
        Ok(self
            .items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(kind, key.to_string()))
            .cloned())
    }

    fn all(&self, kind: Kind) -> Result<Vec<(String, Descriptor)>> {
        Ok(self
            .items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|((_, key), descriptor)| (key.clone(), descriptor.clone()))
            .collect())
    }
}

/// Bridges this crate's `Result<T, PersistenceError>` API to the
/// plain-string error contract `flagcore::data_source::LazyLoadDataSource`
/// expects from any backend, since that trait lives in a crate that
/// can't know about `PersistenceError`.
impl LazyLoadPersistentStore for InMemoryPersistentStore {
    fn get(&self, kind: Kind, key: &str) -> std::result::Result<Option<Descriptor>, String> {
        PersistentStore::get(self, kind, key).map_err(|e| e.to_string())
    }

    fn all(&self, kind: Kind) -> std::result::Result<Vec<(String, Descriptor)>, String> {
        PersistentStore::all(self, kind).map_err(|e| e.to_string())
    }
}

#[derive(serde::Deserialize)]
struct BootstrapFile {
    #[serde(default)]
    flags: HashMap<String, Flag>,
    #[serde(default)]
    segments: HashMap<String, Segment>,
}

/// Reads a `{"flags": {...}, "segments": {...}}` JSON snapshot once at
/// construction time -- the one-shot "bootstrap" persistence mode
/// (grounded on `bootstrap_builder.cpp`), as opposed to a store that's
/// written to continuously.
pub struct FileBootstrapStore {
    flags: HashMap<String, Descriptor>,
    segments: HashMap<String, Descriptor>,
}

impl FileBootstrapStore {
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let parsed: BootstrapFile =
            serde_json::from_str(&text).map_err(|e| PersistenceError::Malformed(e.to_string()))?;
        tracing::debug!(
            flags = parsed.flags.len(),
            segments = parsed.segments.len(),
            "loaded bootstrap persistence file"
        );
        Ok(Self {
            flags: parsed
                .flags
                .into_iter()
                .map(|(k, flag)| (k, Descriptor::flag(flag)))
                .collect(),
            segments: parsed
                .segments
                .into_iter()
                .map(|(k, segment)| (k, Descriptor::segment(segment)))
                .collect(),
        })
    }
}

impl PersistentStore for FileBootstrapStore {
    fn get(&self, kind: Kind, key: &str) -> Result<Option<Descriptor>> {
        let map = match kind {
            Kind::Flag => &self.flags,
            Kind::Segment => &self.segments,
        };
        Ok(map.get(key).cloned())
    }

    fn all(&self, kind: Kind) -> Result<Vec<(String, Descriptor)>> {
        let map = match kind {
            Kind::Flag => &self.flags,
            Kind::Segment => &self.segments,
        };
        Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

impl LazyLoadPersistentStore for FileBootstrapStore {
    fn get(&self, kind: Kind, key: &str) -> std::result::Result<Option<Descriptor>, String> {
        PersistentStore::get(self, kind, key).map_err(|e| e.to_string())
    }

    fn all(&self, kind: Kind) -> std::result::Result<Vec<(String, Descriptor)>, String> {
        PersistentStore::all(self, kind).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flag(key: &str, version: u64) -> Flag {
        serde_json::from_value(serde_json::json!({
            "key": key,
            "version": version,
            "on": true,
            "variations": [true],
            "offVariation": 0,
            "fallthrough": {"variation": 0},
        }))
        .unwrap()
    }

    #[test]
    fn in_memory_store_round_trips_an_upsert() {
        let store = InMemoryPersistentStore::new();
        store.upsert(Kind::Flag, "f", Descriptor::flag(flag("f", 1)));
        let fetched = store.get(Kind::Flag, "f").unwrap().unwrap();
        assert_eq!(fetched.version, 1);
        assert_eq!(store.all(Kind::Flag).unwrap().len(), 1);
        assert!(store.all(Kind::Segment).unwrap().is_empty());
    }

    #[test]
    fn in_memory_store_missing_key_is_none() {
        let store = InMemoryPersistentStore::new();
        assert!(store.get(Kind::Flag, "nope").unwrap().is_none());
    }

    #[test]
    fn file_bootstrap_store_loads_flags_and_segments() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        use std::io::Write;
        write!(
            file,
            r#"{{"flags":{{"f":{{"key":"f","version":1,"on":true,"variations":[true],"offVariation":0,"fallthrough":{{"variation":0}}}}}},"segments":{{}}}}"#
        )
        .unwrap();
        let store = FileBootstrapStore::load(file.path()).unwrap();
        assert!(store.get(Kind::Flag, "f").unwrap().is_some());
        assert!(store.get(Kind::Segment, "nope").unwrap().is_none());
    }

    #[test]
    fn file_bootstrap_store_rejects_malformed_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        use std::io::Write;
        write!(file, "not json").unwrap();
        assert!(FileBootstrapStore::load(file.path()).is_err());
    }
}
