// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Translation of wire `put`/`patch`/`delete` payloads into store
//! writes (specification §4.2), grounded on the event-name dispatch in
//! `original_source/libs/server-sdk/src/data/sources/streaming/streaming_data_source.cpp`
//! (`DataSourceEventHandler::HandleMessage`) -- here expressed as free
//! functions shared by both the streaming and polling data sources
//! rather than a handler object, since neither needs to hold state
//! beyond the store and status provider they're already given.

use crate::data_model::{Descriptor, Flag, Kind, Segment};
use crate::error::{Error, Result};
use crate::store::MemoryStore;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub struct PutData {
    pub path: String,
    pub data: PutPayload,
}

#[derive(Debug, Deserialize, Default)]
pub struct PutPayload {
    #[serde(default)]
    pub flags: HashMap<String, Flag>,
    #[serde(default)]
    pub segments: HashMap<String, Segment>,
}

#[derive(Debug, Deserialize)]
pub struct PatchData {
    pub path: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct DeleteData {
    pub path: String,
    pub version: u64,
}

/// Split a `/flags/<key>` or `/segments/<key>` path into its kind and
/// key. Any other path is not a data-model item (e.g. a per-environment
/// path prefix some deployments use) and is rejected.
fn parse_path(path: &str) -> Result<(Kind, &str)> {
    let rest = path.strip_prefix('/').unwrap_or(path);
    if let Some(key) = rest.strip_prefix("flags/") {
        Ok((Kind::Flag, key))
    } else if let Some(key) = rest.strip_prefix("segments/") {
        Ok((Kind::Segment, key))
    } else {
        Err(Error::JsonSchema(format!("unrecognized path: {path}")))
    }
}

/// Replace the entire store contents from a `put` event's payload.
pub fn apply_put(store: &MemoryStore, raw: &str) -> Result<()> {
    let put: PutData = serde_json::from_str(raw).map_err(|e| Error::JsonSchema(e.to_string()))?;
    let items = put
        .data
        .flags
        .into_iter()
        .map(|(k, flag)| ((Kind::Flag, k), Descriptor::flag(flag)))
        .chain(
            put.data
                .segments
                .into_iter()
                .map(|(k, seg)| ((Kind::Segment, k), Descriptor::segment(seg))),
        );
    store.init(items);
    Ok(())
}

/// Apply a `patch` event's payload: upsert a single flag or segment.
pub fn apply_patch(store: &MemoryStore, raw: &str) -> Result<()> {
    let patch: PatchData = serde_json::from_str(raw).map_err(|e| Error::JsonSchema(e.to_string()))?;
    let (kind, key) = parse_path(&patch.path)?;
    let descriptor = match kind {
        Kind::Flag => {
            let flag: Flag = serde_json::from_value(patch.data).map_err(|e| Error::JsonSchema(e.to_string()))?;
            Descriptor::flag(flag)
        }
        Kind::Segment => {
            let segment: Segment =
                serde_json::from_value(patch.data).map_err(|e| Error::JsonSchema(e.to_string()))?;
            Descriptor::segment(segment)
        }
    };
    store.upsert(kind, key, descriptor);
    Ok(())
}

/// Apply a `delete` event's payload: write a tombstone at `version`.
pub fn apply_delete(store: &MemoryStore, raw: &str) -> Result<()> {
    let delete: DeleteData = serde_json::from_str(raw).map_err(|e| Error::JsonSchema(e.to_string()))?;
    let (kind, key) = parse_path(&delete.path)?;
    store.upsert(kind, key, Descriptor::tombstone(delete.version));
    Ok(())
}
