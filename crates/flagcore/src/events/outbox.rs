// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Outbox event shapes and the bounded outbox queue (specification
//! §4.6). The outbox holds fully-derived, already-filtered events ready
//! to be serialized into a flush batch -- nothing here still references
//! the original [`crate::context::Context`].

use crate::eval::Reason;
use crate::value::Value;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct FeatureOutputEvent {
    pub creation_date: i64,
    pub context: Value,
    pub flag_key: String,
    pub flag_version: Option<u64>,
    pub variation: Option<usize>,
    pub value: Value,
    pub default: Value,
    pub reason: Option<Reason>,
}

#[derive(Debug, Clone)]
pub struct DebugOutputEvent {
    pub creation_date: i64,
    pub context: Value,
    pub flag_key: String,
    pub flag_version: Option<u64>,
    pub variation: Option<usize>,
    pub value: Value,
    pub default: Value,
    pub reason: Option<Reason>,
}

#[derive(Debug, Clone)]
pub struct IdentifyOutputEvent {
    pub creation_date: i64,
    pub context: Value,
}

#[derive(Debug, Clone)]
pub struct CustomOutputEvent {
    pub creation_date: i64,
    pub context: Value,
    pub key: String,
    pub data: Option<Value>,
    pub metric_value: Option<f64>,
}

/// One entry bound for the outgoing batch (specification §6.3: every
/// element of the JSON array has a `kind`).
#[derive(Debug, Clone)]
pub enum OutputEvent {
    Feature(FeatureOutputEvent),
    Debug(DebugOutputEvent),
    Identify(IdentifyOutputEvent),
    Custom(CustomOutputEvent),
}

impl OutputEvent {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            OutputEvent::Feature(e) => {
                let mut v = json!({
                    "kind": "feature",
                    "creationDate": e.creation_date,
                    "context": e.context.to_json(),
                    "key": e.flag_key,
                    "value": e.value.to_json(),
                    "default": e.default.to_json(),
                });
                if let Some(version) = e.flag_version {
                    v["version"] = json!(version);
                }
                if let Some(variation) = e.variation {
                    v["variation"] = json!(variation);
                }
                if let Some(reason) = &e.reason {
                    v["reason"] = reason.to_json();
                }
                v
            }
            OutputEvent::Debug(e) => {
                let mut v = json!({
                    "kind": "debug",
                    "creationDate": e.creation_date,
                    "context": e.context.to_json(),
                    "key": e.flag_key,
                    "value": e.value.to_json(),
                    "default": e.default.to_json(),
                });
                if let Some(version) = e.flag_version {
                    v["version"] = json!(version);
                }
                if let Some(variation) = e.variation {
                    v["variation"] = json!(variation);
                }
                if let Some(reason) = &e.reason {
                    v["reason"] = reason.to_json();
                }
                v
            }
            OutputEvent::Identify(e) => json!({
                "kind": "identify",
                "creationDate": e.creation_date,
                "context": e.context.to_json(),
            }),
            OutputEvent::Custom(e) => {
                let mut v = json!({
                    "kind": "custom",
                    "creationDate": e.creation_date,
                    "context": e.context.to_json(),
                    "key": e.key,
                });
                if let Some(data) = &e.data {
                    v["data"] = data.to_json();
                }
                if let Some(metric_value) = e.metric_value {
                    v["metricValue"] = json!(metric_value);
                }
                v
            }
        }
    }
}

/// A bounded FIFO of [`OutputEvent`]s. Overflow drops the newest event
/// and logs a warning once per overflow streak, per specification §4.6
/// ("once-per-period warning").
pub struct Outbox {
    capacity: usize,
    items: Mutex<Vec<OutputEvent>>,
    dropped: AtomicUsize,
    warned: AtomicBool,
}

impl Outbox {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Mutex::new(Vec::new()),
            dropped: AtomicUsize::new(0),
            warned: AtomicBool::new(false),
        }
    }

    /// Push one event. Returns `false` (and drops it) if the outbox is
    /// already at capacity.
    pub fn push(&self, event: OutputEvent) -> bool {
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        if items.len() >= self.capacity {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            if !self.warned.swap(true, Ordering::Relaxed) {
                crate::log_warn!("event outbox full at capacity {}, dropping events", self.capacity);
            }
            return false;
        }
        items.push(event);
        // The outbox had room again; the next overflow gets its own
        // warning rather than staying silent for the rest of the run.
        self.warned.store(false, Ordering::Relaxed);
        true
    }

    /// Take everything currently queued, leaving the outbox empty.
    pub fn drain(&self) -> Vec<OutputEvent> {
        std::mem::take(&mut *self.items.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn dropped_count(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identify(n: i64) -> OutputEvent {
        OutputEvent::Identify(IdentifyOutputEvent {
            creation_date: n,
            context: Value::Null,
        })
    }

    #[test]
    fn push_respects_capacity() {
        let outbox = Outbox::new(2);
        assert!(outbox.push(identify(1)));
        assert!(outbox.push(identify(2)));
        assert!(!outbox.push(identify(3)));
        assert_eq!(outbox.dropped_count(), 1);
        assert_eq!(outbox.drain().len(), 2);
    }

    #[test]
    fn drain_empties_the_outbox() {
        let outbox = Outbox::new(4);
        outbox.push(identify(1));
        let drained = outbox.drain();
        assert_eq!(drained.len(), 1);
        assert!(outbox.is_empty());
    }

    #[test]
    fn feature_event_serializes_expected_fields() {
        let event = OutputEvent::Feature(FeatureOutputEvent {
            creation_date: 1000,
            context: Value::Null,
            flag_key: "f".to_string(),
            flag_version: Some(3),
            variation: Some(1),
            value: Value::from(true),
            default: Value::from(false),
            reason: Some(Reason::Off),
        });
        let json = event.to_json();
        assert_eq!(json["kind"], "feature");
        assert_eq!(json["key"], "f");
        assert_eq!(json["version"], 3);
        assert_eq!(json["variation"], 1);
        assert_eq!(json["reason"]["kind"], "OFF");
    }
}
