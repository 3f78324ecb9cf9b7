// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The event processor (specification §4.6): a single task that owns
//! an inbox, a summarizer, and an outbox, draining caller-thread
//! `send()` calls into derived events and flushing batches to a
//! [`RequestWorkerPool`] on a timer or on demand.
//!
//! Grounded on `original_source/libs/internal/src/events/asio_event_processor.cpp`
//! for the overall pipeline shape (inbox -> derive -> summarize ->
//! outbox -> flush), reworked per the coroutine/async-control-flow
//! redesign note in specification §9: one task `select!`s on
//! `{inbox, flush timer, shutdown}` rather than an event-reader member
//! function that reschedules itself.

use super::context_filter::{ContextFilter, ContextFilterConfig};
use super::outbox::{CustomOutputEvent, DebugOutputEvent, FeatureOutputEvent, IdentifyOutputEvent, OutputEvent, Outbox};
use super::request_worker::{EventDeliveryTransport, RequestWorkerPool};
use super::summarizer::{SummaryState, Summarizer};
use crate::context::Context;
use crate::eval::Reason;
use crate::value::Value;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{mpsc, Notify};

/// Parameters for a single flag-evaluation input event.
#[derive(Debug, Clone)]
pub struct FeatureInputEvent {
    pub creation_date: i64,
    pub context: Context,
    pub flag_key: String,
    pub flag_version: Option<u64>,
    pub variation: Option<usize>,
    pub value: Value,
    pub default: Value,
    pub reason: Option<Reason>,
    pub track_events: bool,
    pub track_events_fallthrough: bool,
    pub debug_events_until_date: Option<i64>,
    /// Set for prerequisite evaluations and other cases that must
    /// always produce a full event regardless of `track_events`.
    pub require_full_event: bool,
}

/// Everything the evaluator/client facade can hand to the processor.
#[derive(Debug, Clone)]
pub enum InputEvent {
    Feature(FeatureInputEvent),
    Identify {
        context: Context,
        creation_date: i64,
    },
    Custom {
        key: String,
        context: Context,
        data: Option<Value>,
        metric_value: Option<f64>,
        creation_date: i64,
    },
}

#[derive(Debug, Clone)]
pub struct EventProcessorConfig {
    pub capacity: usize,
    pub flush_interval: Duration,
    pub flush_workers: usize,
    pub delivery_retry_delay: Duration,
    pub context_filter: ContextFilterConfig,
    pub events_url: String,
    pub sdk_key: String,
}

impl Default for EventProcessorConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            flush_interval: Duration::from_secs(5),
            flush_workers: 5,
            delivery_retry_delay: Duration::from_secs(1),
            context_filter: ContextFilterConfig::default(),
            events_url: String::new(),
            sdk_key: String::new(),
        }
    }
}

pub fn millis_since_epoch(t: SystemTime) -> i64 {
    t.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn summary_to_json(state: &SummaryState) -> serde_json::Value {
    let mut features = serde_json::Map::new();
    for (flag_key, entry) in &state.features {
        let counters: Vec<serde_json::Value> = entry
            .counters
            .iter()
            .map(|c| {
                let mut v = json!({"value": c.value.to_json(), "count": c.count});
                match c.variation {
                    Some(variation) => v["variation"] = json!(variation),
                    None => v["unknown"] = json!(true),
                }
                if let Some(version) = c.version {
                    v["version"] = json!(version);
                }
                v
            })
            .collect();
        features.insert(
            flag_key.clone(),
            json!({
                "default": entry.default_value.to_json(),
                "counters": counters,
            }),
        );
    }
    json!({
        "kind": "summary",
        "startDate": millis_since_epoch(state.start_date),
        "endDate": millis_since_epoch(state.end_date),
        "features": features,
    })
}

/// Non-blocking handoff from caller threads; `Flush`/`Close` trigger
/// out-of-band work on the owning task.
pub struct EventProcessor {
    tx: mpsc::Sender<InputEvent>,
    inbox_count: Arc<AtomicUsize>,
    capacity: usize,
    inbox_warned: Arc<AtomicBool>,
    flush_notify: Arc<Notify>,
    shutdown: Arc<AtomicBool>,
    task: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
    worker_pool: Arc<RequestWorkerPool>,
}

impl EventProcessor {
    pub fn new(config: EventProcessorConfig, transport: Arc<dyn EventDeliveryTransport>) -> Arc<Self> {
        let capacity = config.capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let inbox_count = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));
        let flush_notify = Arc::new(Notify::new());
        let worker_pool = Arc::new(RequestWorkerPool::new(
            config.flush_workers.max(1),
            transport,
            config.events_url.clone(),
            config.delivery_retry_delay,
        ));

        let processor = Arc::new(Self {
            tx,
            inbox_count: inbox_count.clone(),
            capacity,
            inbox_warned: Arc::new(AtomicBool::new(false)),
            flush_notify: flush_notify.clone(),
            shutdown: shutdown.clone(),
            task: tokio::sync::Mutex::new(None),
            worker_pool: worker_pool.clone(),
        });

        let sdk_key = config.sdk_key.clone();
        let filter = ContextFilter::new(config.context_filter.clone());
        let flush_interval = config.flush_interval;
        let handle = tokio::spawn(Self::run(
            rx,
            inbox_count,
            flush_notify,
            shutdown,
            filter,
            flush_interval,
            worker_pool,
            sdk_key,
        ));
        // The mutex is only ever touched here and in `close`, never
        // contended with the spawned task itself.
        if let Ok(mut guard) = processor.task.try_lock() {
            *guard = Some(handle);
        }
        processor
    }

    /// Best-effort, non-blocking handoff (specification §4.6): an
    /// atomic increment against the inbox counter, bounded by
    /// `capacity`; overflow drops the event and warns once.
    pub fn send(&self, event: InputEvent) {
        if self.shutdown.load(Ordering::Acquire) {
            return;
        }
        let prev = self.inbox_count.fetch_add(1, Ordering::AcqRel);
        if prev >= self.capacity {
            self.inbox_count.fetch_sub(1, Ordering::AcqRel);
            if !self.inbox_warned.swap(true, Ordering::Relaxed) {
                crate::log_warn!("event inbox full at capacity {}, dropping event", self.capacity);
            }
            return;
        }
        if self.tx.try_send(event).is_err() {
            self.inbox_count.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Trigger a flush out of band, in addition to the timer.
    pub fn flush(&self) {
        self.flush_notify.notify_one();
    }

    pub fn is_permanently_failed(&self) -> bool {
        self.worker_pool.is_permanently_failed()
    }

    /// Stop accepting new events, flush what remains, and wait for the
    /// owning task to drain (specification §5).
    pub async fn close(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.flush_notify.notify_one();
        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run(
        mut rx: mpsc::Receiver<InputEvent>,
        inbox_count: Arc<AtomicUsize>,
        flush_notify: Arc<Notify>,
        shutdown: Arc<AtomicBool>,
        filter: ContextFilter,
        flush_interval: Duration,
        worker_pool: Arc<RequestWorkerPool>,
        sdk_key: String,
    ) {
        let outbox = Outbox::new(usize::MAX / 2);
        let mut summarizer = Summarizer::new();
        let mut ticker = tokio::time::interval(flush_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                maybe_event = rx.recv() => {
                    match maybe_event {
                        Some(event) => {
                            inbox_count.fetch_sub(1, Ordering::AcqRel);
                            Self::process_input(event, &filter, &mut summarizer, &outbox, worker_pool.last_known_server_time());
                        }
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    Self::do_flush(&outbox, &mut summarizer, &worker_pool, &sdk_key).await;
                }
                _ = flush_notify.notified() => {
                    Self::do_flush(&outbox, &mut summarizer, &worker_pool, &sdk_key).await;
                    if shutdown.load(Ordering::Acquire) {
                        // Drain whatever arrived between the shutdown
                        // flag being set and this notification.
                        while let Ok(event) = rx.try_recv() {
                            inbox_count.fetch_sub(1, Ordering::AcqRel);
                            Self::process_input(event, &filter, &mut summarizer, &outbox, worker_pool.last_known_server_time());
                        }
                        Self::do_flush(&outbox, &mut summarizer, &worker_pool, &sdk_key).await;
                        break;
                    }
                }
            }
        }
    }

    fn process_input(
        event: InputEvent,
        filter: &ContextFilter,
        summarizer: &mut Summarizer,
        outbox: &Outbox,
        last_known_server_time: Option<SystemTime>,
    ) {
        match event {
            InputEvent::Feature(e) => {
                let full_event_needed = e.track_events
                    || (e.track_events_fallthrough && matches!(e.reason, Some(Reason::Fallthrough { .. })))
                    || e.require_full_event;
                let filtered_context = filter.filter(&e.context);
                if full_event_needed {
                    outbox.push(OutputEvent::Feature(FeatureOutputEvent {
                        creation_date: e.creation_date,
                        context: filtered_context.clone(),
                        flag_key: e.flag_key.clone(),
                        flag_version: e.flag_version,
                        variation: e.variation,
                        value: e.value.clone(),
                        default: e.default.clone(),
                        reason: e.reason.clone(),
                    }));
                }
                if let Some(debug_until) = e.debug_events_until_date {
                    let server_now = millis_since_epoch(last_known_server_time.unwrap_or(SystemTime::UNIX_EPOCH));
                    let local_now = millis_since_epoch(SystemTime::now());
                    if debug_until > local_now.max(server_now) {
                        outbox.push(OutputEvent::Debug(DebugOutputEvent {
                            creation_date: e.creation_date,
                            context: filtered_context,
                            flag_key: e.flag_key.clone(),
                            flag_version: e.flag_version,
                            variation: e.variation,
                            value: e.value.clone(),
                            default: e.default.clone(),
                            reason: e.reason.clone(),
                        }));
                    }
                }
                summarizer.add_evaluation(&e.flag_key, e.flag_version, e.variation, &e.value, &e.default);
            }
            InputEvent::Identify { context, creation_date } => {
                outbox.push(OutputEvent::Identify(IdentifyOutputEvent {
                    creation_date,
                    context: filter.filter(&context),
                }));
            }
            InputEvent::Custom {
                key,
                context,
                data,
                metric_value,
                creation_date,
            } => {
                outbox.push(OutputEvent::Custom(CustomOutputEvent {
                    creation_date,
                    context: filter.filter(&context),
                    key,
                    data,
                    metric_value,
                }));
            }
        }
    }

    async fn do_flush(outbox: &Outbox, summarizer: &mut Summarizer, worker_pool: &RequestWorkerPool, sdk_key: &str) {
        let events = outbox.drain();
        let summary = summarizer.finish(SystemTime::now());
        if events.is_empty() && summary.is_none() {
            return;
        }
        let mut batch: Vec<serde_json::Value> = events.iter().map(OutputEvent::to_json).collect();
        if let Some(summary) = summary {
            batch.push(summary_to_json(&summary));
        }
        let body = match serde_json::to_vec(&batch) {
            Ok(b) => b,
            Err(_) => return,
        };
        let headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("X-LaunchDarkly-Event-Schema".to_string(), "4".to_string()),
            ("X-LaunchDarkly-Payload-Id".to_string(), uuid::Uuid::new_v4().to_string()),
            ("Authorization".to_string(), sdk_key.to_string()),
        ];
        if !worker_pool.submit(body, headers) {
            crate::log_warn!("dropping event batch: delivery permanently failed or worker pool saturated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Attributes;
    use std::sync::Mutex;

    struct CapturingTransport {
        batches: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait::async_trait]
    impl EventDeliveryTransport for CapturingTransport {
        async fn post(
            &self,
            _url: &str,
            _headers: &[(String, String)],
            body: Vec<u8>,
        ) -> super::super::request_worker::DeliveryResponse {
            self.batches.lock().unwrap().push(body);
            super::super::request_worker::DeliveryResponse {
                status: Some(202),
                server_date: None,
            }
        }
    }

    fn ctx() -> Context {
        Context::single("user", Attributes::new("u1"))
    }

    #[tokio::test]
    async fn two_tracked_evaluations_flush_as_two_features_and_a_summary() {
        // specification §8.2 scenario 6.
        let transport = Arc::new(CapturingTransport { batches: Mutex::new(vec![]) });
        let processor = EventProcessor::new(
            EventProcessorConfig {
                flush_interval: Duration::from_secs(3600),
                events_url: "http://example.invalid/bulk".to_string(),
                sdk_key: "sdk-key".to_string(),
                ..Default::default()
            },
            transport.clone(),
        );

        for _ in 0..2 {
            processor.send(InputEvent::Feature(FeatureInputEvent {
                creation_date: 1,
                context: ctx(),
                flag_key: "flag".to_string(),
                flag_version: Some(1),
                variation: Some(1),
                value: Value::from(true),
                default: Value::from(false),
                reason: Some(Reason::Off),
                track_events: true,
                track_events_fallthrough: false,
                debug_events_until_date: None,
                require_full_event: false,
            }));
        }
        processor.flush();
        tokio::time::sleep(Duration::from_millis(50)).await;
        processor.close().await;

        let batches = transport.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        let parsed: Vec<serde_json::Value> = serde_json::from_slice(&batches[0]).unwrap();
        assert_eq!(parsed.len(), 3);
        let kinds: Vec<&str> = parsed.iter().map(|e| e["kind"].as_str().unwrap()).collect();
        assert_eq!(kinds.iter().filter(|k| **k == "feature").count(), 2);
        let summary = parsed.iter().find(|e| e["kind"] == "summary").unwrap();
        assert_eq!(summary["features"]["flag"]["counters"][0]["count"], 2);
    }

    #[tokio::test]
    async fn untracked_evaluation_only_produces_a_summary() {
        let transport = Arc::new(CapturingTransport { batches: Mutex::new(vec![]) });
        let processor = EventProcessor::new(
            EventProcessorConfig {
                flush_interval: Duration::from_secs(3600),
                events_url: "http://example.invalid/bulk".to_string(),
                sdk_key: "sdk-key".to_string(),
                ..Default::default()
            },
            transport.clone(),
        );
        processor.send(InputEvent::Feature(FeatureInputEvent {
            creation_date: 1,
            context: ctx(),
            flag_key: "flag".to_string(),
            flag_version: Some(1),
            variation: Some(0),
            value: Value::from(false),
            default: Value::from(false),
            reason: Some(Reason::Fallthrough { in_experiment: false }),
            track_events: false,
            track_events_fallthrough: false,
            debug_events_until_date: None,
            require_full_event: false,
        }));
        processor.flush();
        tokio::time::sleep(Duration::from_millis(50)).await;
        processor.close().await;

        let batches = transport.batches.lock().unwrap();
        let parsed: Vec<serde_json::Value> = serde_json::from_slice(&batches[0]).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0]["kind"], "summary");
    }

    #[tokio::test]
    async fn inbox_overflow_drops_events_past_capacity() {
        let transport = Arc::new(CapturingTransport { batches: Mutex::new(vec![]) });
        let processor = EventProcessor::new(
            EventProcessorConfig {
                capacity: 1,
                flush_interval: Duration::from_secs(3600),
                events_url: "http://example.invalid/bulk".to_string(),
                sdk_key: "sdk-key".to_string(),
                ..Default::default()
            },
            transport.clone(),
        );
        for _ in 0..5 {
            processor.send(InputEvent::Identify { context: ctx(), creation_date: 1 });
        }
        processor.flush();
        tokio::time::sleep(Duration::from_millis(50)).await;
        processor.close().await;
        let batches = transport.batches.lock().unwrap();
        let parsed: Vec<serde_json::Value> = serde_json::from_slice(&batches[0]).unwrap();
        assert!(parsed.len() < 5);
    }
}
