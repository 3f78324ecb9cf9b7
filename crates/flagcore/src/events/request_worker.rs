// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Batch delivery: the request-worker pool and the delivery state
//! machine (specification §4.6), grounded on
//! `original_source/libs/internal/src/events/request_worker.cpp` for
//! the idle -> firstChance -> secondChance -> permanentlyFailed shape
//! and its retry/permanent-status classification.
//!
//! The state machine itself is a pure function, mirroring
//! [`crate::data_source::state_machine`]: no I/O, no timers, fully
//! testable without a network. The worker pool is the thin I/O shell
//! around it.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;

/// The persisted half of the delivery state machine -- `FirstChance`/
/// `SecondChance` exist only within a single delivery attempt and never
/// outlive it, so they aren't tracked across deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Idle,
    FirstChance,
    SecondChance,
    PermanentlyFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryEvent {
    Send,
    Success,
    TransientRetryable,
    TransientNotRetryable,
    Permanent,
}

/// Pure transition function for the delivery state machine
/// (specification §4.6).
pub fn next_delivery_state(current: DeliveryState, event: DeliveryEvent) -> DeliveryState {
    use DeliveryEvent::*;
    use DeliveryState::*;
    match (current, event) {
        (PermanentlyFailed, _) => PermanentlyFailed,
        (Idle, Send) => FirstChance,
        (FirstChance, Success) => Idle,
        (FirstChance, TransientRetryable) => SecondChance,
        (FirstChance, TransientNotRetryable) => Idle,
        (FirstChance, Permanent) => PermanentlyFailed,
        (SecondChance, Success) => Idle,
        (SecondChance, TransientRetryable) => Idle,
        (SecondChance, TransientNotRetryable) => Idle,
        (SecondChance, Permanent) => PermanentlyFailed,
        (other, _) => other,
    }
}

/// HTTP status classification for the delivery state machine.
/// Transient-retryable: IO errors, `5xx`, and `{400, 408, 429}`.
/// Transient-not-retryable: `413` (payload too large). Permanent: any
/// other `4xx`.
pub fn classify_status(status: u16) -> DeliveryEvent {
    if (200..300).contains(&status) {
        DeliveryEvent::Success
    } else if status == 413 {
        DeliveryEvent::TransientNotRetryable
    } else if matches!(status, 400 | 408 | 429) || (500..600).contains(&status) {
        DeliveryEvent::TransientRetryable
    } else if (400..500).contains(&status) {
        DeliveryEvent::Permanent
    } else {
        DeliveryEvent::TransientRetryable
    }
}

/// Outcome of a single POST attempt.
#[derive(Debug, Clone)]
pub struct DeliveryResponse {
    /// `None` on a pure transport error (connect/IO failure) -- treated
    /// the same as a `5xx`.
    pub status: Option<u16>,
    pub server_date: Option<SystemTime>,
}

fn classify_response(resp: &DeliveryResponse) -> DeliveryEvent {
    match resp.status {
        Some(status) => classify_status(status),
        None => DeliveryEvent::TransientRetryable,
    }
}

/// The injected HTTP POST seam -- this crate doesn't speak TLS itself
/// (specification §1).
#[async_trait]
pub trait EventDeliveryTransport: Send + Sync {
    async fn post(&self, url: &str, headers: &[(String, String)], body: Vec<u8>) -> DeliveryResponse;
}

/// Drives one delivery attempt (with its single retry) through
/// [`next_delivery_state`], returning the final event-loop-relevant
/// outcome: whether delivery succeeded, and the server `Date` if any
/// response carried one.
async fn deliver_once(
    transport: &dyn EventDeliveryTransport,
    url: &str,
    headers: &[(String, String)],
    body: Vec<u8>,
    retry_delay: Duration,
) -> (DeliveryState, Option<SystemTime>) {
    let mut state = next_delivery_state(DeliveryState::Idle, DeliveryEvent::Send);
    let first = transport.post(url, headers, body.clone()).await;
    let event = classify_response(&first);
    state = next_delivery_state(state, event);
    if state != DeliveryState::SecondChance {
        return (state, first.server_date);
    }
    tokio::time::sleep(retry_delay).await;
    let second = transport.post(url, headers, body).await;
    let event = classify_response(&second);
    state = next_delivery_state(state, event);
    (state, second.server_date.or(first.server_date))
}

/// A fixed-size pool of request workers (specification §4.6/§5). Each
/// worker owns its in-flight HTTP request; `permanently_failed` and
/// `last_known_server_time` are shared so the processor can observe
/// them without holding a reference to any individual worker.
pub struct RequestWorkerPool {
    tx: mpsc::Sender<(Vec<u8>, Vec<(String, String)>)>,
    permanently_failed: Arc<AtomicBool>,
    last_known_server_time: Arc<Mutex<Option<SystemTime>>>,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl RequestWorkerPool {
    pub fn new(
        worker_count: usize,
        transport: Arc<dyn EventDeliveryTransport>,
        url: String,
        retry_delay: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<(Vec<u8>, Vec<(String, String)>)>(worker_count.max(1) * 4);
        let rx = Arc::new(Mutex::new(rx));
        let permanently_failed = Arc::new(AtomicBool::new(false));
        let last_known_server_time = Arc::new(Mutex::new(None));
        let mut handles = Vec::with_capacity(worker_count);
        for _ in 0..worker_count.max(1) {
            let rx = rx.clone();
            let transport = transport.clone();
            let url = url.clone();
            let permanently_failed = permanently_failed.clone();
            let last_known_server_time = last_known_server_time.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    let job = {
                        let mut guard = rx.lock().unwrap_or_else(|e| e.into_inner());
                        guard.recv().await
                    };
                    let Some((body, headers)) = job else {
                        break;
                    };
                    if permanently_failed.load(Ordering::Acquire) {
                        continue;
                    }
                    let (state, server_date) = deliver_once(transport.as_ref(), &url, &headers, body, retry_delay).await;
                    if let Some(date) = server_date {
                        *last_known_server_time.lock().unwrap_or_else(|e| e.into_inner()) = Some(date);
                    }
                    if state == DeliveryState::PermanentlyFailed
                        && !permanently_failed.swap(true, Ordering::AcqRel)
                    {
                        crate::log_error!("event delivery permanently failed; no further batches will be sent");
                    }
                }
            }));
        }
        Self {
            tx,
            permanently_failed,
            last_known_server_time,
            handles,
        }
    }

    /// Hand a batch to the pool. Returns `false` without enqueueing if
    /// the processor has already permanently failed (specification
    /// §4.6: "no further HTTP requests are issued").
    pub fn submit(&self, body: Vec<u8>, headers: Vec<(String, String)>) -> bool {
        if self.permanently_failed.load(Ordering::Acquire) {
            return false;
        }
        self.tx.try_send((body, headers)).is_ok()
    }

    pub fn is_permanently_failed(&self) -> bool {
        self.permanently_failed.load(Ordering::Acquire)
    }

    pub fn last_known_server_time(&self) -> Option<SystemTime> {
        *self.last_known_server_time.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stop accepting new batches and wait for in-flight deliveries to
    /// finish, per specification §5.
    pub async fn shutdown(self) {
        drop(self.tx);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

#[cfg(feature = "reqwest-transport")]
pub use reqwest_impl::ReqwestEventDeliveryTransport;

#[cfg(feature = "reqwest-transport")]
mod reqwest_impl {
    use super::{DeliveryResponse, EventDeliveryTransport};
    use async_trait::async_trait;
    use std::time::SystemTime;

    #[derive(Debug, Clone, Default)]
    pub struct ReqwestEventDeliveryTransport {
        client: reqwest::Client,
    }

    impl ReqwestEventDeliveryTransport {
        pub fn new(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl EventDeliveryTransport for ReqwestEventDeliveryTransport {
        async fn post(&self, url: &str, headers: &[(String, String)], body: Vec<u8>) -> DeliveryResponse {
            let mut builder = self.client.post(url).body(body);
            for (name, value) in headers {
                builder = builder.header(name, value);
            }
            let response = match builder.send().await {
                Ok(r) => r,
                Err(_) => return DeliveryResponse { status: None, server_date: None },
            };
            let status = response.status().as_u16();
            let server_date = response
                .headers()
                .get(reqwest::header::DATE)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| chrono::DateTime::parse_from_rfc2822(s).ok())
                .map(|dt| SystemTime::from(dt));
            DeliveryResponse {
                status: Some(status),
                server_date,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_returns_to_idle() {
        let s = next_delivery_state(DeliveryState::Idle, DeliveryEvent::Send);
        let s = next_delivery_state(s, DeliveryEvent::Success);
        assert_eq!(s, DeliveryState::Idle);
    }

    #[test]
    fn retryable_transient_gets_a_second_chance() {
        let s = next_delivery_state(DeliveryState::Idle, DeliveryEvent::Send);
        let s = next_delivery_state(s, DeliveryEvent::TransientRetryable);
        assert_eq!(s, DeliveryState::SecondChance);
    }

    #[test]
    fn second_chance_transient_drops_back_to_idle() {
        let s = next_delivery_state(DeliveryState::SecondChance, DeliveryEvent::TransientRetryable);
        assert_eq!(s, DeliveryState::Idle);
    }

    #[test]
    fn permanent_is_terminal_and_sticky() {
        let s = next_delivery_state(DeliveryState::FirstChance, DeliveryEvent::Permanent);
        assert_eq!(s, DeliveryState::PermanentlyFailed);
        let s = next_delivery_state(s, DeliveryEvent::Success);
        assert_eq!(s, DeliveryState::PermanentlyFailed);
    }

    #[test]
    fn payload_too_large_is_not_retried_but_not_permanent() {
        let s = next_delivery_state(DeliveryState::FirstChance, DeliveryEvent::TransientNotRetryable);
        assert_eq!(s, DeliveryState::Idle);
    }

    #[test]
    fn status_classification() {
        assert_eq!(classify_status(200), DeliveryEvent::Success);
        assert_eq!(classify_status(429), DeliveryEvent::TransientRetryable);
        assert_eq!(classify_status(500), DeliveryEvent::TransientRetryable);
        assert_eq!(classify_status(413), DeliveryEvent::TransientNotRetryable);
        assert_eq!(classify_status(401), DeliveryEvent::Permanent);
        assert_eq!(classify_status(404), DeliveryEvent::Permanent);
    }

    struct ScriptedTransport {
        responses: Mutex<Vec<DeliveryResponse>>,
        calls: AtomicBool,
    }

    #[async_trait]
    impl EventDeliveryTransport for ScriptedTransport {
        async fn post(&self, _url: &str, _headers: &[(String, String)], _body: Vec<u8>) -> DeliveryResponse {
            self.calls.store(true, Ordering::SeqCst);
            let mut guard = self.responses.lock().unwrap();
            if guard.is_empty() {
                DeliveryResponse { status: Some(500), server_date: None }
            } else {
                guard.remove(0)
            }
        }
    }

    #[tokio::test]
    async fn permanently_failed_pool_stops_accepting_work() {
        let transport = Arc::new(ScriptedTransport {
            responses: Mutex::new(vec![DeliveryResponse { status: Some(401), server_date: None }]),
            calls: AtomicBool::new(false),
        });
        let pool = RequestWorkerPool::new(1, transport, "http://example.invalid".to_string(), Duration::from_millis(1));
        assert!(pool.submit(b"[]".to_vec(), vec![]));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(pool.is_permanently_failed());
        assert!(!pool.submit(b"[]".to_vec(), vec![]));
        pool.shutdown().await;
    }
}
