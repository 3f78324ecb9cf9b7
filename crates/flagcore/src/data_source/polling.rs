// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The polling data source (specification §4.2): a single task that
//! repeats `GET <polling base>/sdk/latest-all` on a fixed interval,
//! treating `200` as a full data-model replacement (`put`), `304` as
//! `Unchanged`, and `401`/`403`/`410` as permanent.
//!
//! Grounded on `original_source/libs/server-sdk/src/data/sources/polling/polling_data_source.cpp`
//! for the poll-loop shape; shares [`super::state_machine::next_state`]
//! and the `put`/error bookkeeping with [`super::streaming::StreamingDataSource`]
//! rather than duplicating it.

use super::http_transport::{HttpTransport, PollOutcome};
use super::state_machine::{next_state, Transition};
use super::translate;
use crate::error::ErrorKind;
use crate::status::{LastError, StatusProvider};
use crate::store::MemoryStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub struct PollingDataSource {
    store: Arc<MemoryStore>,
    status: StatusProvider,
    transport: Arc<dyn HttpTransport>,
    url: String,
    headers: Vec<(String, String)>,
    interval: Duration,
    etag: Mutex<Option<String>>,
    shutdown: Arc<AtomicBool>,
}

impl PollingDataSource {
    pub fn new(
        store: Arc<MemoryStore>,
        status: StatusProvider,
        transport: Arc<dyn HttpTransport>,
        url: impl Into<String>,
        headers: Vec<(String, String)>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            status,
            transport,
            url: url.into(),
            headers,
            interval,
            etag: Mutex::new(None),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.run().await })
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.status.set_state(crate::status::State::Off, None);
    }

    async fn run(self: Arc<Self>) {
        self.status.set_state(crate::status::State::Initializing, None);
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            if self.poll_once().await {
                break;
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    /// One poll cycle. Returns `true` if the caller should stop (an
    /// unrecoverable response moved the source to `Off`, or shutdown
    /// arrived mid-poll).
    async fn poll_once(&self) -> bool {
        let etag = self.etag.lock().await.clone();
        let outcome = self.transport.get(&self.url, &self.headers, etag.as_deref()).await;
        if self.shutdown.load(Ordering::SeqCst) {
            return true;
        }
        match outcome {
            PollOutcome::Ok { body, etag } => {
                *self.etag.lock().await = etag;
                match self.apply_poll_body(&body) {
                    Ok(()) => {
                        self.transition(Transition::Put);
                        false
                    }
                    Err(message) => {
                        self.status.set_error(ErrorKind::InvalidData, None, message);
                        self.transition(Transition::RecoverableError);
                        false
                    }
                }
            }
            PollOutcome::NotModified => {
                self.transition(Transition::Unchanged);
                false
            }
            PollOutcome::Unrecoverable(status) => {
                self.status.set_state(
                    crate::status::State::Off,
                    Some(LastError {
                        kind: ErrorKind::ErrorResponse,
                        status_code: Some(status),
                        message: format!("unrecoverable status {status}"),
                        time: std::time::SystemTime::now(),
                    }),
                );
                true
            }
            PollOutcome::Transport(message) => {
                self.status.set_state(
                    crate::status::State::Interrupted,
                    Some(LastError {
                        kind: ErrorKind::NetworkError,
                        status_code: None,
                        message,
                        time: std::time::SystemTime::now(),
                    }),
                );
                false
            }
        }
    }

    /// The polling body is a bare `{"flags": ..., "segments": ...}`
    /// object (no `put`-event envelope), so wrap it before handing it
    /// to the shared `put` translator.
    fn apply_poll_body(&self, body: &str) -> Result<(), String> {
        let payload: serde_json::Value = serde_json::from_str(body).map_err(|e| e.to_string())?;
        let envelope = serde_json::json!({"path": "/", "data": payload});
        translate::apply_put(&self.store, &envelope.to_string()).map_err(|e| e.to_string())
    }

    fn transition(&self, transition: Transition) {
        let current = self.status.status().state;
        self.status.set_state(next_state(current, transition), None);
    }
}
