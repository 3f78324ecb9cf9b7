// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The data-source status provider (specification §4.7, §3.7).
//!
//! State is guarded by a mutex; handlers are invoked outside the lock
//! so a listener can safely call back into the provider (e.g. to read
//! the latest status) without deadlocking.

use crate::error::ErrorKind;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::SystemTime;

/// Server-SDK state vocabulary (specification §3.7). Client profiles
/// use the coarser `{Initializing, Valid, Interrupted, Off}` subset;
/// this type is a superset so a single status provider serves both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Initializing,
    Initialized,
    Reconciling,
    Tracking,
    Interrupted,
    Off,
}

impl State {
    /// The client-profile projection: `Initialized`/`Reconciling`/
    /// `Tracking` all read as `Valid` to a client-side caller.
    pub fn as_client_state(self) -> ClientState {
        match self {
            State::Initializing => ClientState::Initializing,
            State::Initialized | State::Reconciling | State::Tracking => ClientState::Valid,
            State::Interrupted => ClientState::Interrupted,
            State::Off => ClientState::Off,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Initializing,
    Valid,
    Interrupted,
    Off,
}

#[derive(Debug, Clone)]
pub struct LastError {
    pub kind: ErrorKind,
    pub status_code: Option<u16>,
    pub message: String,
    pub time: SystemTime,
}

#[derive(Debug, Clone)]
pub struct DataSourceStatus {
    pub state: State,
    pub state_since: SystemTime,
    pub last_error: Option<LastError>,
}

impl DataSourceStatus {
    fn initial() -> Self {
        Self {
            state: State::Initializing,
            state_since: SystemTime::now(),
            last_error: None,
        }
    }
}

type Handler = Box<dyn Fn(&DataSourceStatus) -> bool + Send + Sync>;

struct Listener {
    id: u64,
    handler: Handler,
}

/// A subscription handle; dropping it does nothing on its own --
/// call [`Cancellation::cancel`] (or let the provider's
/// `on_change_until` handler return `true`) to unsubscribe.
pub struct Cancellation {
    id: u64,
    provider: Arc<StatusProviderInner>,
}

impl Cancellation {
    pub fn cancel(self) {
        self.provider.listeners.lock().retain(|l| l.id != self.id);
    }
}

struct StatusProviderInner {
    state: Mutex<DataSourceStatus>,
    listeners: Mutex<Vec<Listener>>,
    next_id: std::sync::atomic::AtomicU64,
}

/// Observable data-source status with listener registration.
#[derive(Clone)]
pub struct StatusProvider {
    inner: Arc<StatusProviderInner>,
}

impl Default for StatusProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusProvider {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StatusProviderInner {
                state: Mutex::new(DataSourceStatus::initial()),
                listeners: Mutex::new(Vec::new()),
                next_id: std::sync::atomic::AtomicU64::new(0),
            }),
        }
    }

    pub fn status(&self) -> DataSourceStatus {
        self.inner.state.lock().clone()
    }

    /// Register a handler invoked on every status change; it runs
    /// until the returned [`Cancellation`] is cancelled.
    pub fn on_change<F>(&self, handler: F) -> Cancellation
    where
        F: Fn(&DataSourceStatus) + Send + Sync + 'static,
    {
        self.on_change_until(move |status| {
            handler(status);
            false
        })
    }

    /// Register a handler that unsubscribes itself once it returns
    /// `true`.
    pub fn on_change_until<F>(&self, handler: F) -> Cancellation
    where
        F: Fn(&DataSourceStatus) -> bool + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.inner.listeners.lock().push(Listener {
            id,
            handler: Box::new(handler),
        });
        Cancellation {
            id,
            provider: self.inner.clone(),
        }
    }

    /// Transition to a new state. Per specification §4.7: a
    /// transition *into* `Interrupted` while currently `Initializing`
    /// is suppressed (state remains `Initializing`). Equal-to-equal
    /// transitions don't update `state_since` and don't notify, but
    /// do update `last_error` if one is provided.
    pub fn set_state(&self, new_state: State, error: Option<LastError>) {
        let mut notify = false;
        let snapshot = {
            let mut guard = self.inner.state.lock();
            let suppressed = guard.state == State::Initializing && new_state == State::Interrupted;
            let effective = if suppressed { guard.state } else { new_state };
            let changed = effective != guard.state;
            if changed {
                guard.state = effective;
                guard.state_since = SystemTime::now();
                notify = true;
            }
            if let Some(err) = error {
                guard.last_error = Some(err);
                notify = true;
            }
            guard.clone()
        };
        if notify {
            self.notify(&snapshot);
        }
    }

    /// Record an error without necessarily changing state.
    pub fn set_error(&self, kind: ErrorKind, status_code: Option<u16>, message: impl Into<String>) {
        let err = LastError {
            kind,
            status_code,
            message: message.into(),
            time: SystemTime::now(),
        };
        let snapshot = {
            let mut guard = self.inner.state.lock();
            guard.last_error = Some(err);
            guard.clone()
        };
        self.notify(&snapshot);
    }

    fn notify(&self, status: &DataSourceStatus) {
        let mut listeners = self.inner.listeners.lock();
        listeners.retain(|l| !(l.handler)(status));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupted_while_initializing_is_suppressed() {
        let p = StatusProvider::new();
        p.set_state(State::Interrupted, None);
        assert_eq!(p.status().state, State::Initializing);
    }

    #[test]
    fn valid_transition_updates_state_since() {
        let p = StatusProvider::new();
        let before = p.status().state_since;
        std::thread::sleep(std::time::Duration::from_millis(2));
        p.set_state(State::Initialized, None);
        assert_eq!(p.status().state, State::Initialized);
        assert!(p.status().state_since > before);
    }

    #[test]
    fn equal_to_equal_transition_does_not_update_state_since_but_updates_error() {
        let p = StatusProvider::new();
        p.set_state(State::Initializing, None);
        let before = p.status().state_since;
        p.set_state(
            State::Initializing,
            Some(LastError {
                kind: ErrorKind::NetworkError,
                status_code: None,
                message: "x".into(),
                time: SystemTime::now(),
            }),
        );
        assert_eq!(p.status().state_since, before);
        assert!(p.status().last_error.is_some());
    }

    #[test]
    fn listener_unsubscribes_when_returning_true() {
        let p = StatusProvider::new();
        let calls = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let calls2 = calls.clone();
        p.on_change_until(move |_| {
            calls2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            true
        });
        p.set_state(State::Initialized, None);
        p.set_state(State::Interrupted, None);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn client_state_projection_collapses_server_states() {
        assert_eq!(State::Tracking.as_client_state(), ClientState::Valid);
        assert_eq!(State::Reconciling.as_client_state(), ClientState::Valid);
        assert_eq!(State::Off.as_client_state(), ClientState::Off);
    }
}
