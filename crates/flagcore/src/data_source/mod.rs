// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Data sources (specification §4.2 / C4): the three ways a
//! `flagcore` client keeps its [`crate::store::MemoryStore`] current --
//! a persistent streaming connection, periodic polling, and an
//! on-demand lazy-load cache over an external persistent store.

pub mod backoff;
pub mod http_transport;
pub mod lazy_load;
pub mod polling;
pub mod sse;
pub mod state_machine;
pub mod streaming;
pub mod translate;

pub use backoff::{Backoff, BackoffPolicy};
pub use http_transport::{HttpTransport, PollOutcome};
pub use lazy_load::{CacheTtl, EvictionPolicy, LazyLoadDataSource, PersistentStore as LazyLoadPersistentStore};
pub use polling::PollingDataSource;
pub use sse::{SseClient, SseEvent, SseItem, SseStreamError};
pub use state_machine::{next_state, Transition};
pub use streaming::StreamingDataSource;

#[cfg(feature = "reqwest-transport")]
pub use http_transport::ReqwestHttpTransport;
#[cfg(feature = "reqwest-transport")]
pub use sse::ReqwestSseClient;
