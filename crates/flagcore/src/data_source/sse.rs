// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The SSE transport seam: [`SseClient`] is the only thing
//! [`super::streaming::StreamingDataSource`] depends on, so tests (and
//! callers who want a non-`reqwest` HTTP stack) can supply their own.
//! Grounded on the `sse::Builder`/`receiver`/`errors` callback split in
//! `original_source/libs/server-sdk/src/data/sources/streaming/streaming_data_source.cpp`,
//! re-expressed as a channel of [`SseItem`]s rather than callbacks,
//! which composes better with a `tokio::select!`-driven owning task.

use async_trait::async_trait;
use tokio::sync::mpsc::Sender;

#[derive(Debug, Clone)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

#[derive(Debug, Clone)]
pub enum SseStreamError {
    /// A retryable transport-level failure (connection reset, DNS,
    /// timeout, non-permanent HTTP status).
    Transport(String),
    /// 401, 403, 410, or any status the service documents as
    /// permanent -- the data source must not reconnect.
    UnrecoverableStatus(u16),
}

#[derive(Debug, Clone)]
pub enum SseItem {
    Event(SseEvent),
    Error(SseStreamError),
    /// The stream ended without an error (e.g. the server closed it
    /// cleanly); the caller's reconnect loop decides what happens next.
    Closed,
}

/// Streams SSE items from `url` into `tx` until the connection ends.
/// Implementations own their own reconnection-within-a-single-call
/// retries (e.g. following an HTTP redirect); they must not loop
/// forever -- [`super::streaming::StreamingDataSource`] owns the
/// outer backoff-and-reconnect loop.
#[async_trait]
pub trait SseClient: Send + Sync {
    async fn stream(&self, url: &str, headers: &[(String, String)], tx: Sender<SseItem>);
}

#[cfg(feature = "reqwest-transport")]
pub use reqwest_impl::ReqwestSseClient;

#[cfg(feature = "reqwest-transport")]
mod reqwest_impl {
    use super::{SseClient, SseEvent, SseItem, SseStreamError};
    use async_trait::async_trait;
    use futures_util::StreamExt;
    use reqwest_eventsource::{Event, EventSource};
    use tokio::sync::mpsc::Sender;

    /// The default transport, backed by `reqwest` + `reqwest-eventsource`.
    #[derive(Debug, Clone, Default)]
    pub struct ReqwestSseClient {
        client: reqwest::Client,
    }

    impl ReqwestSseClient {
        pub fn new(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl SseClient for ReqwestSseClient {
        async fn stream(&self, url: &str, headers: &[(String, String)], tx: Sender<SseItem>) {
            let mut builder = self.client.get(url);
            for (name, value) in headers {
                builder = builder.header(name, value);
            }
            let mut source = match EventSource::new(builder) {
                Ok(s) => s,
                Err(e) => {
                    let _ = tx.send(SseItem::Error(SseStreamError::Transport(e.to_string()))).await;
                    return;
                }
            };
            while let Some(event) = source.next().await {
                let item = match event {
                    Ok(Event::Open) => continue,
                    Ok(Event::Message(m)) => SseItem::Event(SseEvent {
                        event: m.event,
                        data: m.data,
                    }),
                    Err(reqwest_eventsource::Error::InvalidStatusCode(status, _))
                        if matches!(status.as_u16(), 401 | 403 | 410) =>
                    {
                        SseItem::Error(SseStreamError::UnrecoverableStatus(status.as_u16()))
                    }
                    Err(e) => SseItem::Error(SseStreamError::Transport(e.to_string())),
                };
                if tx.send(item).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(SseItem::Closed).await;
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::test_support::ScriptedSseClient;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[tokio::test]
    async fn scripted_client_delivers_items_in_order() {
        let client = ScriptedSseClient {
            script: Arc::new(Mutex::new(vec![
                SseItem::Event(SseEvent {
                    event: "put".to_string(),
                    data: "{}".to_string(),
                }),
                SseItem::Closed,
            ])),
        };
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        client.stream("http://example.invalid", &[], tx).await;
        let first = rx.recv().await.unwrap();
        assert!(matches!(first, SseItem::Event(_)));
        let second = rx.recv().await.unwrap();
        assert!(matches!(second, SseItem::Closed));
    }
}
