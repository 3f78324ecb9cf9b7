// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The HTTP transport seam for polling mode (specification §4.2): a
//! single `GET` whose 200 body is interpreted as a `put` payload, and
//! whose 304 means "unchanged". Kept separate from [`super::sse`]
//! because polling has no persistent connection to own.

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// 200, with the response body and an `ETag` to echo back via
    /// `If-None-Match` on the next poll, if one was present.
    Ok { body: String, etag: Option<String> },
    /// 304 Not Modified.
    NotModified,
    /// 401, 403, 410, or any response documented as permanent.
    Unrecoverable(u16),
    /// Any other transport or HTTP failure; retryable.
    Transport(String),
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, headers: &[(String, String)], etag: Option<&str>) -> PollOutcome;
}

#[cfg(feature = "reqwest-transport")]
pub use reqwest_impl::ReqwestHttpTransport;

#[cfg(feature = "reqwest-transport")]
mod reqwest_impl {
    use super::{HttpTransport, PollOutcome};
    use async_trait::async_trait;

    #[derive(Debug, Clone, Default)]
    pub struct ReqwestHttpTransport {
        client: reqwest::Client,
    }

    impl ReqwestHttpTransport {
        pub fn new(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl HttpTransport for ReqwestHttpTransport {
        async fn get(&self, url: &str, headers: &[(String, String)], etag: Option<&str>) -> PollOutcome {
            let mut builder = self.client.get(url);
            for (name, value) in headers {
                builder = builder.header(name, value);
            }
            if let Some(etag) = etag {
                builder = builder.header("If-None-Match", etag);
            }
            let response = match builder.send().await {
                Ok(r) => r,
                Err(e) => return PollOutcome::Transport(e.to_string()),
            };
            let status = response.status();
            if status.as_u16() == 304 {
                return PollOutcome::NotModified;
            }
            if matches!(status.as_u16(), 401 | 403 | 410) {
                return PollOutcome::Unrecoverable(status.as_u16());
            }
            if !status.is_success() {
                return PollOutcome::Transport(format!("unexpected status {}", status.as_u16()));
            }
            let etag = response
                .headers()
                .get(reqwest::header::ETAG)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            match response.text().await {
                Ok(body) => PollOutcome::Ok { body, etag },
                Err(e) => PollOutcome::Transport(e.to_string()),
            }
        }
    }
}
