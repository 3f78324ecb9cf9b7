// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Base URIs for the three services a client talks to: streaming,
//! polling, and events. Kept as plain strings -- this crate does not
//! parse or validate URLs (§1); that's the concrete transport's job.

/// Resolved service endpoints. Constructed only via
/// [`ServiceEndpointsBuilder::build`].
#[derive(Debug, Clone)]
pub struct ServiceEndpoints {
    pub streaming_base_url: String,
    pub polling_base_url: String,
    pub events_base_url: String,
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        Self {
            streaming_base_url: "https://stream.launchdarkly.com".to_string(),
            polling_base_url: "https://sdk.launchdarkly.com".to_string(),
            events_base_url: "https://events.launchdarkly.com".to_string(),
        }
    }
}

/// Consuming builder for [`ServiceEndpoints`]. `relay_proxy` is a
/// convenience that points all three at the same base, the way a
/// Relay Proxy deployment collapses them.
#[derive(Debug, Clone, Default)]
pub struct ServiceEndpointsBuilder {
    endpoints: ServiceEndpoints,
}

impl ServiceEndpointsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn streaming_base_url(mut self, url: impl Into<String>) -> Self {
        self.endpoints.streaming_base_url = url.into();
        self
    }

    pub fn polling_base_url(mut self, url: impl Into<String>) -> Self {
        self.endpoints.polling_base_url = url.into();
        self
    }

    pub fn events_base_url(mut self, url: impl Into<String>) -> Self {
        self.endpoints.events_base_url = url.into();
        self
    }

    pub fn relay_proxy(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.endpoints.streaming_base_url = url.clone();
        self.endpoints.polling_base_url = url.clone();
        self.endpoints.events_base_url = url;
        self
    }

    pub fn build(self) -> ServiceEndpoints {
        self.endpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_launchdarkly_saas() {
        let endpoints = ServiceEndpointsBuilder::new().build();
        assert_eq!(endpoints.streaming_base_url, "https://stream.launchdarkly.com");
        assert_eq!(endpoints.events_base_url, "https://events.launchdarkly.com");
    }

    #[test]
    fn relay_proxy_collapses_all_three() {
        let endpoints = ServiceEndpointsBuilder::new()
            .relay_proxy("https://relay.internal")
            .build();
        assert_eq!(endpoints.streaming_base_url, "https://relay.internal");
        assert_eq!(endpoints.polling_base_url, "https://relay.internal");
        assert_eq!(endpoints.events_base_url, "https://relay.internal");
    }
}
