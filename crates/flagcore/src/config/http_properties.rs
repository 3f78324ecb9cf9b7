// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTTP transport properties shared by every data source and the event
//! processor, grounded on `http_properties_builder.hpp`'s
//! `HttpPropertiesBuilder`: timeouts, a wrapper identifier pair for the
//! `X-LaunchDarkly-Wrapper` header, and arbitrary extra headers.
//!
//! This crate doesn't speak HTTP itself (§1) -- `HttpProperties` is a
//! plain settings bag that a concrete `HttpTransport`/`SseClient`
//! implementation (e.g. `ReqwestHttpTransport`) consults when it builds
//! requests.

use std::time::Duration;

/// Resolved HTTP settings. Constructed only via [`HttpPropertiesBuilder::build`].
#[derive(Debug, Clone)]
pub struct HttpProperties {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub response_timeout: Duration,
    pub wrapper_name: Option<String>,
    pub wrapper_version: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl Default for HttpProperties {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            response_timeout: Duration::from_secs(10),
            wrapper_name: None,
            wrapper_version: None,
            headers: Vec::new(),
        }
    }
}

impl HttpProperties {
    /// Headers a transport should send on every request: custom headers
    /// plus a derived `X-LaunchDarkly-Wrapper` if a wrapper was set.
    pub fn request_headers(&self) -> Vec<(String, String)> {
        let mut headers = self.headers.clone();
        if let Some(name) = &self.wrapper_name {
            let value = match &self.wrapper_version {
                Some(version) => format!("{name}/{version}"),
                None => name.clone(),
            };
            headers.push(("X-LaunchDarkly-Wrapper".to_string(), value));
        }
        headers
    }
}

/// Consuming builder for [`HttpProperties`], mirroring
/// `HttpPropertiesBuilder`'s fluent `ConnectTimeout`/`ReadTimeout`/
/// `WriteTimeout`/`ResponseTimeout`/`WrapperName`/`WrapperVersion`/
/// `Header` methods.
#[derive(Debug, Clone)]
pub struct HttpPropertiesBuilder {
    properties: HttpProperties,
}

impl Default for HttpPropertiesBuilder {
    fn default() -> Self {
        Self {
            properties: HttpProperties::default(),
        }
    }
}

impl HttpPropertiesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.properties.connect_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.properties.read_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.properties.write_timeout = timeout;
        self
    }

    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.properties.response_timeout = timeout;
        self
    }

    pub fn wrapper_name(mut self, name: impl Into<String>) -> Self {
        self.properties.wrapper_name = Some(name.into());
        self
    }

    pub fn wrapper_version(mut self, version: impl Into<String>) -> Self {
        self.properties.wrapper_version = Some(version.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.headers.push((key.into(), value.into()));
        self
    }

    pub fn build(self) -> HttpProperties {
        self.properties
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapper_header_combines_name_and_version() {
        let props = HttpPropertiesBuilder::new()
            .wrapper_name("flagcore-test")
            .wrapper_version("1.0.0")
            .build();
        let headers = props.request_headers();
        assert!(headers.contains(&(
            "X-LaunchDarkly-Wrapper".to_string(),
            "flagcore-test/1.0.0".to_string()
        )));
    }

    #[test]
    fn wrapper_without_version_omits_slash() {
        let props = HttpPropertiesBuilder::new().wrapper_name("bare").build();
        assert_eq!(
            props.request_headers(),
            vec![("X-LaunchDarkly-Wrapper".to_string(), "bare".to_string())]
        );
    }

    #[test]
    fn custom_headers_are_preserved_alongside_wrapper() {
        let props = HttpPropertiesBuilder::new()
            .header("X-Custom", "yes")
            .build();
        assert_eq!(
            props.request_headers(),
            vec![("X-Custom".to_string(), "yes".to_string())]
        );
    }
}
