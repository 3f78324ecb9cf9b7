// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The configuration surface (specification §6.4).
//!
//! `Config` is a plain settings bag assembled by [`ConfigBuilder`];
//! nothing here opens a socket or spawns a task -- [`crate::client`]
//! is what turns a built `Config` into running components. Modeled on
//! the corpus's `*_builder.hpp`/`.cpp` fluent-builder idiom (e.g.
//! `ConfigBuilder`, `DataSourceBuilder`, `EventsBuilder` in
//! `original_source/libs/common/include/launchdarkly/config/shared/builders/`)
//! plus the teacher's `RuntimeConfig` (`crates/hdds/src/config.rs`) for
//! the "one struct per concern, consuming builder, `build()` validates"
//! shape.

pub mod http_properties;
pub mod service_endpoints;

pub use http_properties::{HttpProperties, HttpPropertiesBuilder};
pub use service_endpoints::{ServiceEndpoints, ServiceEndpointsBuilder};

use crate::data_source::{CacheTtl, EvictionPolicy};
use crate::error::{Error, Result};
use std::time::Duration;

/// Which replication mode the data source runs in (specification
/// §4.2, plus the lazy-load supplement in SPEC_FULL.md §C.3). Carries
/// only the tunables for each mode -- the concrete transport/backend
/// is supplied separately when a [`crate::client::Client`] is built,
/// since those are trait objects rather than plain data.
#[derive(Debug, Clone)]
pub enum DataSourceConfig {
    Streaming { initial_reconnect_delay: Duration },
    Polling { poll_interval: Duration },
    LazyLoad { ttl: CacheTtl, eviction: EvictionPolicy },
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        DataSourceConfig::Streaming {
            initial_reconnect_delay: Duration::from_secs(1),
        }
    }
}

/// Consuming builder for [`DataSourceConfig`], mirroring
/// `DataSourceBuilder`'s `Streaming()`/`Polling()`/`LazyLoad()`
/// sub-builders.
#[derive(Debug, Clone, Default)]
pub struct DataSourceBuilder {
    config: DataSourceConfig,
}

impl DataSourceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn streaming(mut self, initial_reconnect_delay: Duration) -> Self {
        self.config = DataSourceConfig::Streaming {
            initial_reconnect_delay,
        };
        self
    }

    pub fn polling(mut self, poll_interval: Duration) -> Self {
        self.config = DataSourceConfig::Polling { poll_interval };
        self
    }

    pub fn lazy_load(mut self, ttl: CacheTtl, eviction: EvictionPolicy) -> Self {
        self.config = DataSourceConfig::LazyLoad { ttl, eviction };
        self
    }

    pub fn build(self) -> DataSourceConfig {
        self.config
    }
}

/// Event-pipeline tunables (specification §6.4 `events.*`).
#[derive(Debug, Clone)]
pub struct EventsConfig {
    pub capacity: usize,
    pub flush_interval: Duration,
    pub all_attributes_private: bool,
    pub private_attributes: Vec<String>,
    pub flush_workers: usize,
    pub delivery_retry_delay: Duration,
    pub enabled: bool,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            flush_interval: Duration::from_secs(5),
            all_attributes_private: false,
            private_attributes: Vec::new(),
            flush_workers: 5,
            delivery_retry_delay: Duration::from_secs(1),
            enabled: true,
        }
    }
}

/// Consuming builder for [`EventsConfig`].
#[derive(Debug, Clone, Default)]
pub struct EventsBuilder {
    config: EventsConfig,
}

impl EventsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.flush_interval = interval;
        self
    }

    pub fn all_attributes_private(mut self, value: bool) -> Self {
        self.config.all_attributes_private = value;
        self
    }

    pub fn private_attribute(mut self, reference: impl Into<String>) -> Self {
        self.config.private_attributes.push(reference.into());
        self
    }

    pub fn flush_workers(mut self, workers: usize) -> Self {
        self.config.flush_workers = workers;
        self
    }

    pub fn delivery_retry_delay(mut self, delay: Duration) -> Self {
        self.config.delivery_retry_delay = delay;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    pub fn build(self) -> EventsConfig {
        self.config
    }
}

/// `appInfo.{identifier, version}` -- identifies the application
/// embedding the SDK, distinct from `wrapperName`/`wrapperVersion` in
/// [`HttpProperties`] which identifies a language-binding wrapper.
#[derive(Debug, Clone, Default)]
pub struct ApplicationInfo {
    pub identifier: Option<String>,
    pub version: Option<String>,
}

impl ApplicationInfo {
    /// The `X-LaunchDarkly-Tags` header fragment this info contributes,
    /// or `None` if nothing was set.
    pub fn tag_value(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(id) = &self.identifier {
            parts.push(format!("application-id/{id}"));
        }
        if let Some(version) = &self.version {
            parts.push(format!("application-version/{version}"));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ApplicationInfoBuilder {
    info: ApplicationInfo,
}

impl ApplicationInfoBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identifier(mut self, id: impl Into<String>) -> Self {
        self.info.identifier = Some(id.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.info.version = Some(version.into());
        self
    }

    pub fn build(self) -> ApplicationInfo {
        self.info
    }
}

/// `clientSide.{evaluationReasons, useReport}` -- only meaningful for
/// the client profile (specification §6.4); a server-profile
/// [`Config`] leaves this at its default.
#[derive(Debug, Clone, Default)]
pub struct ClientSideConfig {
    pub evaluation_reasons: bool,
    pub use_report: bool,
}

/// `tags.{applicationId, applicationVersion}` -- server-profile-only
/// counterpart of [`ApplicationInfo`], sent as its own header rather
/// than folded into the wrapper tag.
#[derive(Debug, Clone, Default)]
pub struct Tags {
    pub application_id: Option<String>,
    pub application_version: Option<String>,
}

/// Fully resolved SDK configuration. Constructed only via
/// [`ConfigBuilder::build`], which is where configuration errors
/// surface (specification §7: "Configuration errors are surfaced at
/// build time and prevent the SDK from constructing").
#[derive(Debug, Clone)]
pub struct Config {
    pub sdk_key: String,
    pub service_endpoints: ServiceEndpoints,
    pub data_source: DataSourceConfig,
    pub events: EventsConfig,
    pub http_properties: HttpProperties,
    pub app_info: ApplicationInfo,
    pub client_side: ClientSideConfig,
    pub tags: Tags,
    pub offline: bool,
}

/// Consuming builder for [`Config`], mirroring the corpus's top-level
/// `ConfigBuilder`.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    sdk_key: String,
    service_endpoints: ServiceEndpointsBuilder,
    data_source: DataSourceBuilder,
    events: EventsBuilder,
    http_properties: HttpPropertiesBuilder,
    app_info: ApplicationInfoBuilder,
    client_side: ClientSideConfig,
    tags: Tags,
    offline: bool,
}

impl ConfigBuilder {
    pub fn new(sdk_key: impl Into<String>) -> Self {
        Self {
            sdk_key: sdk_key.into(),
            ..Default::default()
        }
    }

    pub fn service_endpoints(mut self, endpoints: ServiceEndpointsBuilder) -> Self {
        self.service_endpoints = endpoints;
        self
    }

    pub fn data_source(mut self, data_source: DataSourceBuilder) -> Self {
        self.data_source = data_source;
        self
    }

    pub fn events(mut self, events: EventsBuilder) -> Self {
        self.events = events;
        self
    }

    pub fn http_properties(mut self, http_properties: HttpPropertiesBuilder) -> Self {
        self.http_properties = http_properties;
        self
    }

    pub fn app_info(mut self, app_info: ApplicationInfoBuilder) -> Self {
        self.app_info = app_info;
        self
    }

    pub fn client_side(mut self, evaluation_reasons: bool, use_report: bool) -> Self {
        self.client_side = ClientSideConfig {
            evaluation_reasons,
            use_report,
        };
        self
    }

    pub fn tags(mut self, application_id: impl Into<String>, application_version: impl Into<String>) -> Self {
        self.tags = Tags {
            application_id: Some(application_id.into()),
            application_version: Some(application_version.into()),
        };
        self
    }

    /// Disables network calls and events entirely -- evaluations fall
    /// back to the caller's default value and the data store never
    /// leaves the "uninitialized" state unless pre-seeded.
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Validate and assemble the final [`Config`]. A missing SDK key
    /// while online is a configuration error (specification §7); an
    /// offline client doesn't need one.
    pub fn build(self) -> Result<Config> {
        if self.sdk_key.is_empty() && !self.offline {
            return Err(Error::ConfigInvalid("sdkKey must not be empty".to_string()));
        }
        Ok(Config {
            sdk_key: self.sdk_key,
            service_endpoints: self.service_endpoints.build(),
            data_source: self.data_source.build(),
            events: self.events.build(),
            http_properties: self.http_properties.build(),
            app_info: self.app_info.build(),
            client_side: self.client_side,
            tags: self.tags,
            offline: self.offline,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sdk_key_is_invalid_unless_offline() {
        assert!(ConfigBuilder::new("").build().is_err());
        assert!(ConfigBuilder::new("").offline(true).build().is_ok());
    }

    #[test]
    fn defaults_pick_streaming_with_one_second_initial_delay() {
        let config = ConfigBuilder::new("sdk-key").build().unwrap();
        match config.data_source {
            DataSourceConfig::Streaming { initial_reconnect_delay } => {
                assert_eq!(initial_reconnect_delay, Duration::from_secs(1));
            }
            other => panic!("expected Streaming, got {other:?}"),
        }
    }

    #[test]
    fn application_info_tag_value_combines_identifier_and_version() {
        let info = ApplicationInfoBuilder::new()
            .identifier("my-app")
            .version("2.1.0")
            .build();
        assert_eq!(info.tag_value().as_deref(), Some("application-id/my-app application-version/2.1.0"));
    }

    #[test]
    fn application_info_with_nothing_set_has_no_tag_value() {
        assert_eq!(ApplicationInfo::default().tag_value(), None);
    }

    #[test]
    fn events_builder_collects_private_attributes() {
        let events = EventsBuilder::new()
            .private_attribute("email")
            .private_attribute("/address/street")
            .build();
        assert_eq!(events.private_attributes, vec!["email", "/address/street"]);
    }
}
