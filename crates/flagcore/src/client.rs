// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The public SDK facade (specification §5): wires a [`Config`] into a
//! running [`MemoryStore`], data source, event processor, and hook
//! chain, and exposes the typed evaluation and lifecycle API a host
//! application actually calls.
//!
//! Grounded on teacher's `crates/hdds/src/discovery_server/client.rs`
//! for the overall shape -- one object owning the store, the data
//! source, and the event processor, each of which can be swapped for a
//! test double via [`ClientBuilder`]'s injection points (specification
//! §1: this crate never hard-codes a network stack into the core
//! evaluation path).

use crate::all_flags_state::{self, AllFlagsState, AllFlagsStateOptions};
use crate::config::{Config, DataSourceConfig, HttpProperties};
use crate::context::{AttributeRef, Context};
use crate::data_model::Kind;
use crate::data_source::{
    BackoffPolicy, HttpTransport, LazyLoadDataSource, LazyLoadPersistentStore, PollingDataSource, SseClient,
    StreamingDataSource,
};
use crate::error::{Error, Result};
use crate::eval::{self, BigSegmentStore, Detail, EvalErrorKind, NoBigSegmentStore, PrerequisiteEvaluation};
use crate::events::{
    ContextFilterConfig, EventDeliveryTransport, EventProcessor, EventProcessorConfig, FeatureInputEvent, InputEvent,
};
use crate::hooks::{self, EvaluationSeriesContext, Hook};
use crate::status::{Cancellation, DataSourceStatus, State, StatusProvider};
use crate::store::MemoryStore;
use crate::value::Value;
use std::sync::Arc;
use std::time::SystemTime;

fn now_millis() -> i64 {
    crate::events::processor::millis_since_epoch(SystemTime::now())
}

fn request_headers(config: &Config) -> Vec<(String, String)> {
    let mut headers = config.http_properties.request_headers();
    headers.push(("Authorization".to_string(), config.sdk_key.clone()));
    if let Some(tag) = tags_header(config) {
        headers.push(("X-LaunchDarkly-Tags".to_string(), tag));
    }
    headers
}

/// `appInfo` takes priority over the server-profile-only `tags` block
/// when both happen to be set; in practice a given `Config` only uses
/// one or the other.
fn tags_header(config: &Config) -> Option<String> {
    if let Some(tag) = config.app_info.tag_value() {
        return Some(tag);
    }
    let mut parts = Vec::new();
    if let Some(id) = &config.tags.application_id {
        parts.push(format!("application-id/{id}"));
    }
    if let Some(version) = &config.tags.application_version {
        parts.push(format!("application-version/{version}"));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

#[cfg(feature = "reqwest-transport")]
fn build_reqwest_client(http: &HttpProperties) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(http.connect_timeout)
        .timeout(http.response_timeout)
        .build()
        .unwrap_or_default()
}

fn default_sse_client(_http: &HttpProperties) -> Result<Arc<dyn SseClient>> {
    #[cfg(feature = "reqwest-transport")]
    {
        Ok(Arc::new(crate::data_source::ReqwestSseClient::new(build_reqwest_client(_http))))
    }
    #[cfg(not(feature = "reqwest-transport"))]
    {
        Err(Error::ConfigInvalid(
            "no SseClient supplied and the reqwest-transport feature is disabled".to_string(),
        ))
    }
}

fn default_http_transport(_http: &HttpProperties) -> Result<Arc<dyn HttpTransport>> {
    #[cfg(feature = "reqwest-transport")]
    {
        Ok(Arc::new(crate::data_source::ReqwestHttpTransport::new(build_reqwest_client(_http))))
    }
    #[cfg(not(feature = "reqwest-transport"))]
    {
        Err(Error::ConfigInvalid(
            "no HttpTransport supplied and the reqwest-transport feature is disabled".to_string(),
        ))
    }
}

fn default_event_transport(_http: &HttpProperties) -> Result<Arc<dyn EventDeliveryTransport>> {
    #[cfg(feature = "reqwest-transport")]
    {
        Ok(Arc::new(crate::events::ReqwestEventDeliveryTransport::new(build_reqwest_client(_http))))
    }
    #[cfg(not(feature = "reqwest-transport"))]
    {
        Err(Error::ConfigInvalid(
            "no EventDeliveryTransport supplied and the reqwest-transport feature is disabled".to_string(),
        ))
    }
}

enum DataSourceHandle {
    Streaming(Arc<StreamingDataSource>, tokio::task::JoinHandle<()>),
    Polling(Arc<PollingDataSource>, tokio::task::JoinHandle<()>),
    LazyLoad(Arc<LazyLoadDataSource>),
    Offline,
}

/// Assembles a [`Client`] from a [`Config`] plus whatever collaborators
/// need to be swapped for testing or for a non-`reqwest` network stack.
/// Every injection point falls back to the `reqwest`-backed default
/// when the `reqwest-transport` feature is enabled and none was
/// supplied; building fails otherwise.
pub struct ClientBuilder {
    config: Config,
    hooks: Vec<Arc<dyn Hook>>,
    sse_client: Option<Arc<dyn SseClient>>,
    http_transport: Option<Arc<dyn HttpTransport>>,
    event_transport: Option<Arc<dyn EventDeliveryTransport>>,
    big_segment_store: Option<Arc<dyn BigSegmentStore>>,
    lazy_load_backend: Option<Arc<dyn LazyLoadPersistentStore>>,
}

impl ClientBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            hooks: Vec::new(),
            sse_client: None,
            http_transport: None,
            event_transport: None,
            big_segment_store: None,
            lazy_load_backend: None,
        }
    }

    pub fn hook(mut self, hook: Arc<dyn Hook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn sse_client(mut self, client: Arc<dyn SseClient>) -> Self {
        self.sse_client = Some(client);
        self
    }

    pub fn http_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.http_transport = Some(transport);
        self
    }

    pub fn event_transport(mut self, transport: Arc<dyn EventDeliveryTransport>) -> Self {
        self.event_transport = Some(transport);
        self
    }

    pub fn big_segment_store(mut self, store: Arc<dyn BigSegmentStore>) -> Self {
        self.big_segment_store = Some(store);
        self
    }

    /// Required to build a client whose [`DataSourceConfig`] is
    /// `LazyLoad` -- there is no default backend (specification §1).
    pub fn lazy_load_backend(mut self, backend: Arc<dyn LazyLoadPersistentStore>) -> Self {
        self.lazy_load_backend = Some(backend);
        self
    }

    /// Assemble and start the client. Spawns the data source's
    /// background task (streaming/polling) and the event processor's
    /// task immediately; an offline client spawns neither.
    pub fn build(self) -> Result<Client> {
        let store = Arc::new(MemoryStore::new());
        let status = StatusProvider::new();
        let big_segments: Arc<dyn BigSegmentStore> =
            self.big_segment_store.unwrap_or_else(|| Arc::new(NoBigSegmentStore));

        if self.config.offline {
            status.set_state(State::Off, None);
            return Ok(Client {
                config: self.config,
                store,
                status,
                data_source: DataSourceHandle::Offline,
                events: None,
                hooks: self.hooks,
                big_segments,
            });
        }

        let headers = request_headers(&self.config);

        let events = if self.config.events.enabled {
            let transport = match self.event_transport {
                Some(t) => t,
                None => default_event_transport(&self.config.http_properties)?,
            };
            let global_private_attributes = self
                .config
                .events
                .private_attributes
                .iter()
                .map(|s| AttributeRef::parse(s.clone()))
                .collect();
            Some(EventProcessor::new(
                EventProcessorConfig {
                    capacity: self.config.events.capacity,
                    flush_interval: self.config.events.flush_interval,
                    flush_workers: self.config.events.flush_workers,
                    delivery_retry_delay: self.config.events.delivery_retry_delay,
                    context_filter: ContextFilterConfig {
                        all_attributes_private: self.config.events.all_attributes_private,
                        global_private_attributes,
                    },
                    events_url: format!("{}/bulk", self.config.service_endpoints.events_base_url),
                    sdk_key: self.config.sdk_key.clone(),
                },
                transport,
            ))
        } else {
            None
        };

        let data_source = match &self.config.data_source {
            DataSourceConfig::Streaming { initial_reconnect_delay } => {
                let client = match self.sse_client {
                    Some(c) => c,
                    None => default_sse_client(&self.config.http_properties)?,
                };
                let backoff = BackoffPolicy {
                    initial_delay: *initial_reconnect_delay,
                    ..BackoffPolicy::default()
                };
                let url = format!("{}/all", self.config.service_endpoints.streaming_base_url);
                let source = Arc::new(StreamingDataSource::new(store.clone(), status.clone(), client, url, headers, backoff));
                let handle = source.start();
                DataSourceHandle::Streaming(source, handle)
            }
            DataSourceConfig::Polling { poll_interval } => {
                let transport = match self.http_transport {
                    Some(t) => t,
                    None => default_http_transport(&self.config.http_properties)?,
                };
                let url = format!("{}/sdk/latest-all", self.config.service_endpoints.polling_base_url);
                let source = Arc::new(PollingDataSource::new(
                    store.clone(),
                    status.clone(),
                    transport,
                    url,
                    headers,
                    *poll_interval,
                ));
                let handle = source.start();
                DataSourceHandle::Polling(source, handle)
            }
            DataSourceConfig::LazyLoad { ttl, eviction } => {
                let backend = self
                    .lazy_load_backend
                    .ok_or_else(|| Error::ConfigInvalid("lazy-load data source requires a lazy_load_backend".to_string()))?;
                let source = Arc::new(LazyLoadDataSource::new(backend, store.clone(), status.clone(), *ttl, *eviction));
                DataSourceHandle::LazyLoad(source)
            }
        };

        Ok(Client {
            config: self.config,
            store,
            status,
            data_source,
            events,
            hooks: self.hooks,
            big_segments,
        })
    }
}

/// Per-evaluation bookkeeping pulled off the flag before it goes out of
/// scope, needed by the event that describes the evaluation.
struct FlagMeta {
    version: Option<u64>,
    track_events: bool,
    track_events_fallthrough: bool,
    debug_events_until_date: Option<i64>,
}

impl FlagMeta {
    fn unknown() -> Self {
        Self {
            version: None,
            track_events: false,
            track_events_fallthrough: false,
            debug_events_until_date: None,
        }
    }
}

/// A running SDK client. Cheap to share: every method takes `&self`
/// (the data store, status, and event processor are all internally
/// synchronized), so a host application typically keeps one [`Client`]
/// behind an [`std::sync::Arc`] for the life of the process.
pub struct Client {
    config: Config,
    store: Arc<MemoryStore>,
    status: StatusProvider,
    data_source: DataSourceHandle,
    events: Option<Arc<EventProcessor>>,
    hooks: Vec<Arc<dyn Hook>>,
    big_segments: Arc<dyn BigSegmentStore>,
}

impl Client {
    pub fn builder(config: Config) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// `true` once the store holds at least one full data set (or the
    /// client is offline, which has nothing to wait for).
    pub fn is_initialized(&self) -> bool {
        self.store.initialized() || matches!(self.data_source, DataSourceHandle::Offline)
    }

    pub fn data_source_status(&self) -> DataSourceStatus {
        self.status.status()
    }

    pub fn on_data_source_status_change<F>(&self, handler: F) -> Cancellation
    where
        F: Fn(&DataSourceStatus) + Send + Sync + 'static,
    {
        self.status.on_change(handler)
    }

    /// Evaluate every flag in the store for `context` (specification
    /// §C.2). For a lazy-load client this first loads the whole flag
    /// set from the backend, since a cache populated key-by-key can't
    /// otherwise enumerate what it hasn't already seen.
    pub fn all_flags_state(&self, context: &Context, options: AllFlagsStateOptions) -> AllFlagsState {
        if let DataSourceHandle::LazyLoad(lazy) = &self.data_source {
            let _ = lazy.load_all(Kind::Flag);
        }
        all_flags_state::all_flags_state(&self.store, context, &options)
    }

    pub fn bool_variation(&self, flag_key: &str, context: &Context, default: bool) -> bool {
        self.bool_variation_detail(flag_key, context, default)
            .value
            .as_bool()
            .unwrap_or(default)
    }

    pub fn bool_variation_detail(&self, flag_key: &str, context: &Context, default: bool) -> Detail {
        self.typed_variation(flag_key, context, Value::from(default), "boolVariation", Value::is_bool)
    }

    pub fn int_variation(&self, flag_key: &str, context: &Context, default: i64) -> i64 {
        self.int_variation_detail(flag_key, context, default)
            .value
            .as_i64()
            .unwrap_or(default)
    }

    pub fn int_variation_detail(&self, flag_key: &str, context: &Context, default: i64) -> Detail {
        self.typed_variation(flag_key, context, Value::from(default), "intVariation", Value::is_number)
    }

    pub fn float_variation(&self, flag_key: &str, context: &Context, default: f64) -> f64 {
        self.float_variation_detail(flag_key, context, default)
            .value
            .as_f64()
            .unwrap_or(default)
    }

    pub fn float_variation_detail(&self, flag_key: &str, context: &Context, default: f64) -> Detail {
        self.typed_variation(flag_key, context, Value::from(default), "floatVariation", Value::is_number)
    }

    pub fn string_variation(&self, flag_key: &str, context: &Context, default: impl Into<String>) -> String {
        let default = default.into();
        let detail = self.typed_variation(
            flag_key,
            context,
            Value::from(default.clone()),
            "stringVariation",
            Value::is_string,
        );
        detail.value.as_str().map(str::to_string).unwrap_or(default)
    }

    pub fn string_variation_detail(&self, flag_key: &str, context: &Context, default: impl Into<String>) -> Detail {
        self.typed_variation(flag_key, context, Value::from(default.into()), "stringVariation", Value::is_string)
    }

    /// Unlike the scalar accessors, any value type is acceptable -- the
    /// caller is asking for whatever the flag returns as-is.
    pub fn json_variation(&self, flag_key: &str, context: &Context, default: Value) -> Value {
        self.json_variation_detail(flag_key, context, default).value
    }

    pub fn json_variation_detail(&self, flag_key: &str, context: &Context, default: Value) -> Detail {
        self.eval_detail(flag_key, context, default, "jsonVariation")
    }

    pub fn track(&self, context: &Context, key: impl Into<String>, data: Option<Value>, metric_value: Option<f64>) {
        if let Some(events) = &self.events {
            events.send(InputEvent::Custom {
                key: key.into(),
                context: context.clone(),
                data,
                metric_value,
                creation_date: now_millis(),
            });
        }
    }

    pub fn identify(&self, context: &Context) {
        if let Some(events) = &self.events {
            events.send(InputEvent::Identify {
                context: context.clone(),
                creation_date: now_millis(),
            });
        }
    }

    pub fn flush(&self) {
        if let Some(events) = &self.events {
            events.flush();
        }
    }

    /// Stop the data source and drain the event processor (specification
    /// §5). Terminal: consumes the client, since nothing it owns is
    /// usable afterward.
    pub async fn close(self) {
        match self.data_source {
            DataSourceHandle::Streaming(source, handle) => {
                source.shutdown();
                let _ = handle.await;
            }
            DataSourceHandle::Polling(source, handle) => {
                source.shutdown();
                let _ = handle.await;
            }
            DataSourceHandle::LazyLoad(_) | DataSourceHandle::Offline => {}
        }
        if let Some(events) = self.events {
            events.close().await;
        }
    }

    fn typed_variation(
        &self,
        flag_key: &str,
        context: &Context,
        default: Value,
        method: &str,
        type_check: fn(&Value) -> bool,
    ) -> Detail {
        let detail = self.eval_detail(flag_key, context, default.clone(), method);
        if type_check(&detail.value) {
            detail
        } else {
            Detail::error(default, EvalErrorKind::WrongType)
        }
    }

    /// The shared core of every `*Variation` call: runs the evaluator,
    /// threads the result through the hook chain, and emits the
    /// feature (and any prerequisite) events.
    fn eval_detail(&self, flag_key: &str, context: &Context, default: Value, method: &str) -> Detail {
        let series = EvaluationSeriesContext::new(flag_key, context.clone(), default.clone(), method);
        let before_data = hooks::run_before(&self.hooks, &series);

        let (detail, meta, prereq_events) = self.evaluate_internal(flag_key, context, &default);

        let prereq_meta = FlagMeta::unknown();
        for prereq in &prereq_events {
            self.send_feature_event(&prereq.flag_key, context, &prereq.detail, &Value::Null, &prereq_meta, true);
        }
        self.send_feature_event(flag_key, context, &detail, &default, &meta, false);

        hooks::run_after(&self.hooks, &series, before_data, &detail);
        detail
    }

    /// Resolve `flag_key` against the store and evaluate it. Any
    /// failure path (invalid context, unknown flag, off with no
    /// `offVariation`) yields a [`Detail`] whose value is already
    /// `default` -- the evaluator itself has no way to know the
    /// caller's default (specification §7).
    fn evaluate_internal(&self, flag_key: &str, context: &Context, default: &Value) -> (Detail, FlagMeta, Vec<PrerequisiteEvaluation>) {
        if let DataSourceHandle::LazyLoad(lazy) = &self.data_source {
            let _ = lazy.get(Kind::Flag, flag_key);
        }

        if !context.is_valid() {
            return (Detail::error(default.clone(), EvalErrorKind::UserNotSpecified), FlagMeta::unknown(), Vec::new());
        }

        let descriptor = match self.store.get(Kind::Flag, flag_key) {
            Some(d) if !d.is_tombstone() => d,
            _ => return (Detail::error(default.clone(), EvalErrorKind::FlagNotFound), FlagMeta::unknown(), Vec::new()),
        };
        let Some(flag) = descriptor.as_flag() else {
            return (Detail::error(default.clone(), EvalErrorKind::FlagNotFound), FlagMeta::unknown(), Vec::new());
        };

        let mut prereq_events = Vec::new();
        let mut detail = eval::evaluate_with_big_segments(flag, context, &self.store, self.big_segments.as_ref(), &mut prereq_events);
        if detail.variation_index.is_none() {
            detail.value = default.clone();
        }

        let meta = FlagMeta {
            version: Some(flag.version),
            track_events: flag.track_events,
            track_events_fallthrough: flag.track_events_fallthrough,
            debug_events_until_date: flag.debug_events_until_date,
        };
        (detail, meta, prereq_events)
    }

    fn send_feature_event(&self, flag_key: &str, context: &Context, detail: &Detail, default: &Value, meta: &FlagMeta, require_full_event: bool) {
        let Some(events) = &self.events else { return };
        events.send(InputEvent::Feature(FeatureInputEvent {
            creation_date: now_millis(),
            context: context.clone(),
            flag_key: flag_key.to_string(),
            flag_version: meta.version,
            variation: detail.variation_index,
            value: detail.value.clone(),
            default: default.clone(),
            reason: Some(detail.reason.clone()),
            track_events: meta.track_events,
            track_events_fallthrough: meta.track_events_fallthrough,
            debug_events_until_date: meta.debug_events_until_date,
            require_full_event,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Attributes;
    use crate::data_model::{ClientSideAvailability, Descriptor, Flag, VariationOrRollout};
    use crate::data_source::sse::test_support::ScriptedSseClient;
    use crate::data_source::sse::{SseEvent, SseItem};
    use crate::eval::Reason;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Mutex;

    fn offline_client() -> Client {
        let config = crate::config::ConfigBuilder::new("").offline(true).build().unwrap();
        ClientBuilder::new(config).build().unwrap()
    }

    fn ctx() -> Context {
        Context::single("user", Attributes::new("u1"))
    }

    #[test]
    fn offline_client_reports_initialized_immediately() {
        let client = offline_client();
        assert!(client.is_initialized());
    }

    #[test]
    fn missing_flag_falls_back_to_the_callers_default() {
        let client = offline_client();
        let detail = client.bool_variation_detail("does-not-exist", &ctx(), true);
        assert_eq!(detail.value, Value::from(true));
        assert_eq!(
            detail.reason,
            Reason::Error {
                error_kind: EvalErrorKind::FlagNotFound
            }
        );
    }

    #[test]
    fn invalid_context_falls_back_to_the_callers_default() {
        let client = offline_client();
        let invalid = Context::single("user", Attributes::new(""));
        let detail = client.bool_variation_detail("flag", &invalid, true);
        assert_eq!(detail.value, Value::from(true));
    }

    #[test]
    fn wrong_type_substitutes_default_and_reports_wrong_type() {
        let client = offline_client();
        client.store.upsert(
            Kind::Flag,
            "flag",
            Descriptor::flag(Flag {
                key: "flag".to_string(),
                version: 1,
                on: true,
                variations: vec![Value::from("not-a-bool")],
                off_variation: Some(0),
                fallthrough: VariationOrRollout::Variation { variation: 0 },
                prerequisites: vec![],
                targets: vec![],
                context_targets: vec![],
                rules: vec![],
                salt: "s".to_string(),
                track_events: false,
                track_events_fallthrough: false,
                debug_events_until_date: None,
                client_side_availability: ClientSideAvailability::default(),
            }),
        );
        let detail = client.bool_variation_detail("flag", &ctx(), false);
        assert_eq!(detail.value, Value::from(false));
        assert_eq!(
            detail.reason,
            Reason::Error {
                error_kind: EvalErrorKind::WrongType
            }
        );
    }

    struct CountingHook {
        before: AtomicUsize,
        after: AtomicUsize,
    }

    impl Hook for CountingHook {
        fn name(&self) -> &str {
            "counting"
        }

        fn before_evaluation(&self, _series: &EvaluationSeriesContext, data: hooks::EvaluationSeriesData) -> hooks::EvaluationSeriesData {
            self.before.fetch_add(1, Ordering::SeqCst);
            data
        }

        fn after_evaluation(
            &self,
            _series: &EvaluationSeriesContext,
            data: hooks::EvaluationSeriesData,
            _detail: &Detail,
        ) -> hooks::EvaluationSeriesData {
            self.after.fetch_add(1, Ordering::SeqCst);
            data
        }
    }

    #[test]
    fn hooks_are_invoked_around_every_evaluation() {
        let config = crate::config::ConfigBuilder::new("").offline(true).build().unwrap();
        let hook = Arc::new(CountingHook {
            before: AtomicUsize::new(0),
            after: AtomicUsize::new(0),
        });
        let client = ClientBuilder::new(config).hook(hook.clone()).build().unwrap();
        client.bool_variation("flag", &ctx(), false);
        assert_eq!(hook.before.load(Ordering::SeqCst), 1);
        assert_eq!(hook.after.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn streaming_client_evaluates_once_data_arrives() {
        let config = crate::config::ConfigBuilder::new("sdk-key").build().unwrap();
        let sse: Arc<dyn SseClient> = Arc::new(ScriptedSseClient {
            script: Arc::new(Mutex::new(vec![
                SseItem::Event(SseEvent {
                    event: "put".to_string(),
                    data: r#"{"path":"/","data":{"flags":{"f":{"key":"f","version":1,"on":true,"variations":[true,false],"offVariation":1,"fallthrough":{"variation":0}}},"segments":{}}}"#.to_string(),
                }),
                SseItem::Closed,
            ])),
        });
        let client = ClientBuilder::new(config)
            .sse_client(sse)
            .event_transport(Arc::new(NoopTransport))
            .build()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(client.bool_variation("f", &ctx(), false));
        client.close().await;
    }

    struct NoopTransport;

    #[async_trait::async_trait]
    impl EventDeliveryTransport for NoopTransport {
        async fn post(&self, _url: &str, _headers: &[(String, String)], _body: Vec<u8>) -> crate::events::DeliveryResponse {
            crate::events::DeliveryResponse {
                status: Some(202),
                server_date: None,
            }
        }
    }
}
