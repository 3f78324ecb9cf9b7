// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Feature-flag SDK core: data synchronization, evaluation engine, and
//! event pipeline.
//!
//! A typical host builds a [`Config`] via [`ConfigBuilder`], passes it
//! to [`Client::builder`], and calls `.build()` to get a running
//! [`Client`]:
//!
//! ```no_run
//! use flagcore::{Client, ConfigBuilder, Context, Attributes};
//!
//! let config = ConfigBuilder::new("sdk-key").build().expect("valid config");
//! let client = Client::builder(config).build().expect("client to start");
//! let context = Context::single("user", Attributes::new("user-key"));
//! let show_banner = client.bool_variation("new-banner", &context, false);
//! ```
//!
//! The core crate never assumes `reqwest` -- every network seam
//! ([`data_source::SseClient`], [`data_source::HttpTransport`],
//! [`events::EventDeliveryTransport`]) is a trait a host can replace,
//! with `reqwest`-backed defaults behind the `reqwest-transport`
//! feature (on by default).

pub mod all_flags_state;
pub mod client;
pub mod config;
pub mod context;
pub mod data_model;
pub mod data_source;
pub mod error;
pub mod eval;
pub mod events;
pub mod hooks;
pub mod logging;
pub mod status;
pub mod store;
pub mod value;

pub use all_flags_state::{AllFlagsState, AllFlagsStateOptions, FlagMetadata};
pub use client::{Client, ClientBuilder};
pub use config::{Config, ConfigBuilder};
pub use context::{AttributeRef, Attributes, Context};
pub use error::{Error, ErrorKind, Result};
pub use eval::{Detail, EvalErrorKind, Reason};
pub use hooks::{EvaluationSeriesContext, EvaluationSeriesData, Hook};
pub use status::{Cancellation, ClientState, DataSourceStatus};
pub use value::Value;
