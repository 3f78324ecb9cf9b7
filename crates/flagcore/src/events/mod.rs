// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Analytics events (specification §4.4-§4.6 / C6-C8): context
//! filtering, evaluation summarization, the outbox, the delivery state
//! machine and request-worker pool, and the event processor that ties
//! them together.

pub mod context_filter;
pub mod outbox;
pub mod processor;
pub mod request_worker;
pub mod summarizer;

pub use context_filter::{ContextFilter, ContextFilterConfig};
pub use outbox::{CustomOutputEvent, DebugOutputEvent, FeatureOutputEvent, IdentifyOutputEvent, OutputEvent, Outbox};
pub use processor::{EventProcessor, EventProcessorConfig, FeatureInputEvent, InputEvent};
pub use request_worker::{
    classify_status, next_delivery_state, DeliveryEvent, DeliveryResponse, DeliveryState, EventDeliveryTransport,
    RequestWorkerPool,
};
pub use summarizer::{CounterEntry, FlagSummaryEntry, SummaryState, Summarizer};

#[cfg(feature = "reqwest-transport")]
pub use request_worker::ReqwestEventDeliveryTransport;
