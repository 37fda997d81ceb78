//! # Pipeline Telemetry
//!
//! Bounded, thread-safe event log instrumenting each pipeline stage.
//!
//! ## Overview
//!
//! Every stage emits events drawn from a fixed vocabulary ([`EventName`])
//! with a small flat payload. Events land in a [`TelemetryRing`] of fixed
//! capacity (256 by default); once full, the oldest event is evicted.
//!
//! Components never reach for the ring directly. They hold a
//! [`SharedSink`], which defaults to the process-wide ring but can be
//! swapped for a dedicated ring or a recording fake in tests.
//!
//! ## Usage
//!
//! ```rust
//! use agentpack_core::telemetry::{self, payload, EventName, TelemetryRing};
//! use serde_json::json;
//!
//! let ring = TelemetryRing::with_capacity(8);
//! ring.emit(EventName::StageStart, payload([("stage", json!("validate"))]));
//! assert_eq!(ring.snapshot().len(), 1);
//!
//! // The process-wide ring backs the default sink.
//! telemetry::emit(EventName::StageSuccess, payload([("stage", json!("apply"))]));
//! ```

mod events;
mod ring;

pub use events::{payload, EventName, EventPayload, Stage, TelemetryEvent};
pub use ring::{TelemetryRing, TelemetryStats, DEFAULT_CAPACITY};

use lazy_static::lazy_static;
use serde_json::json;
use std::fmt;
use std::sync::Arc;

/// Destination for telemetry events
pub trait TelemetrySink: Send + Sync + fmt::Debug {
    /// Record one event
    fn emit(&self, name: EventName, payload: EventPayload);
}

/// Shared handle to a sink, held by pipeline components
pub type SharedSink = Arc<dyn TelemetrySink>;

lazy_static! {
    static ref GLOBAL_RING: TelemetryRing = TelemetryRing::new();
}

/// The process-wide ring
pub fn global() -> &'static TelemetryRing {
    &GLOBAL_RING
}

/// Emit into the process-wide ring
pub fn emit(name: EventName, payload: EventPayload) {
    GLOBAL_RING.emit(name, payload);
}

/// Copy of the process-wide ring's events
pub fn snapshot() -> Vec<TelemetryEvent> {
    GLOBAL_RING.snapshot()
}

/// Clear the process-wide ring; intended for test isolation
pub fn reset() {
    GLOBAL_RING.reset();
}

/// Sink forwarding to the process-wide ring
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalSink;

impl TelemetrySink for GlobalSink {
    fn emit(&self, name: EventName, payload: EventPayload) {
        emit(name, payload);
    }
}

/// Sink that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn emit(&self, _name: EventName, _payload: EventPayload) {}
}

/// Default sink for components: the process-wide ring
pub fn global_sink() -> SharedSink {
    Arc::new(GlobalSink)
}

pub(crate) fn stage_start(sink: &dyn TelemetrySink, stage: Stage) {
    sink.emit(EventName::StageStart, payload([("stage", json!(stage.as_str()))]));
}

pub(crate) fn stage_success(sink: &dyn TelemetrySink, stage: Stage, mut extra: EventPayload) {
    extra.insert("stage".to_string(), json!(stage.as_str()));
    sink.emit(EventName::StageSuccess, extra);
}

pub(crate) fn stage_failure(sink: &dyn TelemetrySink, stage: Stage, error: &str) {
    sink.emit(
        EventName::StageFailure,
        payload([("stage", json!(stage.as_str())), ("error", json!(error))]),
    );
}
