//! Observability: runtime telemetry (metrics) and sink abstractions.
//!
//! Structured logs go through `tracing`; counters go through the sink.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{EventOps, EventReport, EventState, KindCounters};
pub use sink::{MetricsEvent, MetricsSink, metrics_report, metrics_reset_all};
