//! Metrics sink boundary.
//!
//! Delete logic MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.
//!
//! This module is the only allowed bridge between execution logic
//! and the thread-local metrics state.
use crate::{
    model::EntityKind,
    obs::metrics::{self, with_kind_mut},
};
use std::cell::Cell;

thread_local! {
    static SINK_OVERRIDE: Cell<Option<&'static dyn MetricsSink>> = const { Cell::new(None) };
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug)]
pub enum MetricsEvent {
    RequestStart {
        kind: EntityKind,
        roots: u64,
    },
    RequestFinish {
        kind: EntityKind,
        kept: u64,
    },
    PlanResolved {
        kind: EntityKind,
        nodes: u64,
        lookups: u64,
    },
    NodeDenied {
        kind: EntityKind,
    },
    RootCommitted {
        kind: EntityKind,
        deleted: u64,
        unlinked: u64,
    },
    RootRolledBack {
        kind: EntityKind,
    },
    FieldsNulled {
        kind: EntityKind,
        fields: u64,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

/// GlobalMetricsSink
/// Default sink that writes into the thread-local metrics state.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent) {
        match event {
            MetricsEvent::RequestStart { kind, roots } => metrics::with_state_mut(|m| {
                m.ops.requests_started = m.ops.requests_started.saturating_add(1);
                m.ops.roots_requested = m.ops.roots_requested.saturating_add(roots);
                with_kind_mut(m, kind, |k| k.requests = k.requests.saturating_add(1));
            }),

            MetricsEvent::RequestFinish { kind, kept } => metrics::with_state_mut(|m| {
                m.ops.requests_finished = m.ops.requests_finished.saturating_add(1);
                m.ops.rows_kept = m.ops.rows_kept.saturating_add(kept);
                with_kind_mut(m, kind, |k| k.rows_kept = k.rows_kept.saturating_add(kept));
            }),

            MetricsEvent::PlanResolved {
                kind,
                nodes,
                lookups,
            } => metrics::with_state_mut(|m| {
                m.ops.plans_resolved = m.ops.plans_resolved.saturating_add(1);
                m.ops.plan_nodes = m.ops.plan_nodes.saturating_add(nodes);
                m.ops.store_lookups = m.ops.store_lookups.saturating_add(lookups);
                with_kind_mut(m, kind, |k| k.plan_nodes = k.plan_nodes.saturating_add(nodes));
            }),

            MetricsEvent::NodeDenied { kind } => metrics::with_state_mut(|m| {
                m.ops.nodes_denied = m.ops.nodes_denied.saturating_add(1);
                with_kind_mut(m, kind, |k| k.nodes_denied = k.nodes_denied.saturating_add(1));
            }),

            MetricsEvent::RootCommitted {
                kind,
                deleted,
                unlinked,
            } => metrics::with_state_mut(|m| {
                m.ops.roots_committed = m.ops.roots_committed.saturating_add(1);
                m.ops.rows_deleted = m.ops.rows_deleted.saturating_add(deleted);
                m.ops.rows_unlinked = m.ops.rows_unlinked.saturating_add(unlinked);
                with_kind_mut(m, kind, |k| {
                    k.roots_committed = k.roots_committed.saturating_add(1);
                    k.rows_deleted = k.rows_deleted.saturating_add(deleted);
                    k.rows_unlinked = k.rows_unlinked.saturating_add(unlinked);
                });
            }),

            MetricsEvent::RootRolledBack { kind } => metrics::with_state_mut(|m| {
                m.ops.roots_rolled_back = m.ops.roots_rolled_back.saturating_add(1);
                with_kind_mut(m, kind, |k| {
                    k.roots_rolled_back = k.roots_rolled_back.saturating_add(1);
                });
            }),

            MetricsEvent::FieldsNulled { kind, fields } => metrics::with_state_mut(|m| {
                m.ops.fields_nulled = m.ops.fields_nulled.saturating_add(fields);
                with_kind_mut(m, kind, |k| {
                    k.fields_nulled = k.fields_nulled.saturating_add(fields);
                });
            }),
        }
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent) {
    match SINK_OVERRIDE.with(Cell::get) {
        Some(sink) => sink.record(event),
        None => GLOBAL_METRICS_SINK.record(event),
    }
}

/// Snapshot the current metrics state for endpoint/test plumbing.
///
/// `window_start_ms` filters by window start (`EventState::window_start_ms`),
/// not by per-event timestamps.
#[must_use]
pub fn metrics_report(window_start_ms: Option<u64>) -> metrics::EventReport {
    metrics::report_window_start(window_start_ms)
}

/// Reset all metrics state.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override.
pub(crate) fn with_metrics_sink<T>(sink: &'static dyn MetricsSink, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<&'static dyn MetricsSink>);

    impl Drop for Guard {
        fn drop(&mut self) {
            SINK_OVERRIDE.with(|cell| cell.set(self.0));
        }
    }

    let prev = SINK_OVERRIDE.with(|cell| cell.replace(Some(sink)));
    let _guard = Guard(prev);

    f()
}
