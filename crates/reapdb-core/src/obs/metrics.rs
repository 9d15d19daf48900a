use crate::model::EntityKind;
use serde::{Deserialize, Serialize};
use std::{
    cell::RefCell,
    collections::BTreeMap,
    time::{SystemTime, UNIX_EPOCH},
};

///
/// EventState
/// Ephemeral, in-memory counters for delete requests.
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EventState {
    pub ops: EventOps,
    pub kinds: BTreeMap<EntityKind, KindCounters>,
    pub window_start_ms: u64,
}

impl Default for EventState {
    fn default() -> Self {
        Self {
            ops: EventOps::default(),
            kinds: BTreeMap::new(),
            window_start_ms: now_millis(),
        }
    }
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventOps {
    // Request entrypoints
    pub requests_started: u64,
    pub requests_finished: u64,
    pub roots_requested: u64,

    // Resolution
    pub plans_resolved: u64,
    pub plan_nodes: u64,
    pub store_lookups: u64,
    pub nodes_denied: u64,

    // Execution
    pub roots_committed: u64,
    pub roots_rolled_back: u64,
    pub rows_deleted: u64,
    pub rows_unlinked: u64,
    pub rows_kept: u64,
    pub fields_nulled: u64,
}

///
/// KindCounters
/// Counters keyed by the root (or node) kind an event was recorded for.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct KindCounters {
    pub requests: u64,
    pub plan_nodes: u64,
    pub nodes_denied: u64,
    pub roots_committed: u64,
    pub roots_rolled_back: u64,
    pub rows_deleted: u64,
    pub rows_unlinked: u64,
    pub rows_kept: u64,
    pub fields_nulled: u64,
}

///
/// EventReport
/// Point-in-time snapshot returned to observability surfaces.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventReport {
    /// `None` when the requested window starts after the live window.
    pub counters: Option<EventState>,
}

thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
        })
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Borrow the counters of one kind mutably, creating them on first use.
pub(crate) fn with_kind_mut<R>(
    m: &mut EventState,
    kind: EntityKind,
    f: impl FnOnce(&mut KindCounters) -> R,
) -> R {
    f(m.kinds.entry(kind).or_default())
}

/// Reset all counters.
pub(crate) fn reset_all() {
    with_state_mut(|m| *m = EventState::default());
}

/// Snapshot counters whose window started at or after `window_start_ms`.
pub(crate) fn report_window_start(window_start_ms: Option<u64>) -> EventReport {
    with_state(|m| {
        let include = window_start_ms.is_none_or(|start| start <= m.window_start_ms);

        EventReport {
            counters: include.then(|| m.clone()),
        }
    })
}
