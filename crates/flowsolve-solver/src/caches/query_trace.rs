//! Structured query tracing for solver entry points.
//!
//! Events use target `flowsolve::query_json` and are intended to be consumed with:
//! `FLOWSOLVE_LOG=flowsolve::query_json=trace FLOWSOLVE_LOG_FORMAT=json`.
//!
//! Environment:
//! - `FLOWSOLVE_QUERY_RUN_ID`: optional run identifier attached to every event.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{Level, trace};

use crate::types::TypeId;

static NEXT_QUERY_ID: AtomicU64 = AtomicU64::new(1);
static QUERY_RUN_ID: OnceLock<String> = OnceLock::new();

#[inline]
pub(crate) fn enabled() -> bool {
    tracing::enabled!(target: "flowsolve::query_json", Level::TRACE)
}

#[inline]
pub(crate) fn next_query_id() -> u64 {
    NEXT_QUERY_ID.fetch_add(1, Ordering::Relaxed)
}

#[inline]
fn run_id() -> &'static str {
    QUERY_RUN_ID
        .get_or_init(|| {
            std::env::var("FLOWSOLVE_QUERY_RUN_ID").unwrap_or_else(|_| "default".to_string())
        })
        .as_str()
}

#[inline]
pub(crate) fn relation_start(query_id: u64, op: &'static str, lower: TypeId, upper: TypeId) {
    trace!(
        target: "flowsolve::query_json",
        event = "query",
        phase = "start",
        run_id = run_id(),
        query_id,
        op,
        lower_type_id = lower.0,
        upper_type_id = upper.0
    );
}

#[inline]
pub(crate) fn relation_end(query_id: u64, op: &'static str, ok: bool, errors_recorded: usize) {
    trace!(
        target: "flowsolve::query_json",
        event = "query",
        phase = "end",
        run_id = run_id(),
        query_id,
        op,
        ok,
        errors_recorded
    );
}

#[inline]
pub(crate) fn resolution_start(query_id: u64, input: TypeId, pending: usize) {
    trace!(
        target: "flowsolve::query_json",
        event = "query",
        phase = "start",
        run_id = run_id(),
        query_id,
        op = "fully_resolve",
        input_type_id = input.0,
        pending
    );
}

#[inline]
pub(crate) fn resolution_end(query_id: u64, result: TypeId) {
    trace!(
        target: "flowsolve::query_json",
        event = "query",
        phase = "end",
        run_id = run_id(),
        query_id,
        op = "fully_resolve",
        result_type_id = result.0
    );
}
