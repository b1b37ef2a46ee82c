use std::collections::BTreeMap;

use serde::Serialize;

use crate::dispatch::Dispatch;

pub const TILES_RENDERED: &str = "tiles_rendered";
pub const TILES_OUT_OF_BOUNDS: &str = "tiles_out_of_bounds";
pub const TILES_FAILED: &str = "tiles_failed";
pub const TILE_RENDER_MS: &str = "tile_render_ms";
pub const CALLBACKS_INVOKED: &str = "callbacks_invoked";
pub const CALLBACKS_FAILED: &str = "callbacks_failed";
pub const VIEWS_OPENED: &str = "views_opened";
pub const VIEWS_CLOSED: &str = "views_closed";
pub const VIEWS_EVICTED: &str = "views_evicted";

/// Operational counters for a running dashboard.
///
/// Sorted maps keep snapshots stable for logs and the metrics endpoint.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Metrics {
    counters: BTreeMap<String, u64>,
    histograms: BTreeMap<String, Histogram>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Histogram {
    pub count: u64,
    pub sum: i64,
    pub min: i64,
    pub max: i64,
}

impl Histogram {
    pub fn record(&mut self, value: i64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub histograms: BTreeMap<String, Histogram>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn inc_counter(&mut self, name: impl Into<String>, by: u64) {
        *self.counters.entry(name.into()).or_insert(0) += by;
    }

    pub fn record_histogram(&mut self, name: impl Into<String>, value: i64) {
        self.histograms.entry(name.into()).or_default().record(value);
    }

    pub fn histogram(&self, name: &str) -> Option<Histogram> {
        self.histograms.get(name).copied()
    }

    pub fn record_dispatch(&mut self, dispatch: &Dispatch) {
        self.inc_counter(CALLBACKS_INVOKED, dispatch.invocations() as u64);
        self.inc_counter(CALLBACKS_FAILED, dispatch.failures.len() as u64);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self.counters.clone(),
            histograms: self.histograms.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CALLBACKS_FAILED, CALLBACKS_INVOKED, Histogram, Metrics};
    use crate::callback::{CallbackId, OutputTarget};
    use crate::dispatch::{CallbackFailure, Dispatch, OutputUpdate};
    use foundation::value::Value;

    #[test]
    fn counters_accumulate() {
        let mut m = Metrics::new();
        m.inc_counter("a", 1);
        m.inc_counter("a", 2);
        assert_eq!(m.counter("a"), 3);
        assert_eq!(m.counter("missing"), 0);
    }

    #[test]
    fn histogram_tracks_min_max_sum_count() {
        let mut h = Histogram::default();
        h.record(5);
        h.record(-2);
        h.record(7);
        assert_eq!((h.count, h.sum, h.min, h.max), (3, 10, -2, 7));
    }

    #[test]
    fn dispatch_counts_invocations_and_failures() {
        let target = OutputTarget::new("out1", "children");
        let d = Dispatch {
            updates: vec![OutputUpdate {
                target: target.clone(),
                value: Value::Null,
            }],
            failures: vec![CallbackFailure {
                callback: CallbackId(1),
                target,
                error: "x".to_string(),
            }],
        };
        let mut m = Metrics::new();
        m.record_dispatch(&d);
        assert_eq!(m.counter(CALLBACKS_INVOKED), 2);
        assert_eq!(m.counter(CALLBACKS_FAILED), 1);
    }

    #[test]
    fn snapshot_is_sorted() {
        let mut m = Metrics::new();
        m.inc_counter("b", 1);
        m.inc_counter("a", 1);
        let keys: Vec<_> = m.snapshot().counters.into_keys().collect();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }
}
