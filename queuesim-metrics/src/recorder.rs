//! A `metrics::Recorder` that captures facade metrics in memory.
//!
//! [`RunMetrics`](crate::RunMetrics) reports every accepted observation
//! through the `metrics` facade. Installing this recorder locally around a
//! run collects those reports without touching global state:
//!
//! ```rust
//! use queuesim_metrics::with_capturing_recorder;
//!
//! let ((), snapshot) = with_capturing_recorder(|| {
//!     metrics::counter!("queuesim_count_total", "category" => "full_menu").increment(2);
//! });
//! assert_eq!(snapshot.counter("queuesim_count_total", "full_menu"), 2);
//! ```

use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Metric values captured by [`CapturingRecorder`], keyed by
/// `name{label=value,...}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacadeSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, f64>,
    pub histograms: BTreeMap<String, Vec<f64>>,
}

impl FacadeSnapshot {
    /// Counter `name` with a single `category` label.
    pub fn counter(&self, name: &str, category: &str) -> u64 {
        self.counters
            .get(&category_key(name, category))
            .copied()
            .unwrap_or(0)
    }

    /// Histogram `name` with a single `category` label.
    pub fn histogram(&self, name: &str, category: &str) -> &[f64] {
        self.histograms
            .get(&category_key(name, category))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn category_key(name: &str, category: &str) -> String {
    format!("{name}{{category={category}}}")
}

fn render_key(key: &Key) -> String {
    let labels: Vec<String> = key
        .labels()
        .map(|label| format!("{}={}", label.key(), label.value()))
        .collect();
    format!("{}{{{}}}", key.name(), labels.join(","))
}

type Shared = Arc<Mutex<FacadeSnapshot>>;

fn lock(shared: &Shared) -> MutexGuard<'_, FacadeSnapshot> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone, Default)]
pub struct CapturingRecorder {
    snapshot: Shared,
}

impl CapturingRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything captured so far.
    pub fn snapshot(&self) -> FacadeSnapshot {
        lock(&self.snapshot).clone()
    }
}

/// Run `f` with a fresh local [`CapturingRecorder`] and return what it captured.
pub fn with_capturing_recorder<T>(f: impl FnOnce() -> T) -> (T, FacadeSnapshot) {
    let recorder = CapturingRecorder::new();
    let result = metrics::with_local_recorder(&recorder, f);
    (result, recorder.snapshot())
}

struct Handle {
    snapshot: Shared,
    key: String,
}

impl metrics::CounterFn for Handle {
    fn increment(&self, value: u64) {
        *lock(&self.snapshot).counters.entry(self.key.clone()).or_insert(0) += value;
    }

    fn absolute(&self, value: u64) {
        lock(&self.snapshot).counters.insert(self.key.clone(), value);
    }
}

impl metrics::GaugeFn for Handle {
    fn increment(&self, value: f64) {
        *lock(&self.snapshot).gauges.entry(self.key.clone()).or_insert(0.0) += value;
    }

    fn decrement(&self, value: f64) {
        *lock(&self.snapshot).gauges.entry(self.key.clone()).or_insert(0.0) -= value;
    }

    fn set(&self, value: f64) {
        lock(&self.snapshot).gauges.insert(self.key.clone(), value);
    }
}

impl metrics::HistogramFn for Handle {
    fn record(&self, value: f64) {
        lock(&self.snapshot)
            .histograms
            .entry(self.key.clone())
            .or_default()
            .push(value);
    }
}

impl CapturingRecorder {
    fn handle(&self, key: &Key) -> Arc<Handle> {
        Arc::new(Handle {
            snapshot: self.snapshot.clone(),
            key: render_key(key),
        })
    }
}

impl Recorder for CapturingRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(self.handle(key))
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::from_arc(self.handle(key))
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(self.handle(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_captures_metrics_macros() {
        let ((), snapshot) = with_capturing_recorder(|| {
            metrics::counter!("queuesim_count_total", "category" => "poke").increment(2);
            metrics::counter!("queuesim_count_total", "category" => "poke").increment(1);
            metrics::gauge!("queue_depth", "category" => "poke").set(7.0);
            metrics::histogram!("queuesim_queue_delay", "category" => "poke").record(12.5);
        });

        assert_eq!(snapshot.counter("queuesim_count_total", "poke"), 3);
        assert_eq!(snapshot.counter("queuesim_count_total", "menu"), 0);
        assert_eq!(snapshot.gauges.get("queue_depth{category=poke}"), Some(&7.0));
        assert_eq!(snapshot.histogram("queuesim_queue_delay", "poke"), &[12.5]);
    }

    #[test]
    fn recorder_is_local_to_the_closure() {
        let ((), first) = with_capturing_recorder(|| {
            metrics::counter!("ticks").increment(1);
        });
        metrics::counter!("ticks").increment(1);
        let ((), second) = with_capturing_recorder(|| {});

        assert_eq!(first.counters.get("ticks{}"), Some(&1));
        assert!(second.counters.is_empty());
    }
}
