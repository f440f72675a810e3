//! Per-run metrics with a warm-up window.
//!
//! Observations made at or before the warm-up time are dropped so that the
//! statistics describe the system once it has left its empty initial state.
//! Every accepted observation is also reported through the `metrics` facade
//! (`queuesim_count_total` counter, `queuesim_queue_delay` histogram), labelled
//! with the category.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use metrics::{counter, histogram};
use queuesim_core::SimTime;
use serde::Serialize;
use tracing::trace;

use crate::error::MetricsError;
use crate::stats::mean;

/// Key a run's observations are grouped by.
pub trait MetricKey: Copy + Eq + Hash + Debug {
    /// Stable label used in metric names and log fields.
    fn label(&self) -> &'static str;
}

/// One queue-delay observation and the time it was recorded at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub at: SimTime,
    pub value: f64,
}

/// Counts and queue-delay samples of one run.
///
/// Owned by the run that produced it; never shared between runs.
#[derive(Debug, Clone, PartialEq)]
pub struct RunMetrics<K: MetricKey> {
    warm_up: SimTime,
    counts: HashMap<K, u64>,
    delays: HashMap<K, Vec<Sample>>,
}

impl<K: MetricKey> RunMetrics<K> {
    pub fn new(warm_up: SimTime) -> Self {
        Self {
            warm_up,
            counts: HashMap::new(),
            delays: HashMap::new(),
        }
    }

    pub fn warm_up(&self) -> SimTime {
        self.warm_up
    }

    /// Whether an observation made at `at` is kept.
    pub fn is_recording(&self, at: SimTime) -> bool {
        at > self.warm_up
    }

    /// Count one occurrence of `key`. Returns `false` if `at` falls inside the
    /// warm-up window and nothing was recorded.
    pub fn record_count(&mut self, at: SimTime, key: K) -> bool {
        if !self.is_recording(at) {
            return false;
        }
        *self.counts.entry(key).or_insert(0) += 1;
        counter!("queuesim_count_total", "category" => key.label()).increment(1);
        trace!(category = key.label(), %at, "Count recorded");
        true
    }

    /// Record a queue delay for `key`. Returns `false` if `at` falls inside the
    /// warm-up window and nothing was recorded.
    pub fn record_queue_delay(&mut self, at: SimTime, key: K, delay: f64) -> bool {
        if !self.is_recording(at) {
            return false;
        }
        self.delays.entry(key).or_default().push(Sample { at, value: delay });
        histogram!("queuesim_queue_delay", "category" => key.label()).record(delay);
        trace!(category = key.label(), %at, delay, "Queue delay recorded");
        true
    }

    pub fn count(&self, key: K) -> u64 {
        self.counts.get(&key).copied().unwrap_or(0)
    }

    /// Samples for `key` in recording order.
    pub fn samples(&self, key: K) -> &[Sample] {
        self.delays.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Queue delays for `key` in recording order.
    pub fn queue_delays(&self, key: K) -> Vec<f64> {
        self.samples(key).iter().map(|sample| sample.value).collect()
    }

    /// Arithmetic mean of the queue delays of `key`.
    ///
    /// Fails with [`MetricsError::EmptySample`] when nothing was recorded.
    pub fn mean_queue_delay(&self, key: K) -> Result<f64, MetricsError> {
        mean(&self.queue_delays(key))
            .ok_or_else(|| MetricsError::empty_sample(format!("{} queue delay", key.label())))
    }
}
