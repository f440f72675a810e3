//! The cafeteria model: stations, customers and the arrival generator.
//!
//! Each customer is a logical process. It picks a category, queues for the
//! station serving that category, is served through the station's fixed
//! phases and leaves. The arrival generator runs for the whole run and
//! spawns one customer per inter-arrival time.

use std::cell::RefCell;
use std::rc::Rc;

use queuesim_core::async_runtime::{self, DesRuntime};
use queuesim_core::{sim_log_with_time, weighted_choice, CapacityResource, ClockRef, RandomProvider, SimError};
use queuesim_metrics::RunMetrics;
use tracing::{debug, trace};

use crate::category::Category;
use crate::config::{QueuedValues, RunConfiguration};

/// Shared state of one run.
///
/// Cloning is cheap: clones share the stations, metrics and random stream.
/// Everything lives on the run's own thread.
pub struct Cafeteria<R> {
    stations: Rc<QueuedValues<CapacityResource>>,
    service_phases: Rc<QueuedValues<Vec<f64>>>,
    interarrival_means: Rc<[f64]>,
    weights: [f64; 4],
    metrics: Rc<RefCell<RunMetrics<Category>>>,
    random: Rc<RefCell<R>>,
    clock: ClockRef,
}

impl<R> Clone for Cafeteria<R> {
    fn clone(&self) -> Self {
        Self {
            stations: self.stations.clone(),
            service_phases: self.service_phases.clone(),
            interarrival_means: self.interarrival_means.clone(),
            weights: self.weights,
            metrics: self.metrics.clone(),
            random: self.random.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<R: RandomProvider + 'static> Cafeteria<R> {
    /// Build the stations of `config`. `clock` is the clock of the simulation
    /// the processes will run in.
    pub fn new(config: &RunConfiguration, clock: ClockRef, random: R) -> Result<Self, SimError> {
        config.validate()?;
        let stations = config
            .capacities
            .try_map(|category, capacity| CapacityResource::new(category.as_str(), *capacity))?;

        Ok(Self {
            stations: Rc::new(stations),
            service_phases: Rc::new(config.service_phases.clone()),
            interarrival_means: config.interarrival_means.clone().into(),
            weights: config.weights.to_array(),
            metrics: Rc::new(RefCell::new(RunMetrics::new(config.warm_up_time()?))),
            random: Rc::new(RefCell::new(random)),
            clock,
        })
    }

    /// Spawn the arrival generator on `runtime`.
    pub fn open(&self, runtime: &mut DesRuntime) {
        runtime.spawn(self.clone().arrivals());
    }

    pub fn station(&self, category: Category) -> Option<&CapacityResource> {
        self.stations.get(category)
    }

    /// Snapshot of the metrics recorded so far.
    pub fn metrics(&self) -> RunMetrics<Category> {
        self.metrics.borrow().clone()
    }

    /// Perpetual arrival loop. Every arrival waits out one exponential gap
    /// per configured mean, in order, then spawns a customer.
    pub async fn arrivals(self) -> Result<(), SimError> {
        loop {
            for &mean in self.interarrival_means.iter() {
                let gap = self.random.borrow_mut().exponential(mean)?;
                async_runtime::timeout(gap)?.await;
            }
            let customer = async_runtime::spawn(self.clone().customer())?;
            trace!(%customer, time = %self.clock.time(), "Customer arrived");
        }
    }

    /// Control flow of one customer, from arrival to departure.
    pub async fn customer(self) -> Result<(), SimError> {
        let category = {
            let mut random = self.random.borrow_mut();
            *weighted_choice(&mut *random, &Category::ALL, &self.weights)?
        };

        let Some(station) = self.stations.get(category) else {
            self.metrics.borrow_mut().record_count(self.clock.time(), category);
            sim_log_with_time!(trace, self.clock.time(), %category, "Customer left without ordering");
            return Ok(());
        };

        let queued_at = self.clock.time();
        let slot = station.request().await;
        let granted_at = self.clock.time();
        let delay = (granted_at - queued_at).as_secs_f64();
        {
            let mut metrics = self.metrics.borrow_mut();
            metrics.record_queue_delay(granted_at, category, delay);
            metrics.record_count(granted_at, category);
        }
        sim_log_with_time!(trace, granted_at, %category, delay, "Service started");

        if let Some(phases) = self.service_phases.get(category) {
            for &phase in phases {
                async_runtime::timeout(phase)?.await;
            }
        }

        slot.release();
        debug!(%category, departed = %self.clock.time(), "Customer departed");
        Ok(())
    }
}
