//! Discrete event simulation kernel.
//!
//! This crate provides the building blocks for stochastic queueing models:
//! a virtual clock with a FIFO-tie-broken event queue, cooperative logical
//! processes written as `async` code, FIFO capacity resources and a seedable
//! random draw provider.
//!
//! # Architecture Overview
//!
//! - [`Simulation`]: owns the [`Scheduler`] and the registered components and
//!   drives the run loop ([`Simulation::step`], [`Simulation::run_until`]).
//! - [`Scheduler`]: the event queue and the clock. Events fire in
//!   `(time, insertion order)` order, which makes every run reproducible.
//! - [`async_runtime::DesRuntime`]: a component hosting logical processes.
//!   Processes suspend on [`async_runtime::sleep`] / [`async_runtime::timeout`]
//!   and on [`resource::CapacityResource::request`].
//! - [`random::RandomStream`]: one seeded stream per run.
//!
//! # Basic Usage
//!
//! ```rust
//! use queuesim_core::async_runtime::{self, DesRuntime};
//! use queuesim_core::{SimTime, Simulation};
//!
//! let mut sim = Simulation::default();
//! let mut runtime = DesRuntime::new();
//! runtime.spawn(async {
//!     async_runtime::timeout(4.0)?.await;
//!     async_runtime::timeout(2.0)?.await;
//!     Ok::<(), queuesim_core::SimError>(())
//! });
//! async_runtime::install(&mut sim, runtime);
//!
//! sim.run_until(SimTime::from_secs(10)).unwrap();
//! assert_eq!(sim.time(), SimTime::from_secs(6));
//! ```
//!
//! # Time Model
//!
//! All timing uses [`SimTime`], which represents simulation time (not wall-clock time).
//! One model time unit is one second of `SimTime`.

pub mod async_runtime;
pub mod error;
pub mod execute;
pub mod logging;
pub mod random;
pub mod resource;
pub mod scheduler;
pub mod seeds;
pub mod task;
pub mod time;
pub mod types;
mod waker;

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use tracing::{debug, info, instrument, trace, warn};

pub use error::SimError;
pub use execute::{Execute, Executor};
pub use logging::{init_detailed_simulation_logging, init_simulation_logging, init_simulation_logging_with_level};
pub use random::{weighted_choice, RandomProvider, RandomStream};
pub use resource::{CapacityResource, ResourceGuard};
pub use scheduler::{ClockRef, EventEntry, Scheduler};
pub use seeds::derive_seed;
pub use task::{ClosureTask, Task, TaskId};
pub use time::SimTime;
pub use types::{EventId, ProcessId};

/// Typed handle of a registered component.
pub struct Key<T> {
    id: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
    pub(crate) fn new_with_id(id: u64) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// Get the id of this key
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Key<T> {}

impl<T> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.id)
    }
}

pub trait ProcessEventEntry: Any {
    fn process_event_entry(&mut self, entry: EventEntry, scheduler: &mut Scheduler);
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

/// A stateful participant of the simulation that reacts to typed events.
pub trait Component: ProcessEventEntry {
    type Event: 'static;

    fn process_event(
        &mut self,
        self_id: Key<Self::Event>,
        event: &Self::Event,
        scheduler: &mut Scheduler,
    );
}

impl<E, C> ProcessEventEntry for C
where
    E: fmt::Debug + 'static,
    C: Component<Event = E> + 'static,
{
    fn process_event_entry(&mut self, entry: EventEntry, scheduler: &mut Scheduler) {
        match entry.downcast::<E>() {
            Some(typed_entry) => {
                self.process_event(typed_entry.component_key, typed_entry.event, scheduler)
            }
            None => warn!(
                event_id = %entry.id(),
                expected = std::any::type_name::<E>(),
                "Dropping event with unexpected type"
            ),
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Container holding type-erased components.
#[derive(Default)]
pub struct Components {
    next_id: u64,
    components: HashMap<u64, Box<dyn ProcessEventEntry>>,
}

impl Components {
    /// Dispatch the event to its component, or run it if it is a task.
    pub fn process_event_entry(&mut self, entry: EventEntry, scheduler: &mut Scheduler) {
        match entry.payload {
            scheduler::EventPayload::Component { component, .. } => {
                if let Some(target) = self.components.get_mut(&component) {
                    target.process_event_entry(entry, scheduler);
                } else {
                    warn!(component, "Event addressed to a removed component");
                }
            }
            scheduler::EventPayload::Task(task_id) => {
                if !scheduler.execute_task(task_id) {
                    trace!(%task_id, "Task no longer pending");
                }
            }
        }
    }

    /// Registers a new component and returns its key.
    #[must_use]
    pub fn register<E: fmt::Debug + 'static, C: Component<Event = E> + 'static>(
        &mut self,
        component: C,
    ) -> Key<E> {
        self.next_id += 1;
        self.components.insert(self.next_id, Box::new(component));
        Key::new_with_id(self.next_id)
    }

    pub fn remove<E: 'static, C: Component<Event = E> + 'static>(&mut self, key: Key<E>) -> Option<C> {
        self.components
            .remove(&key.id)
            .and_then(|boxed| boxed.into_any().downcast::<C>().ok())
            .map(|boxed| *boxed)
    }

    /// Get mutable access to a component
    pub fn get_component_mut<E: 'static, C: Component<Event = E> + 'static>(
        &mut self,
        key: Key<E>,
    ) -> Option<&mut C> {
        self.components
            .get_mut(&key.id)
            .and_then(|boxed| boxed.as_any_mut().downcast_mut::<C>())
    }
}

/// Simulation struct that puts the scheduler and the components together.
///
/// One `Simulation` is one run: it starts at time zero and is discarded once
/// the horizon is reached, together with every still-suspended process.
#[derive(Default)]
pub struct Simulation {
    scheduler: Scheduler,
    /// Component container.
    pub components: Components,
}

impl Simulation {
    /// Returns the current simulation time.
    #[must_use]
    pub fn time(&self) -> SimTime {
        self.scheduler.time()
    }

    /// Returns a ClockRef for reading the simulation time.
    #[must_use]
    pub fn clock(&self) -> ClockRef {
        self.scheduler.clock()
    }

    /// Read access to the scheduler.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Mutable access to the scheduler, for seeding events before the run.
    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// Performs one step of the simulation. Returns `true` if an event was
    /// processed, and `false` if the queue is empty or the run has failed.
    ///
    /// Processes woken outside a poll, for example by a slot released in a
    /// continuation, are scheduled at the current time once the event is
    /// handled.
    pub fn step(&mut self) -> bool {
        if self.scheduler.failure().is_some() {
            return false;
        }
        self.scheduler.schedule_deferred_wakes();

        let Some(event) = self.scheduler.pop() else {
            return false;
        };

        trace!(
            event_id = %event.id(),
            event_time = %event.time(),
            event_type = event.kind(),
            "Processing simulation step"
        );
        self.components.process_event_entry(event, &mut self.scheduler);
        self.scheduler.schedule_deferred_wakes();
        true
    }

    /// Runs the simulation with the given executor.
    ///
    /// The stopping condition depends on the executor used.
    /// See [`Execute`] and [`Executor`] for more details.
    #[instrument(skip(self, executor), fields(initial_time = %self.time()))]
    pub fn execute<E: Execute>(&mut self, executor: E) {
        debug!("Starting simulation execution");
        executor.execute(self);
        debug!(
            final_time = %self.time(),
            pending_events = self.scheduler.pending_events(),
            "Simulation execution completed"
        );
    }

    /// Resume events in time order until the queue is empty or the next event
    /// fires after `horizon`.
    ///
    /// Events still queued past the horizon are never resumed. Returns the
    /// fatal error of the run if a process or continuation aborted it.
    #[instrument(skip(self), fields(horizon = %horizon))]
    pub fn run_until(&mut self, horizon: SimTime) -> Result<(), SimError> {
        self.execute(Executor::timed(horizon));
        match self.scheduler.take_failure() {
            Some(error) => Err(error),
            None => {
                info!(
                    final_time = %self.time(),
                    discarded_events = self.scheduler.pending_events(),
                    "Run reached its horizon"
                );
                Ok(())
            }
        }
    }

    /// Adds a new component.
    #[must_use]
    #[instrument(skip(self, component), fields(component_type = std::any::type_name::<C>()))]
    pub fn add_component<E: fmt::Debug + 'static, C: Component<Event = E> + 'static>(
        &mut self,
        component: C,
    ) -> Key<E> {
        let key = self.components.register(component);
        debug!(component_id = key.id(), "Added component to simulation");
        key
    }

    /// Remove a component: usually at the end of the simulation to peek at the state
    #[must_use]
    pub fn remove_component<E: fmt::Debug + 'static, C: Component<Event = E> + 'static>(
        &mut self,
        key: Key<E>,
    ) -> Option<C> {
        let result = self.components.remove(key);
        if result.is_none() {
            warn!(component_id = key.id(), "Attempted to remove non-existent component");
        }
        result
    }

    /// Get mutable access to a component
    pub fn get_component_mut<E: fmt::Debug + 'static, C: Component<Event = E> + 'static>(
        &mut self,
        key: Key<E>,
    ) -> Option<&mut C> {
        self.components.get_component_mut(key)
    }

    /// Schedules a new event to be executed after `delay` in component `component`.
    pub fn schedule<E: fmt::Debug + 'static>(&mut self, delay: SimTime, component: Key<E>, event: E) -> EventId {
        self.scheduler.schedule(delay, component, event)
    }

    /// Enqueue a continuation to run after `delay`.
    pub fn schedule_after<F>(&mut self, delay: SimTime, continuation: F) -> TaskId
    where
        F: FnOnce(&mut Scheduler) + 'static,
    {
        self.scheduler.schedule_after(delay, continuation)
    }

    /// Returns the time of the next scheduled event, or None if no events are scheduled.
    pub fn peek_next_event_time(&self) -> Option<SimTime> {
        self.scheduler.peek_time()
    }

    /// Check if there are pending events
    pub fn has_pending_events(&self) -> bool {
        self.scheduler.pending_events() > 0
    }
}
