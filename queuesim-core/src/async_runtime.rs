//! Logical processes written as `async` code.
//!
//! A process is a future hosted by the [`DesRuntime`] component. It runs
//! without interruption until it awaits one of the suspension points:
//!
//! - [`sleep`] / [`timeout`]: timed suspension, resumed `delay` later;
//! - [`crate::resource::CapacityResource::request`]: untimed suspension until
//!   a slot is handed over.
//!
//! Every resumption is a `RuntimeEvent::Wake` going through the scheduler
//! queue, so processes waking at the same instant resume in the order their
//! wake-ups were scheduled.
//!
//! # Basic Usage
//!
//! ```
//! use queuesim_core::async_runtime::{self, DesRuntime};
//! use queuesim_core::{SimError, SimTime, Simulation};
//!
//! let mut sim = Simulation::default();
//! let mut runtime = DesRuntime::new();
//! runtime.spawn(async {
//!     for _ in 0..3 {
//!         async_runtime::spawn(async {
//!             async_runtime::timeout(2.5)?.await;
//!             Ok::<(), SimError>(())
//!         })?;
//!         async_runtime::timeout(1.0)?.await;
//!     }
//!     Ok::<(), SimError>(())
//! });
//! async_runtime::install(&mut sim, runtime);
//!
//! sim.run_until(SimTime::from_secs(100)).unwrap();
//! assert_eq!(sim.time().as_secs_f64(), 4.5);
//! ```

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{debug, instrument, trace, warn};

use crate::error::SimError;
use crate::logging;
use crate::scheduler::Scheduler;
use crate::types::ProcessId;
use crate::waker::DeferredWakes;
use crate::{Component, Key, SimTime, Simulation};

type ProcessFuture = Pin<Box<dyn Future<Output = Result<(), SimError>>>>;

/// Values a process may finish with.
///
/// `()` is a normal exit. An `Err` aborts the whole run.
pub trait ProcessExit {
    fn into_result(self) -> Result<(), SimError>;
}

impl ProcessExit for () {
    fn into_result(self) -> Result<(), SimError> {
        Ok(())
    }
}

impl ProcessExit for Result<(), SimError> {
    fn into_result(self) -> Result<(), SimError> {
        self
    }
}

fn boxed<F>(future: F) -> ProcessFuture
where
    F: Future + 'static,
    F::Output: ProcessExit,
{
    Box::pin(async move { future.await.into_result() })
}

/// Something a process asked for while it was being polled.
enum Effect {
    Spawn(ProcessId, ProcessFuture),
    Timer(ProcessId, SimTime),
    Wake(ProcessId),
}

/// Per-poll state, visible to the free functions of this module.
struct PollContext {
    now: SimTime,
    process: ProcessId,
    next_process_id: u64,
    runtime: Key<RuntimeEvent>,
    deferred: DeferredWakes,
    effects: Vec<Effect>,
}

thread_local! {
    static POLL_CONTEXT: RefCell<Option<PollContext>> = const { RefCell::new(None) };
}

fn with_context<R>(f: impl FnOnce(&mut PollContext) -> R) -> Option<R> {
    POLL_CONTEXT.with(|context| context.borrow_mut().as_mut().map(f))
}

/// Record a wake-up of `process` as an effect of the running poll.
///
/// Returns `false` when no process of `runtime` is being polled; the caller
/// then leaves the wake to the scheduler's deferred wakes.
pub(crate) fn defer_wake(deferred: &DeferredWakes, runtime: Key<RuntimeEvent>, process: ProcessId) -> bool {
    with_context(|context| {
        if !context.deferred.same_queue(deferred) || context.runtime.id() != runtime.id() {
            return false;
        }
        let already_woken = context
            .effects
            .iter()
            .any(|effect| matches!(effect, Effect::Wake(p) if *p == process));
        if !already_woken {
            context.effects.push(Effect::Wake(process));
        }
        true
    })
    .unwrap_or(false)
}

/// Current simulation time, as seen by the running process.
pub fn now() -> Result<SimTime, SimError> {
    with_context(|context| context.now).ok_or(SimError::OutsideRuntime { operation: "now" })
}

/// Id of the running process, if any.
pub fn current_process() -> Option<ProcessId> {
    with_context(|context| context.process)
}

/// Start a new logical process from inside a running one.
///
/// The new process is first resumed at the current time, after everything
/// already scheduled for this instant.
pub fn spawn<F>(future: F) -> Result<ProcessId, SimError>
where
    F: Future + 'static,
    F::Output: ProcessExit,
{
    let future = boxed(future);
    with_context(move |context| {
        let process = ProcessId(context.next_process_id);
        context.next_process_id += 1;
        context.effects.push(Effect::Spawn(process, future));
        process
    })
    .ok_or(SimError::OutsideRuntime { operation: "spawn" })
}

/// Events that drive the runtime.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// Resume every process spawned through [`DesRuntime::spawn`].
    Poll,
    /// Resume one process.
    Wake { process: ProcessId },
}

/// Runtime component hosting the logical processes of one simulation run.
///
/// # Usage Pattern
///
/// 1. Create a runtime with `DesRuntime::new()`
/// 2. Spawn the initial processes with `runtime.spawn(...)`
/// 3. Hand it to the simulation with [`install`]
pub struct DesRuntime {
    next_process_id: u64,
    processes: HashMap<ProcessId, ProcessFuture>,
    ready_queue: VecDeque<ProcessId>,
    completed: u64,
}

impl Default for DesRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl DesRuntime {
    pub fn new() -> Self {
        Self {
            next_process_id: 0,
            processes: HashMap::new(),
            ready_queue: VecDeque::new(),
            completed: 0,
        }
    }

    /// Spawn a process that is resumed by the next `RuntimeEvent::Poll`.
    #[instrument(skip(self, future), fields(process))]
    pub fn spawn<F>(&mut self, future: F) -> ProcessId
    where
        F: Future + 'static,
        F::Output: ProcessExit,
    {
        let process = ProcessId(self.next_process_id);
        self.next_process_id += 1;
        self.processes.insert(process, boxed(future));
        self.ready_queue.push_back(process);

        tracing::Span::current().record("process", tracing::field::display(process));
        debug!(process_count = self.processes.len(), "Spawned process");
        process
    }

    /// Number of processes that have not finished yet.
    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    /// Number of processes that ran to completion.
    pub fn completed_processes(&self) -> u64 {
        self.completed
    }

    fn resume(&mut self, process: ProcessId, self_id: Key<RuntimeEvent>, scheduler: &mut Scheduler) {
        let Some(future) = self.processes.get_mut(&process) else {
            trace!(%process, "Wake for a finished process ignored");
            return;
        };

        let now = scheduler.time();
        let deferred = scheduler.deferred_wakes().clone();
        let waker = deferred.waker(self_id, process);
        let mut cx = Context::from_waker(&waker);
        let context = PollContext {
            now,
            process,
            next_process_id: self.next_process_id,
            runtime: self_id,
            deferred,
            effects: Vec::new(),
        };

        let previous = POLL_CONTEXT.with(|slot| slot.replace(Some(context)));
        let result = {
            let _span = logging::process_span(process, now).entered();
            future.as_mut().poll(&mut cx)
        };
        let context = POLL_CONTEXT.with(|slot| slot.replace(previous));

        match result {
            Poll::Ready(Ok(())) => {
                self.processes.remove(&process);
                self.completed += 1;
                logging::events::process_completed(process, now);
            }
            Poll::Ready(Err(error)) => {
                self.processes.remove(&process);
                warn!(%process, %error, "Process failed");
                scheduler.abort(error);
            }
            Poll::Pending => trace!(%process, "Process suspended"),
        }

        if let Some(context) = context {
            self.next_process_id = context.next_process_id;
            self.apply(context.effects, self_id, scheduler);
        }
    }

    fn apply(&mut self, effects: Vec<Effect>, self_id: Key<RuntimeEvent>, scheduler: &mut Scheduler) {
        let now = scheduler.time();
        for effect in effects {
            match effect {
                Effect::Spawn(process, future) => {
                    self.processes.insert(process, future);
                    logging::events::process_spawned(process, now);
                    scheduler.schedule_now(self_id, RuntimeEvent::Wake { process });
                }
                Effect::Timer(process, target) => {
                    let delay = SimTime::from_duration(target - now);
                    scheduler.schedule(delay, self_id, RuntimeEvent::Wake { process });
                }
                Effect::Wake(process) => {
                    scheduler.schedule_now(self_id, RuntimeEvent::Wake { process });
                }
            }
        }
    }
}

impl Component for DesRuntime {
    type Event = RuntimeEvent;

    #[instrument(skip(self, scheduler), fields(
        event = ?event,
        time = %scheduler.time(),
        process_count = self.processes.len()
    ))]
    fn process_event(&mut self, self_id: Key<RuntimeEvent>, event: &RuntimeEvent, scheduler: &mut Scheduler) {
        match event {
            RuntimeEvent::Poll => {
                let ready: Vec<ProcessId> = self.ready_queue.drain(..).collect();
                debug!(ready = ready.len(), "Resuming spawned processes");
                for process in ready {
                    self.resume(process, self_id, scheduler);
                }
            }
            RuntimeEvent::Wake { process } => self.resume(*process, self_id, scheduler),
        }
    }
}

/// Register `runtime` with the simulation and schedule its first poll at the
/// current time.
pub fn install(sim: &mut Simulation, runtime: DesRuntime) -> Key<RuntimeEvent> {
    let key = sim.add_component(runtime);
    sim.scheduler_mut().schedule_now(key, RuntimeEvent::Poll);
    key
}

/// A future that completes after a simulated delay.
///
/// The timer is registered on the first poll, so the delay counts from the
/// moment the process awaits it. A zero delay still suspends the process and
/// lets everything already scheduled for this instant run first.
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct SimSleep {
    delay: SimTime,
    target: Option<SimTime>,
}

impl Future for SimSleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let delay = self.delay;
        let elapsed = with_context(|context| match self.target {
            Some(target) => context.now >= target,
            None => {
                let target = context.now + delay;
                context.effects.push(Effect::Timer(context.process, target));
                self.target = Some(target);
                false
            }
        });

        match elapsed {
            Some(true) => Poll::Ready(()),
            Some(false) => Poll::Pending,
            None => {
                warn!("SimSleep polled outside of a simulation process");
                Poll::Pending
            }
        }
    }
}

/// Suspend the running process for `delay`.
pub fn sleep(delay: SimTime) -> SimSleep {
    SimSleep { delay, target: None }
}

/// Suspend the running process for `delay` model time units.
///
/// Negative or non-finite delays fail with [`SimError::InvalidDuration`].
pub fn timeout(delay: f64) -> Result<SimSleep, SimError> {
    Ok(sleep(SimTime::try_from_secs_f64(delay)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn log() -> Rc<RefCell<Vec<(&'static str, f64)>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn test_runtime_spawn_assigns_ids() {
        let mut runtime = DesRuntime::new();
        assert_eq!(runtime.process_count(), 0);

        assert_eq!(runtime.spawn(async {}), ProcessId(0));
        assert_eq!(runtime.spawn(async { Ok::<(), SimError>(()) }), ProcessId(1));
        assert_eq!(runtime.process_count(), 2);
    }

    #[test]
    fn test_timeouts_advance_the_clock() {
        let mut sim = Simulation::default();
        let trace = log();

        let mut runtime = DesRuntime::new();
        let t = trace.clone();
        runtime.spawn(async move {
            t.borrow_mut().push(("start", now()?.as_secs_f64()));
            timeout(4.0)?.await;
            t.borrow_mut().push(("first", now()?.as_secs_f64()));
            timeout(2.5)?.await;
            t.borrow_mut().push(("second", now()?.as_secs_f64()));
            Ok::<(), SimError>(())
        });
        let key = install(&mut sim, runtime);

        sim.run_until(SimTime::from_secs(100)).unwrap();
        assert_eq!(*trace.borrow(), vec![("start", 0.0), ("first", 4.0), ("second", 6.5)]);

        let runtime: DesRuntime = sim.remove_component(key).unwrap();
        assert_eq!(runtime.completed_processes(), 1);
        assert_eq!(runtime.process_count(), 0);
    }

    #[test]
    fn test_zero_timeout_yields_to_same_time_events() {
        let mut sim = Simulation::default();
        let trace = log();

        let mut runtime = DesRuntime::new();
        let t = trace.clone();
        runtime.spawn(async move {
            t.borrow_mut().push(("a1", 0.0));
            timeout(0.0)?.await;
            t.borrow_mut().push(("a2", 0.0));
            Ok::<(), SimError>(())
        });
        let t = trace.clone();
        runtime.spawn(async move {
            t.borrow_mut().push(("b", 0.0));
        });
        install(&mut sim, runtime);

        sim.run_until(SimTime::zero()).unwrap();
        let order: Vec<_> = trace.borrow().iter().map(|(name, _)| *name).collect();
        assert_eq!(order, vec!["a1", "b", "a2"]);
    }

    #[test]
    fn test_spawned_processes_start_in_spawn_order() {
        let mut sim = Simulation::default();
        let trace = log();

        let mut runtime = DesRuntime::new();
        let t = trace.clone();
        runtime.spawn(async move {
            for name in ["first", "second", "third"] {
                let t = t.clone();
                spawn(async move {
                    t.borrow_mut().push((name, now()?.as_secs_f64()));
                    Ok::<(), SimError>(())
                })?;
            }
            timeout(1.0)?.await;
            let t = t.clone();
            spawn(async move {
                t.borrow_mut().push(("late", now()?.as_secs_f64()));
                Ok::<(), SimError>(())
            })?;
            Ok::<(), SimError>(())
        });
        let key = install(&mut sim, runtime);

        sim.run_until(SimTime::from_secs(10)).unwrap();
        assert_eq!(
            *trace.borrow(),
            vec![("first", 0.0), ("second", 0.0), ("third", 0.0), ("late", 1.0)]
        );
        let runtime: DesRuntime = sim.remove_component(key).unwrap();
        assert_eq!(runtime.completed_processes(), 5);
    }

    #[test]
    fn test_process_error_aborts_run() {
        let mut sim = Simulation::default();
        let trace = log();

        let mut runtime = DesRuntime::new();
        runtime.spawn(async {
            timeout(1.0)?.await;
            timeout(-2.0)?.await;
            Ok::<(), SimError>(())
        });
        let t = trace.clone();
        runtime.spawn(async move {
            timeout(5.0)?.await;
            t.borrow_mut().push(("never", 5.0));
            Ok::<(), SimError>(())
        });
        install(&mut sim, runtime);

        let result = sim.run_until(SimTime::from_secs(10));
        assert_eq!(result, Err(SimError::InvalidDuration { value: -2.0 }));
        assert!(trace.borrow().is_empty());
        assert_eq!(sim.time(), SimTime::from_secs(1));
    }

    #[test]
    fn test_runtime_functions_outside_process() {
        assert_eq!(now(), Err(SimError::OutsideRuntime { operation: "now" }));
        assert_eq!(
            spawn(async {}).unwrap_err(),
            SimError::OutsideRuntime { operation: "spawn" }
        );
        assert_eq!(current_process(), None);
    }

    #[test]
    fn test_suspended_processes_are_discarded_at_horizon() {
        let mut sim = Simulation::default();
        let trace = log();

        let mut runtime = DesRuntime::new();
        let t = trace.clone();
        runtime.spawn(async move {
            timeout(3.0)?.await;
            t.borrow_mut().push(("resumed", 3.0));
            timeout(10.0)?.await;
            t.borrow_mut().push(("past horizon", 13.0));
            Ok::<(), SimError>(())
        });
        let key = install(&mut sim, runtime);

        sim.run_until(SimTime::from_secs(8)).unwrap();
        assert_eq!(*trace.borrow(), vec![("resumed", 3.0)]);
        assert_eq!(sim.time(), SimTime::from_secs(3));

        let runtime: DesRuntime = sim.remove_component(key).unwrap();
        assert_eq!(runtime.process_count(), 1);
        assert_eq!(runtime.completed_processes(), 0);
    }
}
