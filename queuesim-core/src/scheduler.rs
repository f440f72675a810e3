use std::any::Any;
use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::rc::Rc;
use tracing::{trace, warn};

use crate::async_runtime::RuntimeEvent;
use crate::error::SimError;
use crate::task::{ClosureTask, Task, TaskExecution, TaskId, TaskWrapper};
use crate::types::EventId;
use crate::waker::DeferredWakes;
use crate::{Key, SimTime};

#[derive(Debug)]
pub(crate) enum EventPayload {
    Component { component: u64, inner: Box<dyn Any> },
    Task(TaskId),
}

/// Entry stored in the scheduler's priority queue: the fire time, the insertion
/// id and what to resume.
///
/// Entries are ordered by `(time, id)`. Since ids are handed out in scheduling
/// order, events that fire at the same time are popped first-in first-out.
#[derive(Debug)]
pub struct EventEntry {
    id: EventId,
    time: SimTime,
    pub(crate) payload: EventPayload,
}

impl EventEntry {
    /// Insertion id of the event.
    pub fn id(&self) -> EventId {
        self.id
    }

    /// Simulation time at which the event fires.
    pub fn time(&self) -> SimTime {
        self.time
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self.payload {
            EventPayload::Component { .. } => "Component",
            EventPayload::Task(_) => "Task",
        }
    }

    /// Tries to downcast the event entry to one holding an event of type `E`.
    /// If fails, returns `None`.
    #[must_use]
    pub fn downcast<E: fmt::Debug + 'static>(&self) -> Option<EventEntryTyped<'_, E>> {
        match &self.payload {
            EventPayload::Component { component, inner } => {
                inner.downcast_ref::<E>().map(|event| EventEntryTyped {
                    id: self.id,
                    time: self.time,
                    component_key: Key::new_with_id(*component),
                    event,
                })
            }
            EventPayload::Task(_) => None,
        }
    }
}

impl PartialEq for EventEntry {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl Eq for EventEntry {}

impl PartialOrd for EventEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap behavior in BinaryHeap.
        (other.time, other.id).cmp(&(self.time, self.id))
    }
}

/// Borrowed, typed view of a component event.
#[derive(Debug)]
pub struct EventEntryTyped<'e, E: fmt::Debug> {
    pub id: EventId,
    pub time: SimTime,
    pub component_key: Key<E>,
    pub event: &'e E,
}

type Clock = Rc<Cell<SimTime>>;

/// This struct exposes only immutable access to the simulation clock.
/// The clock itself is owned by the scheduler, while others can obtain `ClockRef`
/// to read the current simulation time.
///
/// # Example
///
/// ```
/// # use queuesim_core::Scheduler;
/// let scheduler = Scheduler::default();
/// let clock_ref = scheduler.clock();
/// assert_eq!(clock_ref.time(), scheduler.time());
/// ```
#[derive(Clone)]
pub struct ClockRef {
    clock: Clock,
}

impl From<Clock> for ClockRef {
    fn from(clock: Clock) -> Self {
        Self { clock }
    }
}

impl ClockRef {
    /// Return the current simulation time.
    #[must_use]
    pub fn time(&self) -> SimTime {
        self.clock.get()
    }
}

impl fmt::Debug for ClockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockRef").field("time", &self.time()).finish()
    }
}

/// Scheduler is used to keep the current time and information about the upcoming events.
///
/// It exclusively owns the event queue and the clock. The clock only moves
/// forward, and only by popping the next event.
///
/// See the [crate-level documentation](index.html) for more information.
pub struct Scheduler {
    next_event_id: u64,
    next_task_id: u64,
    events: BinaryHeap<EventEntry>,
    clock: Clock,
    pending_tasks: HashMap<TaskId, Box<dyn TaskExecution>>,
    deferred_wakes: DeferredWakes,
    failure: Option<SimError>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            next_event_id: 0,
            next_task_id: 0,
            events: BinaryHeap::default(),
            clock: Rc::new(Cell::new(SimTime::default())),
            pending_tasks: HashMap::new(),
            deferred_wakes: DeferredWakes::default(),
            failure: None,
        }
    }
}

impl Scheduler {
    fn push(&mut self, time: SimTime, payload: EventPayload) -> EventId {
        self.next_event_id += 1;
        let id = EventId(self.next_event_id);
        let entry = EventEntry { id, time, payload };
        trace!(event_id = %id, fire_time = %time, kind = entry.kind(), "Event scheduled");
        self.events.push(entry);
        id
    }

    /// Schedules `event` to be executed for `component` at `self.time() + delay`.
    pub fn schedule<E: fmt::Debug + 'static>(
        &mut self,
        delay: SimTime,
        component: Key<E>,
        event: E,
    ) -> EventId {
        let time = self.time() + delay;
        self.push(
            time,
            EventPayload::Component {
                component: component.id(),
                inner: Box::new(event),
            },
        )
    }

    /// Schedules `event` to be executed for `component` at `self.time()`.
    ///
    /// The event still goes through the queue, behind anything already
    /// scheduled for the current time.
    pub fn schedule_now<E: fmt::Debug + 'static>(&mut self, component: Key<E>, event: E) -> EventId {
        self.schedule(SimTime::zero(), component, event)
    }

    /// Enqueue `continuation` to run at `now + delay`.
    pub fn schedule_after<F>(&mut self, delay: SimTime, continuation: F) -> TaskId
    where
        F: FnOnce(&mut Scheduler) + 'static,
    {
        self.schedule_task(delay, ClosureTask::new(continuation))
    }

    /// Like [`Scheduler::schedule_after`], with the delay given in model time
    /// units. Negative or non-finite delays fail with
    /// [`SimError::InvalidDuration`] and nothing is scheduled.
    pub fn schedule_after_secs<F>(&mut self, delay: f64, continuation: F) -> Result<TaskId, SimError>
    where
        F: FnOnce(&mut Scheduler) + 'static,
    {
        let delay = SimTime::try_from_secs_f64(delay)?;
        Ok(self.schedule_after(delay, continuation))
    }

    /// Schedule a task to run after `delay`
    pub fn schedule_task<T: Task>(&mut self, delay: SimTime, task: T) -> TaskId {
        self.next_task_id += 1;
        let task_id = TaskId(self.next_task_id);
        let time = self.time() + delay;

        self.pending_tasks.insert(task_id, Box::new(TaskWrapper::new(task)));
        self.push(time, EventPayload::Task(task_id));
        task_id
    }

    /// Returns the current simulation time.
    #[must_use]
    pub fn time(&self) -> SimTime {
        self.clock.get()
    }

    /// Returns a structure with immutable access to the simulation time.
    #[must_use]
    pub fn clock(&self) -> ClockRef {
        ClockRef {
            clock: Rc::clone(&self.clock),
        }
    }

    /// Fire time of the next scheduled event.
    pub fn peek_time(&self) -> Option<SimTime> {
        self.events.peek().map(EventEntry::time)
    }

    /// Number of events waiting in the queue.
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Removes and returns the next scheduled event, advancing the clock to its
    /// fire time. Returns `None` if none are left.
    pub fn pop(&mut self) -> Option<EventEntry> {
        self.events.pop().inspect(|event| {
            debug_assert!(event.time >= self.clock.get(), "simulation clock moved backwards");
            self.clock.replace(event.time);
        })
    }

    /// Execute a task if it is still pending.
    pub(crate) fn execute_task(&mut self, task_id: TaskId) -> bool {
        if let Some(task) = self.pending_tasks.remove(&task_id) {
            task.execute(self);
            true
        } else {
            false
        }
    }

    pub(crate) fn deferred_wakes(&self) -> &DeferredWakes {
        &self.deferred_wakes
    }

    /// Turn process wakes raised outside a poll into `Wake` events at the
    /// current time, in wake order.
    pub fn schedule_deferred_wakes(&mut self) {
        for (runtime, process) in self.deferred_wakes.drain() {
            trace!(%process, runtime = runtime.id(), "Deferred wake scheduled");
            self.schedule_now(runtime, RuntimeEvent::Wake { process });
        }
    }

    /// Whether a process wake still waits for [`Scheduler::schedule_deferred_wakes`].
    pub fn has_deferred_wakes(&self) -> bool {
        !self.deferred_wakes.is_empty()
    }

    /// Record a fatal error for the current run.
    ///
    /// Only the first error is kept. The run loop stops before the next event.
    pub fn abort(&mut self, error: SimError) {
        if self.failure.is_none() {
            warn!(time = %self.time(), %error, "Simulation run aborted");
            self.failure = Some(error);
        }
    }

    /// The fatal error recorded for this run, if any.
    pub fn failure(&self) -> Option<&SimError> {
        self.failure.as_ref()
    }

    pub(crate) fn take_failure(&mut self) -> Option<SimError> {
        self.failure.take()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::RefCell;

    #[derive(Debug, Clone, Eq, PartialEq)]
    struct EventA;
    #[derive(Debug, Clone, Eq, PartialEq)]
    struct EventB;

    fn component_entry(id: u64, time: SimTime) -> EventEntry {
        EventEntry {
            id: EventId(id),
            time,
            payload: EventPayload::Component {
                component: 1,
                inner: Box::new(String::from("inner")),
            },
        }
    }

    #[test]
    fn test_clock_ref() {
        let time = SimTime::from_secs(1);
        let clock = Clock::new(Cell::new(time));
        let clock_ref = ClockRef::from(clock);
        assert_eq!(clock_ref.time(), time);
    }

    #[test]
    fn test_event_entry_downcast() {
        let entry = component_entry(0, SimTime::from_secs(1));
        assert!(entry.downcast::<String>().is_some());
        assert!(entry.downcast::<i32>().is_none());
        assert_eq!(entry.kind(), "Component");
    }

    #[test]
    fn test_event_entry_cmp_breaks_ties_by_insertion() {
        let early = component_entry(5, SimTime::from_secs(0));
        let late = component_entry(1, SimTime::from_secs(1));
        // Earlier time wins regardless of id (heap order is reversed).
        assert_eq!(early.cmp(&late), Ordering::Greater);

        let first = component_entry(1, SimTime::from_secs(1));
        let second = component_entry(2, SimTime::from_secs(1));
        assert_eq!(first.cmp(&second), Ordering::Greater);
        assert_ne!(first, second);
    }

    #[test]
    fn test_scheduler() {
        let mut scheduler = Scheduler::default();
        assert_eq!(scheduler.time(), SimTime::zero());
        assert_eq!(scheduler.clock().time(), SimTime::zero());
        assert!(scheduler.events.is_empty());

        let component_a = Key::<EventA>::new_with_id(1);
        let component_b = Key::<EventB>::new_with_id(2);

        scheduler.schedule(SimTime::from_secs(1), component_a, EventA);
        scheduler.schedule_now(component_b, EventB);
        scheduler.schedule(SimTime::from_secs(2), component_b, EventB);
        assert_eq!(scheduler.pending_events(), 3);
        assert_eq!(scheduler.peek_time(), Some(SimTime::zero()));

        let entry = scheduler.pop().unwrap();
        let entry = entry.downcast::<EventB>().unwrap();
        assert_eq!(entry.time, SimTime::zero());
        assert_eq!(entry.component_key.id(), component_b.id());
        assert_eq!(entry.event, &EventB);

        let entry = scheduler.pop().unwrap();
        let entry = entry.downcast::<EventA>().unwrap();
        assert_eq!(entry.time, SimTime::from_secs(1));
        assert_eq!(entry.component_key.id(), component_a.id());
        assert_eq!(scheduler.time(), SimTime::from_secs(1));
        assert_eq!(scheduler.clock().time(), SimTime::from_secs(1));

        let entry = scheduler.pop().unwrap();
        assert!(entry.downcast::<EventB>().is_some());
        assert_eq!(scheduler.time(), SimTime::from_secs(2));

        assert!(scheduler.pop().is_none());
    }

    #[test]
    fn test_same_time_events_pop_fifo() {
        let mut scheduler = Scheduler::default();
        let key = Key::<usize>::new_with_id(7);
        for i in 0..100 {
            scheduler.schedule(SimTime::from_secs(3), key, i);
        }

        let order: Vec<usize> = std::iter::from_fn(|| scheduler.pop())
            .map(|entry| *entry.downcast::<usize>().unwrap().event)
            .collect();
        assert_eq!(order, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_schedule_after_runs_continuation() {
        let mut scheduler = Scheduler::default();
        let log = Rc::new(RefCell::new(Vec::new()));

        let log_clone = log.clone();
        scheduler.schedule_after(SimTime::from_secs(2), move |scheduler| {
            log_clone.borrow_mut().push(scheduler.time());
        });

        let entry = scheduler.pop().unwrap();
        let EventPayload::Task(task_id) = entry.payload else {
            panic!("expected task event");
        };
        assert!(scheduler.execute_task(task_id));
        assert!(!scheduler.execute_task(task_id));
        assert_eq!(*log.borrow(), vec![SimTime::from_secs(2)]);
    }

    #[test]
    fn test_schedule_after_secs_rejects_negative_delay() {
        let mut scheduler = Scheduler::default();
        let result = scheduler.schedule_after_secs(-0.5, |_| {});
        assert_eq!(result, Err(SimError::InvalidDuration { value: -0.5 }));
        assert_eq!(scheduler.pending_events(), 0);

        assert!(scheduler.schedule_after_secs(0.0, |_| {}).is_ok());
        assert_eq!(scheduler.pending_events(), 1);
    }

    #[test]
    fn test_abort_keeps_first_error() {
        let mut scheduler = Scheduler::default();
        assert!(scheduler.failure().is_none());

        scheduler.abort(SimError::invalid_parameter("first"));
        scheduler.abort(SimError::invalid_parameter("second"));
        assert_eq!(scheduler.failure(), Some(&SimError::invalid_parameter("first")));
        assert_eq!(scheduler.take_failure(), Some(SimError::invalid_parameter("first")));
        assert!(scheduler.failure().is_none());
    }
}
