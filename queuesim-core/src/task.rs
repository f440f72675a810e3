//! Task system for one-shot continuations
//!
//! A task is a continuation that runs once, at the simulation time it was
//! scheduled for, with mutable access to the scheduler. Tasks are the plain
//! callback form of `schedule_after`; long-lived logical processes use the
//! async runtime instead.

use crate::Scheduler;
use std::fmt;
use tracing::{instrument, trace};

/// Unique identifier for tasks, assigned by the scheduler in scheduling order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task({})", self.0)
    }
}

/// Trait for continuations that can be executed by the scheduler
pub trait Task: 'static {
    /// Execute the task
    fn execute(self, scheduler: &mut Scheduler);
}

/// Type-erased task execution trait
pub(crate) trait TaskExecution {
    fn execute(self: Box<Self>, scheduler: &mut Scheduler);
}

/// Wrapper that implements `TaskExecution` for any `Task`.
pub(crate) struct TaskWrapper<T: Task> {
    task: T,
}

impl<T: Task> TaskWrapper<T> {
    pub fn new(task: T) -> Self {
        Self { task }
    }
}

impl<T: Task> TaskExecution for TaskWrapper<T> {
    fn execute(self: Box<Self>, scheduler: &mut Scheduler) {
        self.task.execute(scheduler);
    }
}

/// A task that executes a closure
pub struct ClosureTask<F> {
    closure: F,
}

impl<F> ClosureTask<F>
where
    F: FnOnce(&mut Scheduler) + 'static,
{
    /// Create a new closure task
    pub fn new(closure: F) -> Self {
        Self { closure }
    }
}

impl<F> Task for ClosureTask<F>
where
    F: FnOnce(&mut Scheduler) + 'static,
{
    #[instrument(skip(self, scheduler), fields(task_type = "ClosureTask", time = %scheduler.time()))]
    fn execute(self, scheduler: &mut Scheduler) {
        trace!("Executing closure task");
        (self.closure)(scheduler);
    }
}
