//! Run-loop drivers for a [`Simulation`].

use crate::{SimTime, Simulation};

/// Simulation execution trait.
pub trait Execute {
    /// Executes the simulation until some stopping condition is reached.
    /// The condition is implementation-specific.
    fn execute(self, sim: &mut Simulation);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndCondition {
    Horizon(SimTime),
    NoEvents,
}

/// Executor is used for simple execution of an entire simulation.
///
/// Every variant also stops as soon as the run records a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Executor {
    end_condition: EndCondition,
}

impl Executor {
    /// Run until no events are left in the queue.
    #[must_use]
    pub fn unbound() -> Self {
        Self {
            end_condition: EndCondition::NoEvents,
        }
    }

    /// Fire every event scheduled at or before `horizon`.
    ///
    /// The clock is left at the last fired event, which may be earlier than
    /// the horizon.
    #[must_use]
    pub fn timed(horizon: SimTime) -> Self {
        Self {
            end_condition: EndCondition::Horizon(horizon),
        }
    }

    /// Registers a side effect that is called _after_ each simulation step.
    #[must_use]
    pub fn side_effect<F>(self, func: F) -> ExecutorWithSideEffect<F>
    where
        F: FnMut(&Simulation),
    {
        ExecutorWithSideEffect {
            end_condition: self.end_condition,
            side_effect: func,
        }
    }
}

impl Execute for Executor {
    fn execute(self, sim: &mut Simulation) {
        run_with(sim, self.end_condition, |_| {});
    }
}

pub struct ExecutorWithSideEffect<F>
where
    F: FnMut(&Simulation),
{
    end_condition: EndCondition,
    side_effect: F,
}

impl<F> Execute for ExecutorWithSideEffect<F>
where
    F: FnMut(&Simulation),
{
    fn execute(self, sim: &mut Simulation) {
        run_with(sim, self.end_condition, self.side_effect);
    }
}

fn run_with<F>(sim: &mut Simulation, end_condition: EndCondition, mut side_effect: F)
where
    F: FnMut(&Simulation),
{
    let mut step = |sim: &mut Simulation| {
        let stepped = sim.step();
        if stepped {
            side_effect(sim);
        }
        stepped
    };
    sim.scheduler_mut().schedule_deferred_wakes();
    match end_condition {
        EndCondition::Horizon(horizon) => {
            while sim.peek_next_event_time().is_some_and(|t| t <= horizon) {
                if !step(sim) {
                    break;
                }
            }
        }
        EndCondition::NoEvents => while step(sim) {},
    }
}
