//! Run horizon behaviour.

use queuesim_core::async_runtime::{self, DesRuntime};
use queuesim_core::{CapacityResource, SimError, SimTime, Simulation};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn process_mid_timeout_at_horizon_is_never_resumed() {
    let mut sim = Simulation::default();
    let resumed = Rc::new(RefCell::new(Vec::new()));

    let mut runtime = DesRuntime::new();
    let log = resumed.clone();
    runtime.spawn(async move {
        async_runtime::timeout(90.0)?.await;
        log.borrow_mut().push("short");
        Ok::<(), SimError>(())
    });
    let log = resumed.clone();
    runtime.spawn(async move {
        async_runtime::timeout(99.0)?.await;
        async_runtime::timeout(2.0)?.await;
        log.borrow_mut().push("straddling");
        Ok::<(), SimError>(())
    });
    async_runtime::install(&mut sim, runtime);

    sim.run_until(SimTime::from_secs(100)).unwrap();
    assert_eq!(*resumed.borrow(), vec!["short"]);
    assert_eq!(sim.time(), SimTime::from_secs(99));
    assert_eq!(sim.peek_next_event_time(), Some(SimTime::from_secs(101)));
}

#[test]
fn events_exactly_at_horizon_fire() {
    let mut sim = Simulation::default();
    let fired = Rc::new(RefCell::new(false));

    let mut runtime = DesRuntime::new();
    let flag = fired.clone();
    runtime.spawn(async move {
        async_runtime::timeout(100.0)?.await;
        *flag.borrow_mut() = true;
        Ok::<(), SimError>(())
    });
    async_runtime::install(&mut sim, runtime);

    sim.run_until(SimTime::from_secs(100)).unwrap();
    assert!(*fired.borrow());
}

#[test]
fn discarding_a_run_with_suspended_holders_is_clean() {
    let station = CapacityResource::new("station", 1).unwrap();
    {
        let mut sim = Simulation::default();
        let mut runtime = DesRuntime::new();
        for _ in 0..3 {
            let station = station.clone();
            runtime.spawn(async move {
                let _slot = station.request().await;
                async_runtime::timeout(1_000.0)?.await;
                Ok::<(), SimError>(())
            });
        }
        async_runtime::install(&mut sim, runtime);
        sim.run_until(SimTime::from_secs(10)).unwrap();

        assert_eq!(station.in_use(), 1);
        assert_eq!(station.queue_len(), 2);
    }
    // Dropping the simulation drops every suspended process with it.
    assert_eq!(station.in_use(), 0);
    assert_eq!(station.queue_len(), 0);
}
