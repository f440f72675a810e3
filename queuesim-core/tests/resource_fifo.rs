//! Capacity resources driven by logical processes.

use queuesim_core::async_runtime::{self, DesRuntime};
use queuesim_core::{CapacityResource, Execute, Executor, SimError, SimTime, Simulation};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn secs(t: SimTime) -> f64 {
    t.as_secs_f64()
}

#[test]
fn holders_never_exceed_capacity_under_simultaneous_requests() {
    let mut sim = Simulation::default();
    let station = CapacityResource::new("stress", 3).unwrap();

    let mut runtime = DesRuntime::new();
    for i in 0..50u64 {
        let station = station.clone();
        runtime.spawn(async move {
            let _slot = station.request().await;
            async_runtime::sleep(SimTime::from_secs(i % 4 + 1)).await;
            Ok::<(), SimError>(())
        });
    }
    async_runtime::install(&mut sim, runtime);

    let observed_max = Cell::new(0);
    let probe = station.clone();
    sim.execute(Executor::unbound().side_effect(|_| {
        assert!(probe.in_use() <= probe.capacity());
        observed_max.set(observed_max.get().max(probe.in_use()));
    }));

    assert_eq!(observed_max.get(), 3);
    assert_eq!(station.peak_in_use(), 3);
    assert_eq!(station.in_use(), 0);
    assert_eq!(station.queue_len(), 0);
    assert_eq!(station.grants(), 50);
    assert_eq!(station.releases(), 50);
}

#[test]
fn exhausted_resource_grants_in_request_order() {
    let mut sim = Simulation::default();
    let counter = CapacityResource::new("counter", 1).unwrap();
    let granted = Rc::new(RefCell::new(Vec::new()));

    let mut runtime = DesRuntime::new();
    for i in 0..10usize {
        let (counter, granted) = (counter.clone(), granted.clone());
        runtime.spawn(async move {
            // Stagger arrivals inside the first tick's queue.
            async_runtime::sleep(SimTime::from_millis(i as u64)).await;
            let slot = counter.request().await;
            granted.borrow_mut().push(i);
            async_runtime::timeout(2.0)?.await;
            slot.release();
            Ok::<(), SimError>(())
        });
    }
    async_runtime::install(&mut sim, runtime);
    sim.run_until(SimTime::from_secs(100)).unwrap();

    assert_eq!(*granted.borrow(), (0..10).collect::<Vec<_>>());
    assert_eq!(counter.in_use(), 0);
}

#[test]
fn same_tick_requests_second_waits_for_first_release() {
    let mut sim = Simulation::default();
    let counter = CapacityResource::new("counter", 1).unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));

    let mut runtime = DesRuntime::new();
    for (name, hold) in [("first", 5.0), ("second", 1.0)] {
        let (counter, log) = (counter.clone(), log.clone());
        runtime.spawn(async move {
            let slot = counter.request().await;
            log.borrow_mut().push((name, "granted", secs(async_runtime::now()?)));
            async_runtime::timeout(hold)?.await;
            log.borrow_mut().push((name, "released", secs(async_runtime::now()?)));
            slot.release();
            Ok::<(), SimError>(())
        });
    }
    async_runtime::install(&mut sim, runtime);
    sim.run_until(SimTime::from_secs(60)).unwrap();

    assert_eq!(
        *log.borrow(),
        vec![
            ("first", "granted", 0.0),
            ("first", "released", 5.0),
            ("second", "granted", 5.0),
            ("second", "released", 6.0),
        ]
    );
}

#[test]
fn slot_is_released_on_every_exit_path() {
    let mut sim = Simulation::default();
    let counter = CapacityResource::new("counter", 1).unwrap();
    let second_granted_at = Rc::new(Cell::new(None));

    let mut runtime = DesRuntime::new();
    let c = counter.clone();
    runtime.spawn(async move {
        let _slot = c.request().await;
        async_runtime::timeout(3.0)?.await;
        // Leaves without an explicit release.
        Ok::<(), SimError>(())
    });
    let (c, granted_at) = (counter.clone(), second_granted_at.clone());
    runtime.spawn(async move {
        let _slot = c.request().await;
        granted_at.set(Some(secs(async_runtime::now()?)));
        Ok::<(), SimError>(())
    });
    async_runtime::install(&mut sim, runtime);
    sim.run_until(SimTime::from_secs(10)).unwrap();

    assert_eq!(second_granted_at.get(), Some(3.0));
    assert_eq!(counter.in_use(), 0);
    assert_eq!(counter.grants(), counter.releases());
}

#[test]
fn released_slot_resumes_waiter_behind_same_time_events() {
    let mut sim = Simulation::default();
    let counter = CapacityResource::new("counter", 1).unwrap();
    let order = Rc::new(RefCell::new(Vec::new()));

    let mut runtime = DesRuntime::new();
    let (c, o) = (counter.clone(), order.clone());
    runtime.spawn(async move {
        let slot = c.request().await;
        async_runtime::timeout(1.0)?.await;
        slot.release();
        o.borrow_mut().push("holder released");
        Ok::<(), SimError>(())
    });
    let (c, o) = (counter.clone(), order.clone());
    runtime.spawn(async move {
        let _slot = c.request().await;
        o.borrow_mut().push("waiter granted");
        Ok::<(), SimError>(())
    });
    let o = order.clone();
    runtime.spawn(async move {
        async_runtime::timeout(1.0)?.await;
        o.borrow_mut().push("bystander at 1.0");
        Ok::<(), SimError>(())
    });
    async_runtime::install(&mut sim, runtime);
    sim.run_until(SimTime::from_secs(10)).unwrap();

    // The hand-over is a zero-delay event queued behind the bystander's timer.
    assert_eq!(
        *order.borrow(),
        vec!["holder released", "bystander at 1.0", "waiter granted"]
    );
}

#[test]
fn slot_released_by_continuation_resumes_waiter_at_release_time() {
    let mut sim = Simulation::default();
    let counter = CapacityResource::new("counter", 1).unwrap();
    let held = Rc::new(RefCell::new(None));
    let waiter_granted_at = Rc::new(Cell::new(None));

    let mut runtime = DesRuntime::new();
    let (c, h) = (counter.clone(), held.clone());
    runtime.spawn(async move {
        *h.borrow_mut() = Some(c.request().await);
    });
    let (c, granted_at) = (counter.clone(), waiter_granted_at.clone());
    runtime.spawn(async move {
        let _slot = c.request().await;
        granted_at.set(Some(secs(async_runtime::now()?)));
        Ok::<(), SimError>(())
    });
    async_runtime::install(&mut sim, runtime);

    let h = held.clone();
    sim.schedule_after(SimTime::from_secs(5), move |_| {
        h.borrow_mut().take();
    });
    sim.run_until(SimTime::from_secs(100)).unwrap();

    assert_eq!(waiter_granted_at.get(), Some(5.0));
    assert_eq!(counter.in_use(), 0);
    assert_eq!(counter.grants(), 2);
    assert_eq!(counter.releases(), 2);
}

#[test]
fn slot_released_between_runs_resumes_waiter_when_run_continues() {
    let mut sim = Simulation::default();
    let counter = CapacityResource::new("counter", 1).unwrap();
    let held = Rc::new(RefCell::new(None));
    let waiter_granted_at = Rc::new(Cell::new(None));

    let mut runtime = DesRuntime::new();
    let (c, h) = (counter.clone(), held.clone());
    runtime.spawn(async move {
        *h.borrow_mut() = Some(c.request().await);
        async_runtime::timeout(2.0)?.await;
        Ok::<(), SimError>(())
    });
    let (c, granted_at) = (counter.clone(), waiter_granted_at.clone());
    runtime.spawn(async move {
        let _slot = c.request().await;
        granted_at.set(Some(secs(async_runtime::now()?)));
        Ok::<(), SimError>(())
    });
    async_runtime::install(&mut sim, runtime);

    sim.run_until(SimTime::from_secs(10)).unwrap();
    assert_eq!(waiter_granted_at.get(), None);
    assert_eq!(counter.queue_len(), 1);

    held.borrow_mut().take();
    assert!(sim.scheduler().has_deferred_wakes());
    sim.run_until(SimTime::from_secs(20)).unwrap();

    assert_eq!(waiter_granted_at.get(), Some(2.0));
    assert!(!sim.scheduler().has_deferred_wakes());
    assert_eq!(counter.in_use(), 0);
}
