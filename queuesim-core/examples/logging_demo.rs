//! Demonstration of logging in the simulation kernel
//!
//! Ten customers with exponential arrivals and service share one server, run with
//! detailed logging so every spawn, grant and hand-over shows up in the output.
//!
//! ```bash
//! RUST_LOG=queuesim_core=trace cargo run -p queuesim-core --example logging_demo
//! ```

use queuesim_core::async_runtime::{self, DesRuntime};
use queuesim_core::logging::{events, run_span};
use queuesim_core::{
    init_detailed_simulation_logging, sim_log_with_time, CapacityResource, RandomProvider, RandomStream, SimError,
    SimTime, Simulation,
};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::info;

fn main() -> Result<(), SimError> {
    init_detailed_simulation_logging();

    let seed = 2024;
    let horizon = SimTime::from_secs(30);
    let _run = run_span(0, seed).entered();
    events::run_started(0, seed, horizon);

    let mut sim = Simulation::default();
    let server = CapacityResource::new("server", 1)?;
    let random = Rc::new(RefCell::new(RandomStream::new(seed)));

    let mut runtime = DesRuntime::new();
    runtime.spawn(async move {
        for _ in 0..10 {
            let gap = random.borrow_mut().exponential(4.0)?;
            async_runtime::timeout(gap)?.await;

            let (server, random) = (server.clone(), random.clone());
            async_runtime::spawn(async move {
                let arrived = async_runtime::now()?;
                let slot = server.request().await;
                let granted = async_runtime::now()?;
                sim_log_with_time!(info, granted, waited = %SimTime::from_duration(granted - arrived), "Request granted");

                let service = random.borrow_mut().exponential(3.0)?;
                async_runtime::timeout(service)?.await;
                slot.release();
                Ok::<(), SimError>(())
            })?;
        }
        Ok::<(), SimError>(())
    });
    async_runtime::install(&mut sim, runtime);

    sim.run_until(horizon)?;
    events::run_completed(0, sim.time(), sim.scheduler().pending_events());
    info!(final_time = %sim.time(), "Demo finished");
    Ok(())
}
