//! One run of the standard cafeteria, printed as a report row.

use queuesim::core::init_simulation_logging;
use queuesim::metrics::TableRow;
use queuesim::prelude::*;

fn main() -> Result<(), QueueSimError> {
    init_simulation_logging();

    let batch = BatchConfiguration::default();
    let metrics = run_once(&batch.run)?;
    let report = RunReport::from_metrics(0, batch.run.seed, &metrics, &batch.revenue);

    for (column, cell) in RunReport::columns().into_iter().zip(report.cells()) {
        println!("{column:>32}: {cell}");
    }
    Ok(())
}
