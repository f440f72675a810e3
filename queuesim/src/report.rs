//! Per-run result rows.

use queuesim_core::logging::diagnostics;
use queuesim_metrics::{mean_of_means, Cell, MetricsError, RunMetrics, TableRow};
use serde::Serialize;

use crate::category::Category;
use crate::config::{CategoryValues, QueuedValues};

/// One row of the results table.
///
/// Queue-delay means are `None` when the category had no sample after the
/// warm-up; such a cell is written empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run: usize,
    pub seed: u64,
    pub mean_queue_delay: QueuedValues<Option<f64>>,
    /// Unweighted mean of the three category means.
    pub mean_total_queue_delay: Option<f64>,
    pub counts: CategoryValues<u64>,
    /// Customers served by a station.
    pub total_orders: u64,
    pub revenue: CategoryValues<f64>,
    pub total_revenue: f64,
}

impl RunReport {
    /// Summarise `metrics` of run `run`, valuing each counted customer at the
    /// `prices` of its category.
    pub fn from_metrics(
        run: usize,
        seed: u64,
        metrics: &RunMetrics<Category>,
        prices: &CategoryValues<f64>,
    ) -> Self {
        let mean_queue_delay = QueuedValues {
            self_decision: defined_mean(run, metrics, Category::SelfDecision),
            assisted_pickup: defined_mean(run, metrics, Category::AssistedPickup),
            full_menu: defined_mean(run, metrics, Category::FullMenu),
        };
        let mean_total_queue_delay = mean_of_means(&[
            mean_queue_delay.full_menu,
            mean_queue_delay.assisted_pickup,
            mean_queue_delay.self_decision,
        ]);

        let counts = CategoryValues {
            no_service: metrics.count(Category::NoService),
            self_decision: metrics.count(Category::SelfDecision),
            assisted_pickup: metrics.count(Category::AssistedPickup),
            full_menu: metrics.count(Category::FullMenu),
        };
        let total_orders = Category::QUEUED.iter().map(|c| *counts.get(*c)).sum();

        let value = |category: Category| *counts.get(category) as f64 * *prices.get(category);
        let revenue = CategoryValues {
            no_service: value(Category::NoService),
            self_decision: value(Category::SelfDecision),
            assisted_pickup: value(Category::AssistedPickup),
            full_menu: value(Category::FullMenu),
        };
        let total_revenue = revenue.full_menu + revenue.assisted_pickup + revenue.self_decision + revenue.no_service;

        Self {
            run,
            seed,
            mean_queue_delay,
            mean_total_queue_delay,
            counts,
            total_orders,
            revenue,
            total_revenue,
        }
    }
}

/// An empty sample is the only way a mean can be undefined.
fn defined_mean(run: usize, metrics: &RunMetrics<Category>, category: Category) -> Option<f64> {
    metrics
        .mean_queue_delay(category)
        .inspect_err(|err| {
            if let MetricsError::EmptySample { statistic } = err {
                diagnostics::empty_sample(run, statistic);
            }
        })
        .ok()
}

impl TableRow for RunReport {
    fn columns() -> Vec<&'static str> {
        vec![
            "Run",
            "Mean Menu Queue Time",
            "Mean Poke Queue Time",
            "Mean Self Decision Queue Time",
            "Mean Total Queue",
            "Menu Count",
            "Poke Count",
            "Self-Decision Count",
            "No Food Count",
            "Total Order Count",
            "Menu Revenue (€)",
            "Poke Revenue (€)",
            "Self Decision Revenue (€)",
            "Total Revenue (€)",
        ]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Index(self.run),
            Cell::from_option(self.mean_queue_delay.full_menu),
            Cell::from_option(self.mean_queue_delay.assisted_pickup),
            Cell::from_option(self.mean_queue_delay.self_decision),
            Cell::from_option(self.mean_total_queue_delay),
            Cell::Integer(self.counts.full_menu),
            Cell::Integer(self.counts.assisted_pickup),
            Cell::Integer(self.counts.self_decision),
            Cell::Integer(self.counts.no_service),
            Cell::Integer(self.total_orders),
            Cell::Float(self.revenue.full_menu),
            Cell::Float(self.revenue.assisted_pickup),
            Cell::Float(self.revenue.self_decision),
            Cell::Float(self.total_revenue),
        ]
    }
}
